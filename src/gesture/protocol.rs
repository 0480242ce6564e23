//! Gesture backend wire protocol
//!
//! Control messages travel as plain text frames. Every inbound text frame is a
//! gesture status label; there is no structured framing, acknowledgement or
//! correlation id.

use std::fmt;
use std::str::FromStr;

use tokio_tungstenite::tungstenite::protocol::Message;

use super::types::ProtocolError;

/// Outbound control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Begin emitting gesture detections for this session
    Start,
    /// Stop emitting and release per-session resources
    Stop,
}

impl ControlMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMessage::Start => "start",
            ControlMessage::Stop => "stop",
        }
    }

    /// Encode as a WebSocket text frame
    pub fn to_message(self) -> Message {
        Message::Text(self.as_str().to_string())
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMessage {
    type Err = ProtocolError;

    // Matches are exact; the backend does not trim or fold case either.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ControlMessage::Start),
            "stop" => Ok(ControlMessage::Stop),
            other => Err(ProtocolError::UnknownControl(other.to_string())),
        }
    }
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// New gesture status, replacing the previous one
    Status(String),
    /// Peer initiated the closing handshake
    Close,
    /// Ping/pong, answered by the socket layer
    Control,
}

/// Decode an inbound WebSocket message
pub fn decode_frame(msg: Message) -> Result<InboundFrame, ProtocolError> {
    match msg {
        Message::Text(text) => Ok(InboundFrame::Status(text)),
        Message::Binary(data) => Ok(InboundFrame::Status(
            String::from_utf8_lossy(&data).into_owned(),
        )),
        Message::Close(_) => Ok(InboundFrame::Close),
        Message::Ping(_) | Message::Pong(_) => Ok(InboundFrame::Control),
        Message::Frame(_) => Err(ProtocolError::UnsupportedFrame("raw frame".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_encoding() {
        assert_eq!(
            ControlMessage::Start.to_message(),
            Message::Text("start".to_string())
        );
        assert_eq!(ControlMessage::Stop.to_string(), "stop");
    }

    #[test]
    fn test_control_message_parsing_is_exact() {
        assert_eq!("start".parse::<ControlMessage>(), Ok(ControlMessage::Start));
        assert_eq!("stop".parse::<ControlMessage>(), Ok(ControlMessage::Stop));
        assert_eq!(
            "Start".parse::<ControlMessage>(),
            Err(ProtocolError::UnknownControl("Start".to_string()))
        );
        assert!(" stop".parse::<ControlMessage>().is_err());
    }

    #[test]
    fn test_decode_text_frame_is_status() {
        let frame = decode_frame(Message::Text("Left click".to_string())).unwrap();
        assert_eq!(frame, InboundFrame::Status("Left click".to_string()));
    }

    #[test]
    fn test_decode_binary_frame_lossy() {
        let frame = decode_frame(Message::Binary(b"Dragging".to_vec())).unwrap();
        assert_eq!(frame, InboundFrame::Status("Dragging".to_string()));

        let frame = decode_frame(Message::Binary(vec![0x66, 0xff])).unwrap();
        assert_eq!(frame, InboundFrame::Status("f\u{fffd}".to_string()));
    }

    #[test]
    fn test_decode_control_frames() {
        assert_eq!(
            decode_frame(Message::Ping(b"x".to_vec())).unwrap(),
            InboundFrame::Control
        );
        assert_eq!(
            decode_frame(Message::Pong(Vec::new())).unwrap(),
            InboundFrame::Control
        );
        assert_eq!(decode_frame(Message::Close(None)).unwrap(), InboundFrame::Close);
    }
}
