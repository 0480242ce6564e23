//! Gesture backend transport types

use std::fmt;

/// Identifier of one channel opened by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Event reported by a connection task, tagged with its channel
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub channel: ChannelId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn opened(channel: ChannelId) -> Self {
        Self {
            channel,
            kind: TransportEventKind::Opened,
        }
    }

    pub fn frame(channel: ChannelId, text: impl Into<String>) -> Self {
        Self {
            channel,
            kind: TransportEventKind::Frame(text.into()),
        }
    }

    pub fn closed(channel: ChannelId, closure: ChannelClosure) -> Self {
        Self {
            channel,
            kind: TransportEventKind::Closed(closure),
        }
    }
}

/// Transport callbacks, delivered in the order the socket produced them
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// Socket handshake completed
    Opened,
    /// Inbound gesture status frame
    Frame(String),
    /// Channel ended; always the last event of a channel
    Closed(ChannelClosure),
}

/// How a channel ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelClosure {
    /// Closed after a local close request or handle drop
    Local,
    /// Peer closed the channel or the stream ended
    Remote,
    /// Connection could not be established
    ConnectFailed(String),
    /// Socket failure after the channel opened
    Error(String),
}

impl fmt::Display for ChannelClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelClosure::Local => write!(f, "closed locally"),
            ChannelClosure::Remote => write!(f, "closed by backend"),
            ChannelClosure::ConnectFailed(reason) => write!(f, "connect failed: {}", reason),
            ChannelClosure::Error(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket connection error: {0}")]
    ConnectionError(String),
    #[error("Connection attempt timed out after {0}ms")]
    ConnectTimeout(u64),
    #[error("WebSocket send error: {0}")]
    SendError(String),
    #[error("Channel {0} is closed")]
    ChannelClosed(ChannelId),
}

/// Error types for the text control protocol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown control message: {0:?}")]
    UnknownControl(String),
    #[error("Unsupported frame type: {0}")]
    UnsupportedFrame(String),
}
