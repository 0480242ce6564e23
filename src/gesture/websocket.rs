//! Gesture backend WebSocket client implementation

use std::time::Duration;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Error as WsError,
};
use tracing::{debug, error, info, warn};

use super::channel::{ChannelCommand, ChannelHandle, Connector};
use super::protocol::{InboundFrame, decode_frame};
use super::types::{ChannelClosure, ChannelId, TransportError, TransportEvent, TransportEventKind};
use crate::config::BackendConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket channels to the gesture backend, one task per channel
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector for the given endpoint with default timeouts
    pub fn new(endpoint: impl Into<String>) -> Self {
        let defaults = BackendConfig::default();
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_millis(defaults.connect_timeout_ms),
            close_timeout: Duration::from_millis(defaults.close_timeout_ms),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.endpoint.clone()).with_timeouts(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.close_timeout_ms),
        )
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, close_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.close_timeout = close_timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &mut self,
        id: ChannelId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> ChannelHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = ChannelTask {
            id,
            endpoint: self.endpoint.clone(),
            connect_timeout: self.connect_timeout,
            close_timeout: self.close_timeout,
            events,
        };

        debug!("Spawning channel {} to {}", id, self.endpoint);
        let join = tokio::spawn(task.run(command_rx));
        ChannelHandle::new(id, command_tx, Some(join))
    }
}

/// Owns the socket of one channel for its whole life
struct ChannelTask {
    id: ChannelId,
    endpoint: String,
    connect_timeout: Duration,
    close_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelTask {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<ChannelCommand>) {
        let closure = self.drive(&mut commands).await;
        debug!("Channel {} finished: {}", self.id, closure);
        self.emit(TransportEventKind::Closed(closure));
    }

    async fn drive(&self, commands: &mut mpsc::UnboundedReceiver<ChannelCommand>) -> ChannelClosure {
        let connect = self.connect();
        tokio::pin!(connect);

        // Wait for the handshake, but honour a close that arrives first
        let result = loop {
            tokio::select! {
                result = &mut connect => break result,
                command = commands.recv() => match command {
                    Some(ChannelCommand::Send(message)) => {
                        warn!("Dropping '{}' queued on channel {} before it opened", message, self.id);
                    }
                    Some(ChannelCommand::Close) | None => {
                        info!("Channel {} closed before the connection was established", self.id);
                        return ChannelClosure::Local;
                    }
                },
            }
        };

        let mut ws = match result {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Failed to open channel {} to {}: {}", self.id, self.endpoint, e);
                return ChannelClosure::ConnectFailed(e.to_string());
            }
        };

        info!("Channel {} connected to gesture backend at {}", self.id, self.endpoint);
        self.emit(TransportEventKind::Opened);

        loop {
            tokio::select! {
                message = ws.next() => match message {
                    Some(Ok(msg)) => match decode_frame(msg) {
                        Ok(InboundFrame::Status(status)) => {
                            debug!("Channel {} received status: {}", self.id, status);
                            self.emit(TransportEventKind::Frame(status));
                        }
                        Ok(InboundFrame::Close) => {
                            debug!("Channel {} received close frame", self.id);
                        }
                        Ok(InboundFrame::Control) => {}
                        Err(e) => {
                            warn!("Ignoring frame on channel {}: {}", self.id, e);
                        }
                    },
                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                        info!("Channel {} closed by gesture backend", self.id);
                        return ChannelClosure::Remote;
                    }
                    Some(Err(e)) => {
                        error!("Channel {} transport error: {}", self.id, e);
                        return ChannelClosure::Error(e.to_string());
                    }
                },
                command = commands.recv() => match command {
                    Some(ChannelCommand::Send(message)) => {
                        if let Err(e) = ws.send(message.to_message()).await {
                            let e = TransportError::SendError(e.to_string());
                            error!("Channel {}: {}", self.id, e);
                            return ChannelClosure::Error(e.to_string());
                        }
                        debug!("Channel {} sent '{}'", self.id, message);
                    }
                    Some(ChannelCommand::Close) | None => {
                        self.close_gracefully(&mut ws).await;
                        return ChannelClosure::Local;
                    }
                },
            }
        }
    }

    async fn connect(&self) -> Result<WsStream, TransportError> {
        match tokio::time::timeout(self.connect_timeout, connect_async(self.endpoint.as_str())).await
        {
            Ok(Ok((ws_stream, _))) => Ok(ws_stream),
            Ok(Err(e)) => Err(TransportError::ConnectionError(e.to_string())),
            Err(_) => Err(TransportError::ConnectTimeout(
                u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Send a close frame and wait, bounded by the close timeout, for the
    /// backend to finish the handshake
    async fn close_gracefully(&self, ws: &mut WsStream) {
        if let Err(e) = ws.close(None).await {
            debug!("Channel {} close frame not sent: {}", self.id, e);
            return;
        }

        let drain = async {
            while let Some(message) = ws.next().await {
                if message.is_err() {
                    break;
                }
            }
        };

        if tokio::time::timeout(self.close_timeout, drain).await.is_err() {
            warn!(
                "Channel {} close not acknowledged within {:?}, dropping socket",
                self.id, self.close_timeout
            );
        } else {
            info!("Channel {} closed", self.id);
        }
    }

    fn emit(&self, kind: TransportEventKind) {
        let event = TransportEvent {
            channel: self.id,
            kind,
        };
        if self.events.send(event).is_err() {
            debug!("Session for channel {} is gone, dropping event", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectionState, DisconnectReason, SessionConfig, SessionManager};
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[test]
    fn test_connector_creation() {
        let connector = WebSocketConnector::new("ws://localhost:5000");
        assert_eq!(connector.endpoint(), "ws://localhost:5000");
        assert_eq!(connector.connect_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_connector_from_config() {
        let config = BackendConfig {
            endpoint: "ws://127.0.0.1:9000".to_string(),
            connect_timeout_ms: 250,
            close_timeout_ms: 100,
        };
        let connector = WebSocketConnector::from_config(&config);
        assert_eq!(connector.endpoint(), "ws://127.0.0.1:9000");
        assert_eq!(connector.connect_timeout, Duration::from_millis(250));
        assert_eq!(connector.close_timeout, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_connect_refused_reports_connect_failed() {
        // Reserve a port, then free it so nothing is listening there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut connector = WebSocketConnector::new(format!("ws://{}", addr));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = connector.open(ChannelId(1), events_tx);

        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.channel, ChannelId(1));
        assert!(matches!(
            event.kind,
            TransportEventKind::Closed(ChannelClosure::ConnectFailed(_))
        ));
        drop(handle);
    }

    #[tokio::test]
    async fn test_close_before_open_is_local() {
        // Accepts TCP but never completes the WebSocket handshake
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let _stream = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let mut connector = WebSocketConnector::new(format!("ws://{}", addr));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = connector.open(ChannelId(4), events_tx);
        handle.close().unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, TransportEvent::closed(ChannelId(4), ChannelClosure::Local));
    }

    #[tokio::test]
    async fn test_connect_timeout_reports_connect_failed() {
        // Accepts TCP but never answers the WebSocket handshake
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let _stream = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let mut connector = WebSocketConnector::new(format!("ws://{}", addr))
            .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let started = Instant::now();
        let _handle = connector.open(ChannelId(5), events_tx);

        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.channel, ChannelId(5));
        match event.kind {
            TransportEventKind::Closed(ChannelClosure::ConnectFailed(reason)) => {
                assert!(reason.contains("200ms"), "unexpected reason: {}", reason);
            }
            other => panic!("expected a connect failure, got {:?}", other),
        }
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_unacknowledged_close_still_disconnects() {
        // Completes the handshake, then never reads again
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let connector = WebSocketConnector::new(format!("ws://{}", addr))
            .with_timeouts(Duration::from_secs(2), Duration::from_millis(300));
        let mut manager = SessionManager::new(connector, SessionConfig::default());

        manager.request_start();
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.state() != ConnectionState::Active {
                let event = manager.next_transport_event().await.unwrap();
                manager.handle_transport_event(event);
            }
        })
        .await
        .unwrap();

        let started = Instant::now();
        manager.request_stop();
        assert_eq!(manager.state(), ConnectionState::Disconnecting);

        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.state() != ConnectionState::Disconnected {
                let event = manager.next_transport_event().await.unwrap();
                manager.handle_transport_event(event);
            }
        })
        .await
        .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "settled after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "settled after {:?}", elapsed);
        assert!(!manager.has_channel());
        assert_eq!(
            manager.snapshot().last_disconnect,
            Some(DisconnectReason::StopRequested)
        );
    }
}
