//! Scripted gesture backend
//!
//! Speaks the same plain-text protocol as the detection service: a client sends
//! `start` to receive a status label every frame interval and `stop` to pause
//! the stream. Used for local runs and for exercising sessions over real
//! sockets in tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use super::protocol::ControlMessage;
use crate::config::MockBackendConfig;

/// Labels emitted by the detection service, in the order the mock cycles them
pub const DEFAULT_GESTURES: &[&str] = &[
    "No gesture detected",
    "Moving cursor",
    "Left click",
    "Right click",
    "Double click",
    "Screenshot taken",
    "Dragging",
    "Dropped",
];

/// Something the mock backend observed, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Connected,
    Control(ControlMessage),
    Disconnected,
}

type Journal = Arc<Mutex<Vec<BackendEvent>>>;

/// Mock gesture backend bound to a local address
pub struct MockGestureBackend {
    listener: TcpListener,
    gestures: Arc<Vec<String>>,
    frame_interval: Duration,
    journal: Journal,
}

impl MockGestureBackend {
    /// Bind a new backend. Use port 0 to let the OS choose.
    pub async fn bind(addr: &str, gestures: Vec<String>, frame_interval: Duration) -> Result<Self> {
        if gestures.is_empty() {
            anyhow::bail!("Mock backend needs at least one gesture label");
        }
        if frame_interval.is_zero() {
            anyhow::bail!("Mock backend frame interval must be greater than 0");
        }

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind mock gesture backend on {}", addr))?;

        Ok(Self {
            listener,
            gestures: Arc::new(gestures),
            frame_interval,
            journal: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub async fn from_config(config: &MockBackendConfig) -> Result<Self> {
        Self::bind(
            &config.bind_addr,
            config.gestures.clone(),
            Duration::from_millis(config.frame_interval_ms),
        )
        .await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// WebSocket URL clients should connect to
    pub fn endpoint(&self) -> Result<String> {
        Ok(format!("ws://{}", self.local_addr()?))
    }

    /// Accept clients until `shutdown` resolves, then drop every open client
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Mock gesture backend listening on {}", self.endpoint()?);
        tokio::pin!(shutdown);

        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let gestures = self.gestures.clone();
                        let journal = self.journal.clone();
                        let interval = self.frame_interval;
                        clients.spawn(async move {
                            if let Err(e) = handle_client(stream, gestures, interval, journal).await {
                                warn!("Mock backend client {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("Mock backend accept error: {}", e),
                },
                // Reap finished clients so the set does not grow unbounded
                Some(_) = clients.join_next(), if !clients.is_empty() => {}
                _ = &mut shutdown => break,
            }
        }

        clients.shutdown().await;
        info!("Mock gesture backend stopped");
        Ok(())
    }

    /// Run the backend on a background task
    pub fn spawn(self) -> Result<MockBackendHandle> {
        let addr = self.local_addr()?;
        let journal = self.journal.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = self.serve(shutdown).await {
                warn!("Mock gesture backend error: {}", e);
            }
        });

        Ok(MockBackendHandle {
            addr,
            journal,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle to a spawned mock backend
pub struct MockBackendHandle {
    addr: SocketAddr,
    journal: Journal,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockBackendHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Events observed so far, across all clients
    pub async fn journal(&self) -> Vec<BackendEvent> {
        self.journal.lock().await.clone()
    }

    /// Control messages received so far, across all clients
    pub async fn controls(&self) -> Vec<ControlMessage> {
        self.journal
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Control(message) => Some(*message),
                _ => None,
            })
            .collect()
    }

    /// Stop accepting clients and drop the open ones without a close handshake
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Mock gesture backend task failed: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    gestures: Arc<Vec<String>>,
    frame_interval: Duration,
    journal: Journal,
) -> Result<()> {
    let mut ws = accept_async(stream).await?;
    info!("Client connected");
    journal.lock().await.push(BackendEvent::Connected);

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut emitting = false;
    let mut next = 0usize;

    loop {
        tokio::select! {
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => match text.parse::<ControlMessage>() {
                    Ok(control) => {
                        journal.lock().await.push(BackendEvent::Control(control));
                        match control {
                            ControlMessage::Start => {
                                // A repeated start restarts the stream
                                emitting = true;
                                next = 0;
                                ticker.reset_immediately();
                                info!("Gesture detection started");
                            }
                            ControlMessage::Stop => {
                                emitting = false;
                                info!("Gesture detection stopped");
                            }
                        }
                    }
                    Err(e) => debug!("Mock backend ignoring message: {}", e),
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Mock backend client error: {}", e);
                    break;
                }
                None => break,
            },
            _ = ticker.tick(), if emitting => {
                let label = gestures[next % gestures.len()].clone();
                next += 1;
                if ws.send(Message::Text(label)).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("Connection closed");
    journal.lock().await.push(BackendEvent::Disconnected);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::connect_async;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_bind_rejects_empty_gestures() {
        let result = MockGestureBackend::bind("127.0.0.1:0", Vec::new(), Duration::from_millis(10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_emits_only_after_start() {
        let backend = MockGestureBackend::bind(
            "127.0.0.1:0",
            labels(&["fist", "thumbs_up"]),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
        let mut handle = backend.spawn().unwrap();

        let (mut ws, _) = connect_async(handle.endpoint()).await.unwrap();

        // Nothing arrives before start
        let idle = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
        assert!(idle.is_err());

        ws.send(Message::Text("start".to_string())).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(first, Message::Text("fist".to_string()));
        let second = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second, Message::Text("thumbs_up".to_string()));

        ws.send(Message::Text("stop".to_string())).await.unwrap();
        ws.close(None).await.unwrap();

        // The backend answers our close only after it has read the stop
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;
        assert!(drained.is_ok());

        assert_eq!(
            handle.controls().await,
            vec![ControlMessage::Start, ControlMessage::Stop]
        );
        handle.shutdown().await;
    }

    #[test]
    fn test_default_gestures_start_with_placeholder() {
        assert_eq!(DEFAULT_GESTURES[0], "No gesture detected");
        assert_eq!(DEFAULT_GESTURES.len(), 8);
    }
}
