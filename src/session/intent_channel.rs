//! Intent channel between the presentation layer and the session loop

use anyhow::Result;
use tokio::sync::{mpsc, watch};

use super::session_manager::SessionSnapshot;
use super::state_machine::ConnectionState;

/// User intents accepted from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIntent {
    Start,
    Stop,
    /// Start when disconnected, stop otherwise
    Toggle,
    /// Tear the session down and end the session loop
    Shutdown,
}

/// Intent channel owned by the session manager
pub struct IntentChannel {
    /// Intent sender
    intent_tx: mpsc::UnboundedSender<SessionIntent>,
    /// Intent receiver, taken once by the session loop
    intent_rx: Option<mpsc::UnboundedReceiver<SessionIntent>>,
}

impl Clone for IntentChannel {
    fn clone(&self) -> Self {
        Self {
            intent_tx: self.intent_tx.clone(),
            intent_rx: None, // Receivers cannot be cloned
        }
    }
}

impl IntentChannel {
    pub fn new() -> Self {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();

        Self {
            intent_tx,
            intent_rx: Some(intent_rx),
        }
    }

    pub fn intent_tx(&self) -> mpsc::UnboundedSender<SessionIntent> {
        self.intent_tx.clone()
    }

    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SessionIntent>> {
        self.intent_rx.take()
    }
}

impl Default for IntentChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Presentation-side handle: sends intents, reads published session state
#[derive(Debug, Clone)]
pub struct SessionHandle {
    intent_tx: mpsc::UnboundedSender<SessionIntent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn new(
        intent_tx: mpsc::UnboundedSender<SessionIntent>,
        snapshot_rx: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            intent_tx,
            snapshot_rx,
        }
    }

    /// Send an intent to the session loop
    pub fn send(&self, intent: SessionIntent) -> Result<()> {
        self.intent_tx
            .send(intent)
            .map_err(|e| anyhow::anyhow!("Failed to send intent: {}", e))
    }

    pub fn start(&self) -> Result<()> {
        self.send(SessionIntent::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(SessionIntent::Stop)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(SessionIntent::Toggle)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionIntent::Shutdown)
    }

    /// New receiver for session snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().state
    }

    /// Check if the session loop is gone
    pub fn is_closed(&self) -> bool {
        self.intent_tx.is_closed()
    }
}
