//! Session Manager for the gesture backend connection lifecycle

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::gesture::{
    ChannelClosure, ChannelHandle, ChannelId, Connector, TransportEvent, TransportEventKind,
    WebSocketConnector,
};

use super::intent_channel::{IntentChannel, SessionHandle, SessionIntent};
use super::state_machine::{
    ConnectionState, DisconnectReason, Rejection, SessionEffect, SessionInput, SessionMachine,
};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Status shown before any frame has been received
    pub initial_status: String,
    /// How long `run` waits for released channels to finish closing
    pub shutdown_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_status: "No gesture detected".to_string(),
            shutdown_grace_ms: 2000,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            initial_status: config.session.initial_status.clone(),
            shutdown_grace_ms: config.backend.close_timeout_ms,
        }
    }
}

/// Observable session state, published on every state or status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub last_status: String,
    /// Channel currently held, if any
    pub channel: Option<ChannelId>,
    pub last_disconnect: Option<DisconnectReason>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state.is_active()
    }
}

/// Session statistics for monitoring
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub channels_opened: u64,
    pub frames_received: u64,
    pub control_messages_queued: u64,
    pub intents_rejected: u64,
    pub stale_events_dropped: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            channels_opened: 0,
            frames_received: 0,
            control_messages_queued: 0,
            intents_rejected: 0,
            stale_events_dropped: 0,
            last_frame_at: None,
        }
    }
}

/// Owns the single channel to the gesture backend and drives the session
/// state machine from user intents and transport events
pub struct SessionManager<C: Connector = WebSocketConnector> {
    config: SessionConfig,
    machine: SessionMachine,
    connector: C,
    /// Present iff the state is not `Disconnected`
    channel: Option<ChannelHandle>,
    next_channel_id: u64,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    intent_channel: IntentChannel,
    /// Connection tasks of released channels that may still be closing
    retired: Vec<JoinHandle<()>>,
    stats: SessionStats,
}

impl SessionManager<WebSocketConnector> {
    /// Create a manager connecting to the configured backend endpoint
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            WebSocketConnector::from_config(&config.backend),
            SessionConfig::from(config),
        )
    }
}

impl<C: Connector> SessionManager<C> {
    /// Create a new SessionManager in `Disconnected`
    pub fn new(connector: C, config: SessionConfig) -> Self {
        let machine = SessionMachine::new(config.initial_status.clone());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            state: machine.state(),
            last_status: machine.last_status().to_string(),
            channel: None,
            last_disconnect: None,
        });
        let intent_channel = IntentChannel::new();

        Self {
            config,
            machine,
            connector,
            channel: None,
            next_channel_id: 0,
            event_tx,
            event_rx,
            snapshot_tx,
            intent_channel,
            retired: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    /// Open a channel to the backend. No-op unless `Disconnected`.
    pub fn request_start(&mut self) {
        self.dispatch(SessionInput::StartRequested);
    }

    /// Stop the active session, or cancel a start that is still connecting
    pub fn request_stop(&mut self) {
        self.dispatch(SessionInput::StopRequested);
    }

    /// Close any open channel without sending `stop` and settle at
    /// `Disconnected`. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.dispatch(SessionInput::Teardown);
    }

    /// Feed one transport event. Events from channels other than the one
    /// currently held are dropped.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let current = self.channel.as_ref().map(ChannelHandle::id);
        if current != Some(event.channel) {
            debug!(
                "Dropping stale event from channel {} (current: {:?})",
                event.channel, current
            );
            self.stats.stale_events_dropped += 1;
            return;
        }

        let input = match event.kind {
            TransportEventKind::Opened => SessionInput::ChannelOpened,
            TransportEventKind::Frame(status) => {
                self.stats.frames_received += 1;
                self.stats.last_frame_at = Some(Utc::now());
                SessionInput::FrameReceived(status)
            }
            TransportEventKind::Closed(closure) => {
                if let ChannelClosure::Error(e) | ChannelClosure::ConnectFailed(e) = &closure {
                    warn!("Channel {} ended: {}", event.channel, e);
                }
                SessionInput::ChannelClosed(closure)
            }
        };
        self.dispatch(input);
    }

    /// Wait for the next transport event
    pub async fn next_transport_event(&mut self) -> Option<TransportEvent> {
        self.event_rx.recv().await
    }

    /// Apply every transport event already queued, without waiting
    pub fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_transport_event(event);
            processed += 1;
        }
        processed
    }

    /// Handle for the presentation layer
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.intent_channel.intent_tx(), self.snapshot_tx.subscribe())
    }

    /// Receiver notified on every state or status change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    pub fn last_status(&self) -> &str {
        self.machine.last_status()
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn get_stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run the session loop until a shutdown intent arrives. The channel is
    /// always torn down on exit.
    pub async fn run(&mut self) -> Result<()> {
        let mut intents = self
            .intent_channel
            .take_receiver()
            .ok_or_else(|| anyhow::anyhow!("Session loop is already running"))?;

        info!("Starting gesture session loop");

        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(SessionIntent::Start) => self.request_start(),
                    Some(SessionIntent::Stop) => self.request_stop(),
                    Some(SessionIntent::Toggle) => {
                        if self.state() == ConnectionState::Disconnected {
                            self.request_start();
                        } else {
                            self.request_stop();
                        }
                    }
                    Some(SessionIntent::Shutdown) | None => {
                        info!("Session shutdown requested");
                        break;
                    }
                },
                Some(event) = self.event_rx.recv() => {
                    self.handle_transport_event(event);
                }
            }
        }

        self.teardown();
        self.wait_for_retired().await;
        info!("Session loop terminated");
        Ok(())
    }

    /// Wait, bounded by the shutdown grace period, for released channels to
    /// finish closing their sockets
    pub async fn wait_for_retired(&mut self) {
        let retired: Vec<_> = self.retired.drain(..).collect();
        if retired.is_empty() {
            return;
        }

        let grace = Duration::from_millis(self.config.shutdown_grace_ms);
        let wait = async {
            for task in retired {
                if let Err(e) = task.await {
                    warn!("Channel task ended abnormally: {}", e);
                }
            }
        };
        if tokio::time::timeout(grace, wait).await.is_err() {
            warn!("Channels still closing after {:?}, abandoning them", grace);
        }
    }

    fn dispatch(&mut self, input: SessionInput) {
        let transition = self.machine.dispatch(input);

        if let Some(rejection) = transition.rejected {
            match rejection {
                Rejection::RedundantStart | Rejection::StopWithoutActiveChannel => {
                    self.stats.intents_rejected += 1;
                    debug!("Ignoring intent in {}: {:?}", transition.from, rejection);
                }
                Rejection::FrameIgnored | Rejection::UnexpectedEvent => {
                    debug!("Ignoring transport event in {}: {:?}", transition.from, rejection);
                }
            }
        }

        for effect in transition.effects.iter() {
            self.apply(effect);
        }

        if transition.from != transition.to {
            match self.machine.last_disconnect() {
                Some(reason) if transition.to == ConnectionState::Disconnected => {
                    info!("Session {} -> {} ({})", transition.from, transition.to, reason)
                }
                _ => info!("Session {} -> {}", transition.from, transition.to),
            }
        }

        debug_assert_eq!(self.channel.is_some(), self.machine.state().has_channel());

        if transition.changed() {
            self.publish();
        }
    }

    fn apply(&mut self, effect: &SessionEffect) {
        match effect {
            SessionEffect::OpenChannel => {
                self.next_channel_id += 1;
                let id = ChannelId(self.next_channel_id);
                let handle = self.connector.open(id, self.event_tx.clone());
                self.channel = Some(handle);
                self.stats.channels_opened += 1;
            }
            SessionEffect::Send(message) => {
                if let Some(channel) = &self.channel {
                    // A failed send means the task already ended; its Closed
                    // event is queued and will settle the state.
                    match channel.send(*message) {
                        Ok(()) => self.stats.control_messages_queued += 1,
                        Err(e) => warn!("Failed to send '{}': {}", message, e),
                    }
                }
            }
            SessionEffect::CloseChannel => {
                if let Some(channel) = &self.channel {
                    if let Err(e) = channel.close() {
                        warn!("Failed to close channel: {}", e);
                    }
                }
            }
            SessionEffect::ReleaseChannel => {
                if let Some(channel) = self.channel.take() {
                    debug!("Releasing channel {}", channel.id());
                    self.retired.retain(|task| !task.is_finished());
                    if let Some(task) = channel.release() {
                        self.retired.push(task);
                    }
                }
            }
        }
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            state: self.machine.state(),
            last_status: self.machine.last_status().to_string(),
            channel: self.channel.as_ref().map(ChannelHandle::id),
            last_disconnect: self.machine.last_disconnect().cloned(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

impl<C: Connector> Drop for SessionManager<C> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!("SessionManager dropped without teardown, closing channel");
        }
    }
}
