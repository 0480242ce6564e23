//! Session state machine
//!
//! Pure transition logic for one gesture session. The machine never touches a
//! socket; it returns the effects its owner must apply.

use std::fmt;

use crate::gesture::{ChannelClosure, ControlMessage};

/// Connection state published to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Active,
    Disconnecting,
}

impl ConnectionState {
    /// Whether a channel must be held in this state
    pub fn has_channel(self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Active)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Active => "Active",
            ConnectionState::Disconnecting => "Disconnecting",
        };
        f.write_str(label)
    }
}

/// Why the most recent channel ended. Diagnostic only: every reason still
/// settles at `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// User stop completed
    StopRequested,
    /// Stop requested while the channel was still opening
    Cancelled,
    /// Backend closed the channel
    RemoteClosed,
    TransportError(String),
    ConnectFailed(String),
    Teardown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::StopRequested => write!(f, "stopped"),
            DisconnectReason::Cancelled => write!(f, "cancelled before start"),
            DisconnectReason::RemoteClosed => write!(f, "backend closed the connection"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {}", e),
            DisconnectReason::ConnectFailed(e) => write!(f, "backend unavailable: {}", e),
            DisconnectReason::Teardown => write!(f, "torn down"),
        }
    }
}

/// Input to the state machine: a user intent or a transport event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    StartRequested,
    StopRequested,
    Teardown,
    ChannelOpened,
    FrameReceived(String),
    ChannelClosed(ChannelClosure),
}

/// Action the owner of the machine must perform, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    OpenChannel,
    Send(ControlMessage),
    CloseChannel,
    ReleaseChannel,
}

/// Inputs that were valid to deliver but had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    RedundantStart,
    StopWithoutActiveChannel,
    /// Frame arrived outside `Active`
    FrameIgnored,
    /// Transport event that does not apply to the current state
    UnexpectedEvent,
}

/// Result of dispatching one input
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub effects: Vec<SessionEffect>,
    pub status_changed: bool,
    pub rejected: Option<Rejection>,
}

impl Transition {
    fn stay(state: ConnectionState) -> Self {
        Self {
            from: state,
            to: state,
            effects: Vec::new(),
            status_changed: false,
            rejected: None,
        }
    }

    fn rejected(state: ConnectionState, rejection: Rejection) -> Self {
        Self {
            rejected: Some(rejection),
            ..Self::stay(state)
        }
    }

    /// Whether observers need to see a new snapshot
    pub fn changed(&self) -> bool {
        self.from != self.to || self.status_changed
    }
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: ConnectionState,
    last_status: String,
    last_disconnect: Option<DisconnectReason>,
    /// Stop requested while `Connecting`
    stop_pending: bool,
    /// Reason to report once a local close completes
    closing_reason: Option<DisconnectReason>,
}

impl SessionMachine {
    pub fn new(initial_status: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_status: initial_status.into(),
            last_disconnect: None,
            stop_pending: false,
            closing_reason: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_status(&self) -> &str {
        &self.last_status
    }

    pub fn last_disconnect(&self) -> Option<&DisconnectReason> {
        self.last_disconnect.as_ref()
    }

    pub fn stop_pending(&self) -> bool {
        self.stop_pending
    }

    /// Apply one input and return the resulting transition
    pub fn dispatch(&mut self, input: SessionInput) -> Transition {
        use ConnectionState::*;

        let from = self.state;
        match (from, input) {
            (Disconnected, SessionInput::StartRequested) => {
                self.stop_pending = false;
                self.closing_reason = None;
                self.move_to(from, Connecting, vec![SessionEffect::OpenChannel])
            }
            (Connecting, SessionInput::StartRequested) if self.stop_pending => {
                // Start again before the channel opened: keep the pending start
                self.stop_pending = false;
                Transition::stay(from)
            }
            (_, SessionInput::StartRequested) => Transition::rejected(from, Rejection::RedundantStart),

            (Active, SessionInput::StopRequested) => {
                self.closing_reason = Some(DisconnectReason::StopRequested);
                self.move_to(
                    from,
                    Disconnecting,
                    vec![
                        SessionEffect::Send(ControlMessage::Stop),
                        SessionEffect::CloseChannel,
                    ],
                )
            }
            (Connecting, SessionInput::StopRequested) => {
                self.stop_pending = true;
                Transition::stay(from)
            }
            (Disconnected | Disconnecting, SessionInput::StopRequested) => {
                Transition::rejected(from, Rejection::StopWithoutActiveChannel)
            }

            (Disconnected, SessionInput::Teardown) => Transition::stay(from),
            (_, SessionInput::Teardown) => {
                self.finish(from, DisconnectReason::Teardown)
            }

            (Connecting, SessionInput::ChannelOpened) if self.stop_pending => {
                // Cancelled start: close the half-open channel without `start`
                self.stop_pending = false;
                self.closing_reason = Some(DisconnectReason::Cancelled);
                self.move_to(from, Disconnecting, vec![SessionEffect::CloseChannel])
            }
            (Connecting, SessionInput::ChannelOpened) => self.move_to(
                from,
                Active,
                vec![SessionEffect::Send(ControlMessage::Start)],
            ),
            (_, SessionInput::ChannelOpened) => Transition::rejected(from, Rejection::UnexpectedEvent),

            (Active, SessionInput::FrameReceived(status)) => {
                let mut transition = Transition::stay(from);
                if status != self.last_status {
                    self.last_status = status;
                    transition.status_changed = true;
                }
                transition
            }
            (_, SessionInput::FrameReceived(_)) => Transition::rejected(from, Rejection::FrameIgnored),

            (Disconnected, SessionInput::ChannelClosed(_)) => {
                Transition::rejected(from, Rejection::UnexpectedEvent)
            }
            (Disconnecting, SessionInput::ChannelClosed(closure)) => {
                let reason = match closure {
                    ChannelClosure::Error(e) => DisconnectReason::TransportError(e),
                    _ => self
                        .closing_reason
                        .take()
                        .unwrap_or(DisconnectReason::StopRequested),
                };
                self.finish(from, reason)
            }
            (Connecting | Active, SessionInput::ChannelClosed(closure)) => {
                let reason = match closure {
                    ChannelClosure::Local => DisconnectReason::Cancelled,
                    ChannelClosure::Remote => DisconnectReason::RemoteClosed,
                    ChannelClosure::ConnectFailed(e) => DisconnectReason::ConnectFailed(e),
                    ChannelClosure::Error(e) => DisconnectReason::TransportError(e),
                };
                self.finish(from, reason)
            }
        }
    }

    fn move_to(
        &mut self,
        from: ConnectionState,
        to: ConnectionState,
        effects: Vec<SessionEffect>,
    ) -> Transition {
        self.state = to;
        Transition {
            from,
            to,
            effects,
            status_changed: false,
            rejected: None,
        }
    }

    /// Settle at `Disconnected`, releasing the channel
    fn finish(&mut self, from: ConnectionState, reason: DisconnectReason) -> Transition {
        self.stop_pending = false;
        self.closing_reason = None;
        self.last_disconnect = Some(reason);
        self.move_to(
            from,
            ConnectionState::Disconnected,
            vec![SessionEffect::ReleaseChannel],
        )
    }
}
