//! Gesture session management module
//!
//! This module provides the session lifecycle components: the explicit state
//! machine, the manager that owns the backend channel, and the intent channel
//! used by the presentation layer.

pub mod intent_channel;
pub mod session_manager;
pub mod state_machine;

pub use intent_channel::{IntentChannel, SessionHandle, SessionIntent};
pub use session_manager::{SessionConfig, SessionManager, SessionSnapshot, SessionStats};
pub use state_machine::{ConnectionState, DisconnectReason, SessionMachine};
