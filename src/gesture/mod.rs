//! Gesture backend integration module
//!
//! Handles the WebSocket channel to the gesture-detection backend, the plain-text
//! control protocol, and a scripted backend for local runs.

pub mod channel;
pub mod mock;
pub mod protocol;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use channel::{ChannelCommand, ChannelHandle, Connector};
pub use mock::MockGestureBackend;
pub use protocol::{ControlMessage, InboundFrame};
pub use types::*;
pub use websocket::WebSocketConnector;
