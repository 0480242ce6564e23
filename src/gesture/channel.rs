//! Channel ownership between a session and its connection task

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::protocol::ControlMessage;
use super::types::{ChannelId, TransportError, TransportEvent};

/// Command queued for a connection task, processed in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCommand {
    Send(ControlMessage),
    Close,
}

/// Opens channels to the gesture backend
///
/// The connection behind the returned handle reports its lifecycle through
/// `events`, every event tagged with `id`. The last event of a channel is
/// always `Closed`.
pub trait Connector {
    fn open(
        &mut self,
        id: ChannelId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> ChannelHandle;
}

/// Exclusive handle to one channel. Dropping it closes the channel.
#[derive(Debug)]
pub struct ChannelHandle {
    id: ChannelId,
    commands: mpsc::UnboundedSender<ChannelCommand>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn new(
        id: ChannelId,
        commands: mpsc::UnboundedSender<ChannelCommand>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self { id, commands, task }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Queue a control message
    pub fn send(&self, message: ControlMessage) -> Result<(), TransportError> {
        self.commands
            .send(ChannelCommand::Send(message))
            .map_err(|_| TransportError::ChannelClosed(self.id))
    }

    /// Queue a graceful close after any pending messages
    pub fn close(&self) -> Result<(), TransportError> {
        self.commands
            .send(ChannelCommand::Close)
            .map_err(|_| TransportError::ChannelClosed(self.id))
    }

    /// Release the handle, returning the connection task if there is one.
    /// The task observes the dropped command sender and closes the socket.
    pub fn release(self) -> Option<JoinHandle<()>> {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_queued_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(ChannelId(3), tx, None);

        handle.send(ControlMessage::Stop).unwrap();
        handle.close().unwrap();

        assert_eq!(rx.try_recv().unwrap(), ChannelCommand::Send(ControlMessage::Stop));
        assert_eq!(rx.try_recv().unwrap(), ChannelCommand::Close);
    }

    #[test]
    fn test_release_drops_command_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(ChannelId(1), tx, None);

        assert!(handle.release().is_none());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_send_after_task_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(ChannelId(2), tx, None);
        drop(rx);

        let err = handle.send(ControlMessage::Start).unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed(ChannelId(2))));
    }
}
