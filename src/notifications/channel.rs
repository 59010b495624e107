use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::payload::PushMessage;

pub type ChannelId = Uuid;

/// A write to a push channel that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {0} buffer is full")]
    Full(ChannelId),

    #[error("Channel {0} is closed")]
    Closed(ChannelId),

    #[error("Channel {id} transport error: {reason}")]
    Transport { id: ChannelId, reason: String },
}

/// Server-to-client push connection supplied by the transport layer.
///
/// `send` must return promptly: implementations buffer or give up rather
/// than wait on a slow client.
pub trait PushChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    fn send(&self, message: &PushMessage) -> Result<(), ChannelError>;
}

/// Push channel backed by a bounded in-process buffer.
///
/// The transport drains the paired receiver into its connection. A full
/// buffer means the client stopped reading, and the write fails instead of
/// waiting.
pub struct BufferedChannel {
    id: ChannelId,
    sender: mpsc::Sender<PushMessage>,
}

impl BufferedChannel {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PushMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let channel = Self {
            id: Uuid::new_v4(),
            sender,
        };
        (channel, receiver)
    }
}

impl PushChannel for BufferedChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, message: &PushMessage) -> Result<(), ChannelError> {
        self.sender.try_send(message.clone()).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full(self.id),
            TrySendError::Closed(_) => ChannelError::Closed(self.id),
        })
    }
}
