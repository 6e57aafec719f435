//! Client struct definition
//!
//! Represents a joined room member: its connection ID, username, the
//! bounded outbound mailbox drained by its writer task, and the signal that
//! tells its session it has been removed.

use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ChatMessage;
use crate::types::ConnectionId;

/// Joined room member
#[derive(Debug)]
pub struct Client {
    /// Connection this member arrived on
    pub id: ConnectionId,
    /// Display name given at join time
    pub username: String,
    /// Room → Client outbound mailbox
    pub sender: mpsc::Sender<ChatMessage>,
    /// Never sent on; dropping the record wakes the member's session
    pub removed: oneshot::Sender<()>,
}

impl Client {
    /// Create a new member record
    pub fn new(
        id: ConnectionId,
        username: String,
        sender: mpsc::Sender<ChatMessage>,
        removed: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            username,
            sender,
            removed,
        }
    }

    /// Hand a message to this member's outbound mailbox without waiting
    ///
    /// Returns `SendError::Full` if the writer has fallen behind and
    /// `SendError::ChannelClosed` if the writer is gone.
    pub fn deliver(&self, msg: ChatMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}
