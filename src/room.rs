//! Room actor implementation
//!
//! Each room is owned by a single actor task that holds its members and its
//! history. All mutations arrive through the room's mailbox, so history
//! order and delivery order are the same thing, and a join can never race
//! with a fan-out.
//!
//! `Room` is the cloneable handle the rest of the crate talks to.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::AppError;
use crate::message::{ChatMessage, Disconnect, RoomInfo};
use crate::types::{validate_username, ConnectionId, RoomKind};

/// Commands sent from handles to a room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Register a member if there is room for it
    Join {
        id: ConnectionId,
        username: String,
        sender: mpsc::Sender<ChatMessage>,
        removed: oneshot::Sender<()>,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    /// Remove a member (no-op if absent)
    Leave { id: ConnectionId, reason: Disconnect },
    /// A member sent a chat message
    Receive { id: ConnectionId, message: ChatMessage },
    /// Copy of the history
    History { reply: oneshot::Sender<Vec<ChatMessage>> },
    /// Copy of the member usernames
    Roster { reply: oneshot::Sender<Vec<String>> },
    /// Capacity and member count
    Info { reply: oneshot::Sender<RoomInfo> },
    /// Drop every member, replying with how many were removed
    CloseAll { reply: oneshot::Sender<usize> },
}

/// A membership granted by `Room::join`
#[derive(Debug)]
pub struct Membership {
    /// Connection ID keying this membership
    pub id: ConnectionId,
    /// Resolves (with an error) once the room has dropped this member,
    /// whether it left, was evicted or the room closed everyone
    pub removed: oneshot::Receiver<()>,
}

/// Handle to a running room
#[derive(Debug, Clone)]
pub struct Room {
    name: String,
    capacity: usize,
    kind: RoomKind,
    mailbox: mpsc::Sender<RoomCommand>,
}

impl Room {
    /// Start the actor for a new, empty room and return its handle
    ///
    /// The actor stops once every handle has been dropped.
    pub fn spawn(name: String, capacity: usize, kind: RoomKind, mailbox_capacity: usize) -> Self {
        let (mailbox, receiver) = mpsc::channel(mailbox_capacity);
        let actor = RoomActor::new(name.clone(), capacity, receiver);
        tokio::spawn(actor.run());

        Self {
            name,
            capacity,
            kind,
            mailbox,
        }
    }

    /// Room name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of members
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check the username-only join rules
    pub fn admit(&self, username: &str) -> Result<(), AppError> {
        validate_username(username)?;
        if !self.kind.admits(username) {
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }

    /// Check whether `username` could join right now
    ///
    /// Used before a stream upgrade so the client gets a plain HTTP error.
    /// The capacity check is repeated by `join`, which is authoritative.
    pub async fn check_admission(&self, username: &str) -> Result<(), AppError> {
        self.admit(username)?;
        if self.info().await?.client_count >= self.capacity {
            return Err(self.full());
        }
        Ok(())
    }

    /// Join the room, receiving broadcasts on `sender`
    ///
    /// Returns the connection ID that now keys this membership, with a
    /// signal that fires when the room drops the member.
    pub async fn join(
        &self,
        username: &str,
        sender: mpsc::Sender<ChatMessage>,
    ) -> Result<Membership, AppError> {
        self.admit(username)?;

        let id = ConnectionId::new();
        let (removed, on_removed) = oneshot::channel();
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Join {
            id,
            username: username.to_string(),
            sender,
            removed,
            reply,
        })
        .await?;

        response.await.map_err(|_| self.closed())??;
        Ok(Membership {
            id,
            removed: on_removed,
        })
    }

    /// Leave the room; removing an absent connection is a no-op
    pub async fn leave(&self, id: ConnectionId, reason: Disconnect) {
        // A stopped actor has no members left to remove
        let _ = self.send(RoomCommand::Leave { id, reason }).await;
    }

    /// Enqueue a message from member `id` for broadcast
    pub(crate) async fn receive(&self, id: ConnectionId, message: ChatMessage) -> Result<(), AppError> {
        self.send(RoomCommand::Receive { id, message }).await
    }

    /// Snapshot of every message broadcast so far, oldest first
    pub async fn history(&self) -> Result<Vec<ChatMessage>, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::History { reply }).await?;
        response.await.map_err(|_| self.closed())
    }

    /// Snapshot of the current member usernames
    pub async fn roster(&self) -> Result<Vec<String>, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Roster { reply }).await?;
        response.await.map_err(|_| self.closed())
    }

    /// Snapshot of capacity and member count
    pub async fn info(&self) -> Result<RoomInfo, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Info { reply }).await?;
        response.await.map_err(|_| self.closed())
    }

    /// Disconnect every member, returning how many were removed
    pub async fn close_all(&self) -> Result<usize, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::CloseAll { reply }).await?;
        response.await.map_err(|_| self.closed())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), AppError> {
        self.mailbox.send(cmd).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> AppError {
        AppError::RoomClosed(self.name.clone())
    }

    fn full(&self) -> AppError {
        AppError::RoomFull {
            name: self.name.clone(),
            capacity: self.capacity,
        }
    }
}

/// The room actor
///
/// Owns the membership map and the history. Never awaits anything but its
/// own mailbox: deliveries go to bounded per-member mailboxes with
/// `try_send`, and a member that cannot take a message is removed.
struct RoomActor {
    name: String,
    capacity: usize,
    /// Joined members: ConnectionId -> Client
    members: HashMap<ConnectionId, Client>,
    /// Append-only message history
    history: Vec<ChatMessage>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    fn new(name: String, capacity: usize, receiver: mpsc::Receiver<RoomCommand>) -> Self {
        Self {
            name,
            capacity,
            members: HashMap::new(),
            history: Vec::new(),
            receiver,
        }
    }

    /// Run the room event loop until every handle is dropped
    async fn run(mut self) {
        debug!("[ {} ] room actor started", self.name);

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("[ {} ] room actor stopped", self.name);
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                id,
                username,
                sender,
                removed,
                reply,
            } => {
                let _ = reply.send(self.handle_join(id, username, sender, removed));
            }
            RoomCommand::Leave { id, reason } => {
                self.handle_leave(id, &reason.to_string());
            }
            RoomCommand::Receive { id, message } => {
                self.handle_receive(id, message);
            }
            RoomCommand::History { reply } => {
                let _ = reply.send(self.history.clone());
            }
            RoomCommand::Roster { reply } => {
                let roster = self.members.values().map(|c| c.username.clone()).collect();
                let _ = reply.send(roster);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(RoomInfo {
                    capacity: self.capacity,
                    client_count: self.members.len(),
                });
            }
            RoomCommand::CloseAll { reply } => {
                let _ = reply.send(self.handle_close_all());
            }
        }
    }

    fn handle_join(
        &mut self,
        id: ConnectionId,
        username: String,
        sender: mpsc::Sender<ChatMessage>,
        removed: oneshot::Sender<()>,
    ) -> Result<(), AppError> {
        if self.members.len() >= self.capacity {
            return Err(AppError::RoomFull {
                name: self.name.clone(),
                capacity: self.capacity,
            });
        }

        info!("[ {} ] {} joined ({})", self.name, username, id);
        self.members.insert(id, Client::new(id, username, sender, removed));
        debug!(
            "[ {} ] members: {}/{}",
            self.name,
            self.members.len(),
            self.capacity
        );
        Ok(())
    }

    fn handle_leave(&mut self, id: ConnectionId, reason: &str) {
        if let Some(client) = self.members.remove(&id) {
            info!("[ {} ] {} {}", self.name, client.username, reason);
        }
    }

    /// Append to history, then fan out to the members present right now
    fn handle_receive(&mut self, id: ConnectionId, message: ChatMessage) {
        if !self.members.contains_key(&id) {
            debug!("[ {} ] dropping message from departed {}", self.name, id);
            return;
        }

        debug!("[ {} ] {} : {}", self.name, message.username, message.content);
        self.history.push(message.clone());

        let mut failed = Vec::new();
        for client in self.members.values() {
            if let Err(e) = client.deliver(message.clone()) {
                warn!(
                    "[ {} ] delivery to {} ({}) failed: {}",
                    self.name, client.username, client.id, e
                );
                failed.push((client.id, e));
            }
        }

        for (member_id, e) in failed {
            self.handle_leave(member_id, &format!("was disconnected ({})", e));
        }
    }

    fn handle_close_all(&mut self) -> usize {
        let count = self.members.len();
        for (_, client) in self.members.drain() {
            info!("[ {} ] disconnected user {}", self.name, client.username);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot::error::TryRecvError;

    use super::*;

    fn public_room(capacity: usize) -> Room {
        Room::spawn("lobby".to_string(), capacity, RoomKind::Public, 32)
    }

    #[tokio::test]
    async fn test_join_until_full() {
        let room = public_room(5);
        let mut receivers = Vec::new();

        for i in 0..5 {
            let (tx, rx) = mpsc::channel(8);
            room.join(&format!("user{}", i), tx).await.unwrap();
            receivers.push(rx);
        }

        let (tx, _rx) = mpsc::channel(8);
        let err = room.join("late", tx).await.unwrap_err();
        assert!(matches!(err, AppError::RoomFull { capacity: 5, .. }));
        assert_eq!(room.info().await.unwrap().client_count, 5);
    }

    #[tokio::test]
    async fn test_concurrent_joins_never_exceed_capacity() {
        let room = public_room(5);
        let mut tasks = Vec::new();

        for i in 0..20 {
            let room = room.clone();
            tasks.push(tokio::spawn(async move {
                let (tx, rx) = mpsc::channel(8);
                room.join(&format!("user{}", i), tx).await.map(|_| rx)
            }));
        }

        let mut joined = Vec::new();
        let mut full = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(rx) => joined.push(rx),
                Err(AppError::RoomFull { .. }) => full += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(joined.len(), 5);
        assert_eq!(full, 15);
        assert_eq!(room.roster().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_join_rejects_empty_username() {
        let room = public_room(5);
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            room.join("", tx).await,
            Err(AppError::InvalidUsername)
        ));
    }

    #[tokio::test]
    async fn test_private_room_admits_only_participants() {
        let kind = RoomKind::Private {
            participants: ["alice".to_string(), "bob".to_string()],
        };
        let room = Room::spawn("Private_alice_bob".to_string(), 2, kind, 32);

        let (tx, _rx_a) = mpsc::channel(8);
        room.join("alice", tx).await.unwrap();

        let (tx, _rx_c) = mpsc::channel(8);
        assert!(matches!(
            room.join("carol", tx).await,
            Err(AppError::Unauthorized)
        ));

        let (tx, _rx_b) = mpsc::channel(8);
        room.join("bob", tx).await.unwrap();
        assert_eq!(room.info().await.unwrap().client_count, 2);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member_including_sender() {
        let room = public_room(5);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = room.join("A", tx_a).await.unwrap().id;
        room.join("B", tx_b).await.unwrap();

        room.receive(a, ChatMessage::new("A", "hi")).await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap().content, "hi");
        assert_eq!(rx_b.recv().await.unwrap().content, "hi");

        let history = room.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].username, "A");
    }

    #[tokio::test]
    async fn test_history_is_append_only_and_ordered() {
        let room = public_room(5);
        let (tx, _rx) = mpsc::channel(64);
        let id = room.join("A", tx).await.unwrap().id;

        for i in 0..3 {
            room.receive(id, ChatMessage::new("A", format!("m{}", i)))
                .await
                .unwrap();
        }
        let first = room.history().await.unwrap();

        for i in 3..6 {
            room.receive(id, ChatMessage::new("A", format!("m{}", i)))
                .await
                .unwrap();
        }
        let second = room.history().await.unwrap();

        let contents: Vec<_> = second.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4", "m5"]);
        assert_eq!(&second[..first.len()], &first[..]);
    }

    #[tokio::test]
    async fn test_failed_delivery_evicts_only_that_member() {
        let room = public_room(5);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_dead, rx_dead) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = room.join("A", tx_a).await.unwrap().id;
        room.join("dead", tx_dead).await.unwrap();
        room.join("B", tx_b).await.unwrap();
        drop(rx_dead);

        room.receive(a, ChatMessage::new("A", "hi")).await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap().content, "hi");
        assert_eq!(rx_b.recv().await.unwrap().content, "hi");

        let mut roster = room.roster().await.unwrap();
        roster.sort();
        assert_eq!(roster, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_slow_member_is_disconnected_when_mailbox_full() {
        let room = public_room(5);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_slow, _rx_slow) = mpsc::channel(1);
        let a = room.join("A", tx_a).await.unwrap().id;
        room.join("slow", tx_slow).await.unwrap();

        room.receive(a, ChatMessage::new("A", "one")).await.unwrap();
        room.receive(a, ChatMessage::new("A", "two")).await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap().content, "one");
        assert_eq!(rx_a.recv().await.unwrap().content, "two");
        assert_eq!(room.roster().await.unwrap(), vec!["A"]);
        // Lost for the slow member, not for history
        assert_eq!(room.history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let room = public_room(5);
        let (tx, _rx) = mpsc::channel(8);
        let id = room.join("A", tx).await.unwrap().id;

        room.leave(id, Disconnect::Normal).await;
        room.leave(id, Disconnect::Normal).await;
        room.leave(ConnectionId::new(), Disconnect::GoingAway).await;

        assert!(room.roster().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_from_departed_member_is_dropped() {
        let room = public_room(5);
        let (tx, _rx) = mpsc::channel(8);
        let id = room.join("A", tx).await.unwrap().id;
        room.leave(id, Disconnect::GoingAway).await;

        room.receive(id, ChatMessage::new("A", "late")).await.unwrap();

        assert!(room.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_all_disconnects_members() {
        let room = public_room(5);
        let (tx, mut rx) = mpsc::channel(8);
        room.join("A", tx).await.unwrap();

        assert_eq!(room.close_all().await.unwrap(), 1);
        // Outbound mailbox closed once the member record is dropped
        assert!(rx.recv().await.is_none());
        assert_eq!(room.info().await.unwrap().client_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_usernames_are_allowed() {
        let room = public_room(5);
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);
        let id1 = room.join("A", tx1).await.unwrap().id;
        let id2 = room.join("A", tx2).await.unwrap().id;

        assert_ne!(id1, id2);
        assert_eq!(room.roster().await.unwrap(), vec!["A", "A"]);
    }

    #[tokio::test]
    async fn test_eviction_signals_removed_member() {
        let room = public_room(5);
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_slow, _rx_slow) = mpsc::channel(1);
        let a = room.join("A", tx_a).await.unwrap();
        let mut slow = room.join("slow", tx_slow).await.unwrap();

        room.receive(a.id, ChatMessage::new("A", "one")).await.unwrap();
        assert_eq!(room.roster().await.unwrap().len(), 2);
        assert_eq!(slow.removed.try_recv(), Err(TryRecvError::Empty));
        room.receive(a.id, ChatMessage::new("A", "two")).await.unwrap();

        assert!(slow.removed.await.is_err());
        assert_eq!(room.roster().await.unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_close_all_signals_every_member() {
        let room = public_room(5);
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);
        let a = room.join("A", tx_a).await.unwrap();
        let b = room.join("B", tx_b).await.unwrap();

        room.close_all().await.unwrap();

        assert!(a.removed.await.is_err());
        assert!(b.removed.await.is_err());
    }
}
