//! Room registry
//!
//! The process-wide owner of every room, keyed by unique name. Creation
//! validates names and capacities; lookups and listings hand out handles or
//! copied snapshots, never the room state itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::RoomInfo;
use crate::room::Room;
use crate::types::{
    private_chat_name, validate_capacity, validate_room_name, validate_username, RoomKind,
    PRIVATE_CHAT_CAPACITY,
};

/// Channel sizes used for every room the hub creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    /// Per-room command mailbox
    pub mailbox_capacity: usize,
    /// Per-member outbound mailbox; a member that falls this far behind is dropped
    pub outbound_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            outbound_capacity: 64,
        }
    }
}

/// Room registry
///
/// Cheap to clone; clones share the same rooms.
#[derive(Debug, Clone)]
pub struct Hub {
    /// All rooms: name -> Room
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    settings: HubSettings,
}

impl Hub {
    /// Create an empty registry
    pub fn new(settings: HubSettings) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Settings applied to new rooms and members
    pub fn settings(&self) -> HubSettings {
        self.settings
    }

    /// Create a public room
    ///
    /// Fails with `InvalidName`, `InvalidCapacity` or `DuplicateRoom`; a
    /// failed call leaves existing rooms untouched.
    pub async fn create_room(&self, name: &str, capacity: usize) -> Result<Room, AppError> {
        validate_room_name(name)?;
        validate_capacity(capacity)?;
        self.insert(name, capacity, RoomKind::Public).await
    }

    /// Create the well-known room every client can reach on startup
    ///
    /// Not bound by the client-facing capacity range.
    pub async fn create_default_room(&self, name: &str, capacity: usize) -> Result<Room, AppError> {
        validate_room_name(name)?;
        if capacity == 0 {
            return Err(AppError::InvalidCapacity(capacity.to_string()));
        }
        self.insert(name, capacity, RoomKind::Public).await
    }

    /// Create a two-party room for `a` and `b`
    pub async fn create_private_chat(&self, a: &str, b: &str) -> Result<Room, AppError> {
        validate_username(a)?;
        validate_username(b)?;

        let name = private_chat_name(a, b);
        validate_room_name(&name)?;

        let mut participants = [a.to_string(), b.to_string()];
        participants.sort();
        self.insert(&name, PRIVATE_CHAT_CAPACITY, RoomKind::Private { participants })
            .await
    }

    /// Look up a room by name
    pub async fn get_room(&self, name: &str) -> Result<Room, AppError> {
        self.rooms
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    /// Snapshot of every room's capacity and member count
    pub async fn list_rooms(&self) -> BTreeMap<String, RoomInfo> {
        let rooms: Vec<Room> = self.rooms.read().await.values().cloned().collect();

        let mut listing = BTreeMap::new();
        for room in rooms {
            match room.info().await {
                Ok(info) => {
                    listing.insert(room.name().to_string(), info);
                }
                Err(e) => warn!("Skipping room in listing: {}", e),
            }
        }
        listing
    }

    /// Disconnect every member of every room
    pub async fn shutdown(&self) {
        let rooms: Vec<Room> = self.rooms.read().await.values().cloned().collect();

        for room in rooms {
            match room.close_all().await {
                Ok(count) => info!("Closed {} member(s) of room '{}'", count, room.name()),
                Err(e) => warn!("Failed to close room: {}", e),
            }
        }
    }

    async fn insert(&self, name: &str, capacity: usize, kind: RoomKind) -> Result<Room, AppError> {
        let mut rooms = self.rooms.write().await;

        if rooms.contains_key(name) {
            debug!("Room '{}' creation failed. Already exists.", name);
            return Err(AppError::DuplicateRoom(name.to_string()));
        }

        let room = Room::spawn(
            name.to_string(),
            capacity,
            kind,
            self.settings.mailbox_capacity,
        );
        rooms.insert(name.to_string(), room.clone());

        info!("Room '{}' has been created (capacity {})", name, capacity);
        Ok(room)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::message::ChatMessage;

    #[tokio::test]
    async fn test_create_room_once() {
        let hub = Hub::default();
        hub.create_room("x", 10).await.unwrap();

        let err = hub.create_room("x", 10).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateRoom(_)));

        let rooms = hub.list_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms["x"].capacity, 10);
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_room_untouched() {
        let hub = Hub::default();
        let room = hub.create_room("x", 10).await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let id = room.join("A", tx).await.unwrap().id;
        room.receive(id, ChatMessage::new("A", "hi")).await.unwrap();

        assert!(hub.create_room("x", 5).await.is_err());

        let room = hub.get_room("x").await.unwrap();
        assert_eq!(room.capacity(), 10);
        assert_eq!(room.history().await.unwrap().len(), 1);
        assert_eq!(room.roster().await.unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_create_room_validation() {
        let hub = Hub::default();
        assert!(matches!(
            hub.create_room("", 10).await,
            Err(AppError::InvalidName(_))
        ));
        assert!(matches!(
            hub.create_room("this-name-is-far-too-long", 10).await,
            Err(AppError::InvalidName(_))
        ));
        assert!(matches!(
            hub.create_room("small", 4).await,
            Err(AppError::InvalidCapacity(_))
        ));
        assert!(matches!(
            hub.create_room("big", 21).await,
            Err(AppError::InvalidCapacity(_))
        ));
        assert!(hub.list_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_default_room_may_exceed_client_range() {
        let hub = Hub::default();
        hub.create_default_room("Global", 50).await.unwrap();
        assert_eq!(hub.list_rooms().await["Global"].capacity, 50);
    }

    #[tokio::test]
    async fn test_get_room_not_found() {
        let hub = Hub::default();
        assert!(matches!(
            hub.get_room("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_private_chat() {
        let hub = Hub::default();
        let room = hub.create_private_chat("bob", "alice").await.unwrap();

        assert_eq!(room.name(), "Private_alice_bob");
        assert_eq!(room.capacity(), 2);
        assert!(room.admit("alice").is_ok());
        assert!(room.admit("bob").is_ok());
        assert!(matches!(room.admit("carol"), Err(AppError::Unauthorized)));

        assert!(matches!(
            hub.create_private_chat("alice", "bob").await,
            Err(AppError::DuplicateRoom(_))
        ));
        assert_eq!(hub.list_rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_private_chat_validation() {
        let hub = Hub::default();
        assert!(matches!(
            hub.create_private_chat("", "bob").await,
            Err(AppError::InvalidUsername)
        ));
        assert!(matches!(
            hub.create_private_chat("alice", "").await,
            Err(AppError::InvalidUsername)
        ));
        assert!(matches!(
            hub.create_private_chat("alexandra", "bartholomew").await,
            Err(AppError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_list_rooms_counts_members() {
        let hub = Hub::default();
        let room = hub.create_room("lobby", 5).await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        room.join("A", tx).await.unwrap();

        let listing = hub.list_rooms().await;
        assert_eq!(listing["lobby"].client_count, 1);
        assert_eq!(listing["lobby"].capacity, 5);
    }

    #[tokio::test]
    async fn test_shutdown_empties_every_room() {
        let hub = Hub::default();
        let lobby = hub.create_room("lobby", 5).await.unwrap();
        let other = hub.create_room("other", 5).await.unwrap();
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);
        lobby.join("A", tx1).await.unwrap();
        other.join("B", tx2).await.unwrap();

        hub.shutdown().await;

        let listing = hub.list_rooms().await;
        assert!(listing.values().all(|info| info.client_count == 0));
    }
}
