//! Basic type definitions for the room hub
//!
//! Provides the connection identifier newtype and the validation rules
//! shared by the registry and the HTTP layer:
//! - `ConnectionId`: UUID-based opaque connection identifier
//! - `RoomKind`: public room or two-party private chat

use uuid::Uuid;

use crate::error::AppError;

/// Longest accepted room name, in characters
pub const MAX_ROOM_NAME_LEN: usize = 20;

/// Smallest capacity a client may request for a new room
pub const MIN_ROOM_CAPACITY: usize = 5;

/// Largest capacity a client may request for a new room
pub const MAX_ROOM_CAPACITY: usize = 20;

/// Every private chat holds exactly its two participants
pub const PRIVATE_CHAT_CAPACITY: usize = 2;

const PRIVATE_CHAT_PREFIX: &str = "Private";

/// Opaque connection identifier (newtype pattern)
///
/// Allocated when a connection is accepted and used as the membership key,
/// so a closed stream can never alias a live member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who may join a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomKind {
    /// Anyone with a non-empty username
    Public,
    /// Only the two provisioned usernames
    Private { participants: [String; 2] },
}

impl RoomKind {
    /// Check whether `username` may join a room of this kind
    pub fn admits(&self, username: &str) -> bool {
        match self {
            RoomKind::Public => true,
            RoomKind::Private { participants } => participants.iter().any(|p| p == username),
        }
    }
}

/// Validate a room name: non-empty and at most 20 characters
pub fn validate_room_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::InvalidName("Room name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(AppError::InvalidName(format!(
            "Room name should not exceed {} characters",
            MAX_ROOM_NAME_LEN
        )));
    }
    Ok(())
}

/// Validate a client-requested capacity against the inclusive range [5, 20]
pub fn validate_capacity(capacity: usize) -> Result<(), AppError> {
    if !(MIN_ROOM_CAPACITY..=MAX_ROOM_CAPACITY).contains(&capacity) {
        return Err(AppError::InvalidCapacity(capacity.to_string()));
    }
    Ok(())
}

/// Validate a username (only emptiness is rejected)
pub fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::InvalidUsername);
    }
    Ok(())
}

/// Derive the private chat name for two usernames
///
/// The pair is ordered first, so `("bob", "alice")` and `("alice", "bob")`
/// name the same room.
pub fn private_chat_name(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{}_{}", PRIVATE_CHAT_PREFIX, first, second)
}
