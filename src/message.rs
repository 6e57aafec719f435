//! Message protocol definitions
//!
//! The chat frame exchanged with joined clients, the room summary served by
//! the listing endpoint, and the closed set of ways a connection can end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as stored in history and sent to members
///
/// Immutable once created; the timestamp is taken when the room receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author's username
    pub username: String,
    /// Message text
    pub content: String,
    /// Time the room received the message (RFC 3339, UTC)
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message stamped with the current time
    pub fn new(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Client → Server chat frame
///
/// Clients may send `{"content": "..."}`. Any other fields are ignored; the
/// author is always the member's joined username.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    content: String,
}

/// Extract the message content from an inbound text frame
///
/// A JSON object with a string `content` field yields that field; any other
/// text is taken verbatim.
pub fn parse_content(text: String) -> String {
    match serde_json::from_str::<ClientFrame>(&text) {
        Ok(frame) => frame.content,
        Err(_) => text,
    }
}

/// Point-in-time room summary for the listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub capacity: usize,
    pub client_count: usize,
}

/// Why a member's connection ended
///
/// Every variant leads to the same `leave` transition; the distinction only
/// shapes the log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// Client sent a normal close frame
    Normal,
    /// Client is going away (page closed, navigation)
    GoingAway,
    /// Stream ended without a proper close handshake, or with an error code
    Abnormal,
    /// Reading from the stream failed
    ReadError(String),
}

impl std::fmt::Display for Disconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disconnect::Normal => write!(f, "closed the connection"),
            Disconnect::GoingAway => write!(f, "is going away"),
            Disconnect::Abnormal => write!(f, "closed unexpectedly"),
            Disconnect::ReadError(e) => write!(f, "read failed: {}", e),
        }
    }
}
