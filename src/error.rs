//! Error types for the room hub
//!
//! Defines application-level errors and member delivery errors.
//! Uses thiserror for ergonomic error definitions, and maps application
//! errors onto HTTP responses for the axum boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-level errors
///
/// Validation and lookup errors are returned to the caller of a hub or room
/// operation. Transport errors stay local to the connection they came from.
#[derive(Debug, Error)]
pub enum AppError {
    /// Room name empty or too long
    #[error("{0}")]
    InvalidName(String),

    /// Requested capacity unparseable or outside [5, 20]
    #[error("Room capacity must be a value between 5 and 20 (got '{0}')")]
    InvalidCapacity(String),

    /// Username empty
    #[error("Invalid username")]
    InvalidUsername,

    /// A room with this name already exists
    #[error("A room named {0} already exists")]
    DuplicateRoom(String),

    /// No room with the given name
    #[error("Room '{0}' not found")]
    NotFound(String),

    /// Room is at capacity
    #[error("Room '{name}' is full; Max capacity: {capacity}")]
    RoomFull { name: String, capacity: usize },

    /// Username is not a participant of this private chat
    #[error("Unauthorized")]
    Unauthorized,

    /// WebSocket read/write failure (fatal for that connection only)
    #[error("Transport error: {0}")]
    Transport(#[from] axum::Error),

    /// The room actor has stopped (internal channel broken)
    #[error("Room '{0}' is no longer running")]
    RoomClosed(String),
}

impl AppError {
    /// Whether this error was caused by client input rather than a fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidName(_)
                | AppError::InvalidCapacity(_)
                | AppError::InvalidUsername
                | AppError::DuplicateRoom(_)
                | AppError::NotFound(_)
                | AppError::RoomFull { .. }
                | AppError::Unauthorized
        )
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidName(_) | AppError::InvalidCapacity(_) | AppError::InvalidUsername => {
                StatusCode::BAD_REQUEST
            }
            AppError::DuplicateRoom(_) | AppError::RoomFull { .. } => StatusCode::NOT_ACCEPTABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Transport(_) | AppError::RoomClosed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::debug!("Rejected request: {}", self);
        } else {
            tracing::error!("Request failed: {}", self);
        }
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Startup errors
///
/// Anything that stops the process from coming up. Fatal: `main` logs it
/// and exits with status 1.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Config file could not be read
    #[error("failed to read file at '{path}': {source}")]
    ReadConfig {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for `Config`
    #[error("failed to parse config file: {0}")]
    ParseConfig(#[from] serde_json::Error),

    /// Environment variable holds an unusable value
    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    /// Listener could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Accept loop failed
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Default room could not be created from config
    #[error("failed to create default room: {0}")]
    DefaultRoom(#[from] AppError),
}

/// Member delivery errors
///
/// Occurs when the room actor hands a message to a member's outbound mailbox.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The member's outbound mailbox is full (slow consumer)
    #[error("Outbound mailbox full")]
    Full,

    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
