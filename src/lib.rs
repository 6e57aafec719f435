//! Multi-room WebSocket Chat Relay Library
//!
//! Clients join named rooms over WebSocket and every message sent in a room
//! is broadcast to all of its members and kept in the room's history.
//!
//! # Features
//! - Room creation with name and capacity rules
//! - Two-party private chats restricted to their participants
//! - Ordered, append-only room history
//! - Room listing, history and roster snapshots over HTTP
//! - Slow or dead members are dropped without stalling the room
//! - Graceful shutdown that disconnects every member
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - Each `Room` is an actor task owning its members and history
//! - `Hub` maps room names to room handles
//! - Each connection runs a read loop into the room mailbox and a writer
//!   task draining its own bounded outbound mailbox
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use room_hub::{serve, shutdown_signal, Hub, HubSettings};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let hub = Hub::new(HubSettings::default());
//!     hub.create_default_room("Global", 50).await.unwrap();
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     serve(listener, hub, shutdown_signal()).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use config::{Cli, Config};
pub use connection::{FrameSink, FrameSource, Inbound};
pub use error::{AppError, SendError, StartupError};
pub use handler::run_member;
pub use hub::{Hub, HubSettings};
pub use message::{ChatMessage, Disconnect, RoomInfo};
pub use room::{Membership, Room};
pub use server::{router, serve, shutdown_signal};
pub use types::{ConnectionId, RoomKind};
