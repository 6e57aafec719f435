//! Connection adapter
//!
//! Splits one client stream into a read half (`FrameSource`) and a write
//! half (`FrameSink`). The member session runs its read loop on the source
//! and its writer task on the sink, so the two halves never share a lock.
//!
//! Implemented for axum WebSocket halves and for an in-memory channel pair
//! (see [`memory`]) that drives sessions without a socket.

use std::future::Future;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::error::AppError;
use crate::message::Disconnect;

/// Outcome of waiting for the next inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame from the client
    Text(String),
    /// The stream has ended; no more frames will arrive
    Closed(Disconnect),
}

/// Read half of a client connection
pub trait FrameSource: Send + 'static {
    /// Wait until a text frame arrives, a close is observed, or reading fails
    ///
    /// Control and binary frames are skipped.
    fn next_frame(&mut self) -> impl Future<Output = Inbound> + Send;
}

/// Write half of a client connection
pub trait FrameSink: Send + 'static {
    /// Send one text frame; fails if the peer is gone
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Send a close frame and shut the write half, ignoring failures
    fn close(&mut self, code: u16, reason: String) -> impl Future<Output = ()> + Send;
}

/// Map a WebSocket close code onto a disconnect outcome
pub fn disconnect_from_code(code: Option<u16>) -> Disconnect {
    match code {
        None | Some(close_code::NORMAL) => Disconnect::Normal,
        Some(close_code::AWAY) => Disconnect::GoingAway,
        Some(_) => Disconnect::Abnormal,
    }
}

impl FrameSource for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Inbound {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Text(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    return Inbound::Closed(disconnect_from_code(frame.map(|f| f.code)));
                }
                Some(Ok(_)) => {
                    // Binary, ping and pong - pongs are answered by the protocol layer
                    continue;
                }
                Some(Err(e)) => return Inbound::Closed(Disconnect::ReadError(e.to_string())),
                None => return Inbound::Closed(Disconnect::Abnormal),
            }
        }
    }
}

impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> Result<(), AppError> {
        self.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: String) {
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        let _ = self.send(Message::Close(Some(frame))).await;
        let _ = SinkExt::close(self).await;
    }
}

/// In-memory connection adapter
///
/// `pair()` returns the server-side halves plus a `MemoryPeer` that plays
/// the client.
pub mod memory {
    use tokio::sync::mpsc;

    use super::{FrameSink, FrameSource, Inbound};
    use crate::error::AppError;
    use crate::message::Disconnect;

    /// A frame written by the server side
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Outbound {
        Text(String),
        Close { code: u16, reason: String },
    }

    /// Server-side read half
    #[derive(Debug)]
    pub struct MemorySource {
        rx: mpsc::UnboundedReceiver<Inbound>,
    }

    /// Server-side write half
    #[derive(Debug)]
    pub struct MemorySink {
        tx: mpsc::UnboundedSender<Outbound>,
        stalled: bool,
    }

    /// Client side of an in-memory connection
    #[derive(Debug)]
    pub struct MemoryPeer {
        tx: mpsc::UnboundedSender<Inbound>,
        rx: mpsc::UnboundedReceiver<Outbound>,
    }

    /// Create a connected in-memory source, sink and peer
    pub fn pair() -> (MemorySource, MemorySink, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            MemorySource { rx: in_rx },
            MemorySink {
                tx: out_tx,
                stalled: false,
            },
            MemoryPeer {
                tx: in_tx,
                rx: out_rx,
            },
        )
    }

    /// Like `pair`, but every write on the sink blocks forever
    ///
    /// Models a peer that has stopped reading its socket.
    pub fn stalled_pair() -> (MemorySource, MemorySink, MemoryPeer) {
        let (source, mut sink, peer) = pair();
        sink.stalled = true;
        (source, sink, peer)
    }

    impl FrameSource for MemorySource {
        async fn next_frame(&mut self) -> Inbound {
            self.rx
                .recv()
                .await
                .unwrap_or(Inbound::Closed(Disconnect::Abnormal))
        }
    }

    impl FrameSink for MemorySink {
        async fn send_text(&mut self, text: String) -> Result<(), AppError> {
            if self.stalled {
                std::future::pending::<()>().await;
            }
            self.tx
                .send(Outbound::Text(text))
                .map_err(|_| AppError::Transport(axum::Error::new("peer is gone")))
        }

        async fn close(&mut self, code: u16, reason: String) {
            let _ = self.tx.send(Outbound::Close { code, reason });
        }
    }

    impl MemoryPeer {
        /// Send a text frame to the server
        pub fn send_text(&self, text: impl Into<String>) {
            let _ = self.tx.send(Inbound::Text(text.into()));
        }

        /// End the stream with the given outcome
        pub fn close(&self, reason: Disconnect) {
            let _ = self.tx.send(Inbound::Closed(reason));
        }

        /// Wait for the next frame written by the server
        ///
        /// Returns `None` once the server side has dropped its sink.
        pub async fn recv(&mut self) -> Option<Outbound> {
            self.rx.recv().await
        }
    }
}
