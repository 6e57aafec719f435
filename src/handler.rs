//! Member session handler
//!
//! Runs one joined connection: a read loop feeding the room's mailbox and
//! a writer task draining the member's bounded outbound mailbox onto the
//! stream. Whichever side ends first takes the other down, then the member
//! leaves the room. A member the room drops on its own (evicted or closed
//! at shutdown) is torn down too, even if its peer has stopped reading.

use std::time::Duration;

use axum::extract::ws::close_code;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::connection::{FrameSink, FrameSource, Inbound};
use crate::error::AppError;
use crate::message::{parse_content, ChatMessage, Disconnect};
use crate::room::{Membership, Room};

/// How long a removed member's writer may keep flushing before it is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Join `room` as `username` and relay frames until the connection ends
///
/// If the join is rejected (e.g. the room filled up while the stream was
/// being upgraded) a close frame carrying the reason is sent and the error
/// is returned.
pub async fn run_member<S, K>(
    room: Room,
    username: String,
    mut source: S,
    mut sink: K,
    outbound_capacity: usize,
) -> Result<(), AppError>
where
    S: FrameSource,
    K: FrameSink,
{
    // Room -> client channel
    let (msg_tx, mut msg_rx) = mpsc::channel::<ChatMessage>(outbound_capacity);

    let Membership {
        id: client_id,
        removed: mut on_removed,
    } = match room.join(&username, msg_tx).await {
        Ok(membership) => membership,
        Err(e) => {
            sink.close(close_code::POLICY, e.to_string()).await;
            return Err(e);
        }
    };
    info!(
        "Client {} joined room '{}' as {}",
        client_id,
        room.name(),
        username
    );

    // Spawn write task (outbound mailbox -> stream)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if let Err(e) = sink.send_text(json).await {
                        warn!("Send to {} failed, ending write task: {}", client_id, e);
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for {}", client_id);

        // Outbound mailbox closed: left, evicted or shutting down
        sink.close(close_code::NORMAL, String::new()).await;
    });

    // Spawn read task (stream -> room mailbox)
    let read_room = room.clone();
    let mut read_task = tokio::spawn(async move {
        loop {
            match source.next_frame().await {
                Inbound::Text(text) => {
                    let message = ChatMessage::new(username.as_str(), parse_content(text));
                    if read_room.receive(client_id, message).await.is_err() {
                        debug!("Room closed, ending read task for {}", client_id);
                        return Disconnect::Abnormal;
                    }
                }
                Inbound::Closed(reason) => return reason,
            }
        }
    });

    // Wait for either task to complete
    let reason = tokio::select! {
        res = &mut read_task => {
            write_task.abort();
            res.unwrap_or(Disconnect::Abnormal)
        }
        _ = &mut write_task => {
            read_task.abort();
            Disconnect::Abnormal
        }
        _ = &mut on_removed => {
            // Outbound mailbox is closed as well; a writer stuck on a
            // stalled peer never gets to see that
            if tokio::time::timeout(CLOSE_GRACE, &mut write_task).await.is_err() {
                warn!("Writer for {} is stalled, dropping the connection", client_id);
                write_task.abort();
            }
            read_task.abort();
            Disconnect::Abnormal
        }
    };

    room.leave(client_id, reason.clone()).await;
    info!("Client {} left room '{}' ({})", client_id, room.name(), reason);

    Ok(())
}
