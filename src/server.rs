//! HTTP boundary
//!
//! Routes the REST and WebSocket endpoints onto the hub, and serves them
//! with graceful shutdown that disconnects every member first.

use std::collections::BTreeMap;
use std::future::Future;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::handler::run_member;
use crate::hub::Hub;
use crate::message::{ChatMessage, RoomInfo};

/// Form body for `POST /rooms/create`
#[derive(Debug, Deserialize)]
pub struct CreateRoomForm {
    #[serde(rename = "roomName", default)]
    pub room_name: String,
    /// Kept as text so a non-numeric value maps onto `InvalidCapacity`
    #[serde(default)]
    pub capacity: String,
}

/// Form body for `POST /chat/create`
#[derive(Debug, Deserialize)]
pub struct PrivateChatForm {
    #[serde(default)]
    pub username1: String,
    #[serde(default)]
    pub username2: String,
}

/// Query string for `GET /rooms/{name}`
#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    #[serde(default)]
    pub username: String,
}

/// Build the application router
pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/create", post(create_room))
        .route("/rooms/{name}", get(join_room))
        .route("/rooms/{name}/messages", get(room_messages))
        .route("/rooms/{name}/users", get(room_users))
        .route("/chat/create", post(create_private_chat))
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

/// Serve until `shutdown` resolves, then disconnect every member
pub async fn serve<F>(listener: TcpListener, hub: Hub, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(hub.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutting down server ...");
            hub.shutdown().await;
        })
        .await
}

async fn list_rooms(State(hub): State<Hub>) -> Json<BTreeMap<String, RoomInfo>> {
    Json(hub.list_rooms().await)
}

async fn create_room(
    State(hub): State<Hub>,
    Form(form): Form<CreateRoomForm>,
) -> Result<StatusCode, AppError> {
    debug!("Create room request: {:?}", form);

    let capacity = form
        .capacity
        .trim()
        .parse::<usize>()
        .map_err(|_| AppError::InvalidCapacity(form.capacity.clone()))?;
    hub.create_room(&form.room_name, capacity).await?;

    Ok(StatusCode::CREATED)
}

async fn create_private_chat(
    State(hub): State<Hub>,
    Form(form): Form<PrivateChatForm>,
) -> Result<StatusCode, AppError> {
    debug!("Create private chat request: {:?}", form);

    hub.create_private_chat(&form.username1, &form.username2)
        .await?;

    Ok(StatusCode::CREATED)
}

async fn join_room(
    State(hub): State<Hub>,
    Path(name): Path<String>,
    Query(JoinQuery { username }): Query<JoinQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let room = hub.get_room(&name).await?;
    room.check_admission(&username).await?;

    let outbound_capacity = hub.settings().outbound_capacity;
    Ok(upgrade.on_upgrade(move |socket| async move {
        let (sink, source) = socket.split();
        if let Err(e) = run_member(room, username, source, sink, outbound_capacity).await {
            if e.is_client_error() {
                debug!("Join rejected after upgrade: {}", e);
            } else {
                warn!("Member session failed: {}", e);
            }
        }
    }))
}

async fn room_messages(
    State(hub): State<Hub>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let room = hub.get_room(&name).await?;
    Ok(Json(room.history().await?))
}

async fn room_users(
    State(hub): State<Hub>,
    Path(name): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let room = hub.get_room(&name).await?;
    Ok(Json(room.roster().await?))
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
