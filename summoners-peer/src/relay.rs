//! Message relay between the two peers.
//!
//! The relay is deliberately dumb: it admits two peers, and forwards each
//! message body verbatim into the other peer's mailbox. It never parses game
//! traffic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, instrument, warn};

use crate::config::RelayConfig;
use crate::transport::JoinModel;

// =============================================================================
// Relay State
// =============================================================================

const PEERS: usize = 2;

/// Mailboxes indexed by recipient (player_id - 1).
#[derive(Default)]
struct Mailboxes {
    joined: usize,
    queues: [VecDeque<String>; PEERS],
}

#[derive(Default)]
struct RelayStateInner {
    mailboxes: Mutex<Mailboxes>,
}

type RelayState = Arc<RelayStateInner>;

impl RelayStateInner {
    fn lock(&self) -> MutexGuard<'_, Mailboxes> {
        self.mailboxes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize)]
struct HealthModel {
    status: String,
    peers: usize,
}

#[derive(Serialize)]
struct ErrorModel {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorModel>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(ErrorModel { detail: detail.into() }))
}

/// Map a player id from the URL to a mailbox index.
fn slot(player_id: u8, joined: usize) -> Result<usize, ApiError> {
    match player_id {
        1 | 2 if usize::from(player_id) <= joined => Ok(usize::from(player_id) - 1),
        _ => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Unknown player id {}", player_id),
        )),
    }
}

// =============================================================================
// API Endpoints
// =============================================================================

#[instrument(skip(state))]
async fn join(State(state): State<RelayState>) -> Result<Json<JoinModel>, ApiError> {
    let mut mailboxes = state.lock();
    if mailboxes.joined >= PEERS {
        warn!("Rejected join, relay is full");
        return Err(api_error(StatusCode::CONFLICT, "Relay already has two peers"));
    }
    mailboxes.joined += 1;
    let player_id = mailboxes.joined as u8;
    info!(player_id, "Peer joined");
    Ok(Json(JoinModel { player_id }))
}

#[instrument(skip(state, body), fields(len = body.len()))]
async fn send(
    State(state): State<RelayState>,
    Path(player_id): Path<u8>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let mut mailboxes = state.lock();
    let from = slot(player_id, mailboxes.joined)?;
    let to = (from + 1) % PEERS;
    debug!(from = from + 1, to = to + 1, "Forwarding message");
    mailboxes.queues[to].push_back(body);
    Ok(StatusCode::NO_CONTENT)
}

async fn recv(
    State(state): State<RelayState>,
    Path(player_id): Path<u8>,
) -> Result<Json<Vec<String>>, ApiError> {
    let mut mailboxes = state.lock();
    let idx = slot(player_id, mailboxes.joined)?;
    Ok(Json(mailboxes.queues[idx].drain(..).collect()))
}

async fn health(State(state): State<RelayState>) -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
        peers: state.lock().joined,
    })
}

// =============================================================================
// Server
// =============================================================================

/// Relay routes with fresh, empty mailboxes.
pub fn router() -> Router {
    let state: RelayState = Arc::new(RelayStateInner::default());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/join", post(join))
        .route("/send/{player_id}", post(send))
        .route("/recv/{player_id}", get(recv))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Serve the relay on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router()).await
}

/// Bind according to `config` and serve.
pub async fn run(config: &RelayConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(addr = %listener.local_addr()?, "Summoners relay listening");
    serve(listener).await
}
