//! REST routes and the metrics endpoint
//!
//! The HTTP surface seeds and inspects the core: player CRUD, queue
//! status, match lookups, leaderboards, and health. The websocket
//! endpoint is mounted on the same router.

use crate::config::ModeConfig;
use crate::error::ArenaError;
use crate::metrics::MetricsCollector;
use crate::session::manager::SessionManager;
use crate::store::player::{LeaderboardRow, LeaderboardScope, PlayerStore};
use crate::store::queue::QueueStore;
use crate::transport::handler::{websocket_handler, TransportState};
use crate::types::{GameMode, Match, Player};
use crate::utils::{current_timestamp, wait_seconds};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Shared state for the REST handlers
#[derive(Clone)]
pub struct HttpState {
    pub players: Arc<dyn PlayerStore>,
    pub queues: Arc<dyn QueueStore>,
    pub sessions: Arc<SessionManager>,
    pub metrics: Arc<MetricsCollector>,
    /// Used for the estimated-match-time heuristic
    pub tick_interval: Duration,
}

/// Build the service router: REST API, websocket transport, health, metrics
pub fn api_router(state: HttpState, transport: TransportState) -> Router {
    let api = Router::new()
        .route("/api/players", post(create_player))
        .route("/api/players/:id", get(get_player))
        .route("/api/queue/status", get(queue_status))
        .route("/api/games/:id", get(get_game))
        .route("/api/leaderboard/:scope", get(leaderboard))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state);

    let ws = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(transport);

    api.merge(ws)
}

/// Error envelope translating the core taxonomy to status codes
#[derive(Debug)]
struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ArenaError>() {
            Some(ArenaError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            Some(ArenaError::PlayerNotFound { .. }) | Some(ArenaError::MatchNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Some(ArenaError::TransientBackend { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        debug!("API error: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlayerRequest {
    username: String,
    game_mode: GameMode,
}

async fn create_player(
    State(state): State<HttpState>,
    Json(body): Json<CreatePlayerRequest>,
) -> Result<(StatusCode, Json<Player>), ApiError> {
    let player = state.players.create(&body.username, body.game_mode).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

async fn get_player(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Player>, ApiError> {
    let player = state
        .players
        .get(id)
        .await?
        .ok_or_else(|| anyhow::Error::from(ArenaError::PlayerNotFound {
            player_id: id.to_string(),
        }))?;
    Ok(Json(player))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModeQueueStatus {
    players_in_queue: usize,
    average_wait_time: u64,
    estimated_match_time: u64,
}

async fn queue_status(
    State(state): State<HttpState>,
) -> Result<Json<HashMap<String, ModeQueueStatus>>, ApiError> {
    let now = current_timestamp();
    let mut status = HashMap::new();

    for mode in GameMode::ALL {
        let entries = state.queues.snapshot(mode).await?;
        let average_wait_time = if entries.is_empty() {
            0
        } else {
            entries
                .iter()
                .map(|e| wait_seconds(e.joined_at, now))
                .sum::<u64>()
                / entries.len() as u64
        };

        status.insert(
            mode.to_string(),
            ModeQueueStatus {
                players_in_queue: entries.len(),
                average_wait_time,
                // Heuristic: the observed average plus one tick
                estimated_match_time: average_wait_time + state.tick_interval.as_secs(),
            },
        );
    }

    Ok(Json(status))
}

/// Match response carrying the static mode config alongside the record
#[derive(Debug, Serialize)]
struct GameResponse {
    #[serde(flatten)]
    game: Match,
    config: &'static ModeConfig,
}

async fn get_game(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameResponse>, ApiError> {
    let game = state
        .sessions
        .get(id)
        .await?
        .ok_or_else(|| anyhow::Error::from(ArenaError::MatchNotFound {
            match_id: id.to_string(),
        }))?;
    let config = game.mode.config();
    Ok(Json(GameResponse { game, config }))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

async fn leaderboard(
    State(state): State<HttpState>,
    Path(scope): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, ApiError> {
    let scope: LeaderboardScope = scope.parse().map_err(anyhow::Error::from)?;
    let rows = state
        .players
        .leaderboard(scope, query.limit.unwrap_or(10))
        .await?;
    Ok(Json(rows))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": current_timestamp(),
    }))
}

async fn metrics(State(state): State<HttpState>) -> Result<String, ApiError> {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry().gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| anyhow::Error::from(ArenaError::InternalError {
            message: format!("failed to encode metrics: {}", e),
        }))?;
    String::from_utf8(buffer).map_err(|e| {
        ApiError(anyhow::Error::from(ArenaError::InternalError {
            message: format!("metrics were not valid UTF-8: {}", e),
        }))
    })
}
