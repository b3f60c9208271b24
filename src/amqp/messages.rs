//! AMQP message definitions and serialization

use crate::error::{ArenaError, Result};

/// Exchange names; both are topic exchanges declared durable
pub const MATCHMAKING_EXCHANGE: &str = "matchmaking";
pub const GAME_EVENTS_EXCHANGE: &str = "game_events";

/// Routing keys for events
pub const QUEUE_JOIN_ROUTING_KEY: &str = "matchmaking.queue.join";
pub const QUEUE_LEAVE_ROUTING_KEY: &str = "matchmaking.queue.leave";
pub const MATCH_CREATED_ROUTING_KEY: &str = "matchmaking.match.created";
pub const GAME_STARTED_ROUTING_KEY: &str = "game.started";
pub const GAME_ENDED_ROUTING_KEY: &str = "game.ended";
pub const RATING_UPDATED_ROUTING_KEY: &str = "player.rating.updated";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            ArenaError::InternalError {
                message: format!("failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize an envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ArenaError::InvalidInput {
                reason: format!("failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Which exchange a routing key publishes to
pub fn exchange_for(routing_key: &str) -> &'static str {
    if routing_key.starts_with("matchmaking.") {
        MATCHMAKING_EXCHANGE
    } else {
        GAME_EVENTS_EXCHANGE
    }
}
