//! Translator from core events to transport sends and bus publishes
//!
//! Socket delivery is addressed by participant session tags. Bus
//! publishes are best-effort: failures are logged and swallowed so the
//! core loop never blocks on the broker.

use crate::amqp::publisher::EventPublisher;
use crate::transport::registry::ConnectionRegistry;
use crate::types::{
    GameEndedEvent, GameMode, GameStartedEvent, Match, MatchCreatedEvent, MatchFoundPlayer,
    PlayerId, QueueJoinedEvent, QueueLeftEvent, RatingUpdatedEvent, ServerEvent,
};
use crate::utils::current_timestamp;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Fans engine and session events out to participants and the bus
pub struct EventFanOut {
    registry: Arc<dyn ConnectionRegistry>,
    publisher: Arc<dyn EventPublisher>,
}

impl EventFanOut {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    async fn send(&self, session_tag: &str, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(encoded) => self.registry.send_to(session_tag, &encoded).await,
            Err(e) => warn!("Failed to encode server event: {}", e),
        }
    }

    async fn send_to_participants(&self, game: &Match, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(encoded) => {
                self.registry
                    .send_to_many(&game.session_tags(), &encoded)
                    .await
            }
            Err(e) => warn!("Failed to encode server event: {}", e),
        }
    }

    /// Per-sender error reply
    pub async fn send_error(&self, session_tag: &str, message: String) {
        self.send(session_tag, &ServerEvent::Error { message }).await;
    }

    /// Ack a queue join and publish the lifecycle event
    pub async fn queue_joined(
        &self,
        session_tag: &str,
        player_id: PlayerId,
        game_mode: GameMode,
        rating: i32,
    ) {
        self.send(session_tag, &ServerEvent::QueueJoined { game_mode })
            .await;

        let event = QueueJoinedEvent {
            player_id,
            game_mode,
            rating,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_queue_joined(event).await {
            warn!("Dropping queue.join publish: {}", e);
        }
    }

    /// Ack a queue leave (when the client is still connected) and publish
    pub async fn queue_left(
        &self,
        session_tag: Option<&str>,
        player_id: PlayerId,
        game_mode: GameMode,
    ) {
        if let Some(tag) = session_tag {
            self.send(tag, &ServerEvent::QueueLeft {}).await;
        }

        let event = QueueLeftEvent {
            player_id,
            game_mode,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_queue_left(event).await {
            warn!("Dropping queue.leave publish: {}", e);
        }
    }

    /// Deliver match_found to every participant and publish match.created
    pub async fn match_found(&self, game: &Match) {
        let players = game
            .participants
            .iter()
            .map(|p| MatchFoundPlayer {
                id: p.player_id,
                username: p.name.clone(),
                rating: p.rating,
            })
            .collect();

        self.send_to_participants(
            game,
            &ServerEvent::MatchFound {
                game_id: game.id,
                game_mode: game.mode,
                players,
            },
        )
        .await;

        let event = MatchCreatedEvent {
            match_id: game.id,
            game_mode: game.mode,
            players: game.participants.clone(),
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_match_created(event).await {
            warn!("Dropping match.created publish: {}", e);
        }
    }

    /// Announce the start of play to participants and the bus
    pub async fn game_started(&self, game: &Match) {
        let data = json!({
            "type": "game_started",
            "gameId": game.id,
            "gameMode": game.mode,
            "timestamp": current_timestamp().timestamp_millis(),
        });
        self.send_to_participants(game, &ServerEvent::GameUpdate { data })
            .await;

        let event = GameStartedEvent {
            match_id: game.id,
            game_mode: game.mode,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_game_started(event).await {
            warn!("Dropping game.started publish: {}", e);
        }
    }

    /// Relay an in-game update to all participants; no bus traffic
    pub async fn game_update(&self, game: &Match, data: serde_json::Value) {
        self.send_to_participants(game, &ServerEvent::GameUpdate { data })
            .await;
    }

    /// Announce settlement to participants and the bus
    pub async fn game_ended(&self, game: &Match) {
        let result = match &game.result {
            Some(result) => result.clone(),
            None => {
                warn!("game_ended called on match {} without a result", game.id);
                return;
            }
        };

        let data = json!({
            "type": "game_ended",
            "gameId": game.id,
            "winnerId": result.winner_id,
            "reason": result.reason,
            "timestamp": current_timestamp().timestamp_millis(),
        });
        self.send_to_participants(game, &ServerEvent::GameUpdate { data })
            .await;

        let event = GameEndedEvent {
            match_id: game.id,
            game_mode: game.mode,
            result,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_game_ended(event).await {
            warn!("Dropping game.ended publish: {}", e);
        }
    }

    /// Publish a committed rating change
    pub async fn rating_updated(
        &self,
        player_id: PlayerId,
        game_mode: GameMode,
        old_rating: i32,
        new_rating: i32,
    ) {
        let event = RatingUpdatedEvent {
            player_id,
            game_mode,
            old_rating,
            new_rating,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_rating_updated(event).await {
            warn!("Dropping player.rating.updated publish: {}", e);
        }
    }
}
