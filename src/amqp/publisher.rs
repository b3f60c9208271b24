//! AMQP event publisher for outbound lifecycle events

use crate::amqp::messages::{
    exchange_for, MessageEnvelope, GAME_ENDED_ROUTING_KEY, GAME_EVENTS_EXCHANGE,
    GAME_STARTED_ROUTING_KEY, MATCHMAKING_EXCHANGE, MATCH_CREATED_ROUTING_KEY,
    QUEUE_JOIN_ROUTING_KEY, QUEUE_LEAVE_ROUTING_KEY, RATING_UPDATED_ROUTING_KEY,
};
use crate::error::{ArenaError, Result};
use crate::types::{
    GameEndedEvent, GameStartedEvent, MatchCreatedEvent, QueueJoinedEvent, QueueLeftEvent,
    RatingUpdatedEvent,
};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use tracing::{debug, info};

/// Trait for publishing matchmaking and game lifecycle events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a queue-join event
    async fn publish_queue_joined(&self, event: QueueJoinedEvent) -> Result<()>;

    /// Publish a queue-leave event
    async fn publish_queue_left(&self, event: QueueLeftEvent) -> Result<()>;

    /// Publish a match-created event
    async fn publish_match_created(&self, event: MatchCreatedEvent) -> Result<()>;

    /// Publish a game-started event
    async fn publish_game_started(&self, event: GameStartedEvent) -> Result<()>;

    /// Publish a game-ended event
    async fn publish_game_ended(&self, event: GameEndedEvent) -> Result<()>;

    /// Publish a rating-updated event
    async fn publish_rating_updated(&self, event: RatingUpdatedEvent) -> Result<()>;
}

/// AMQP-based event publisher implementation.
///
/// Publishes are single attempts; the fan-out layer logs and swallows
/// failures so a flapping broker never blocks the core loop.
pub struct AmqpEventPublisher {
    channel: Channel,
}

impl AmqpEventPublisher {
    /// Create a new event publisher and declare its exchanges
    pub async fn new(channel: Channel) -> Result<Self> {
        let publisher = Self { channel };
        publisher.setup_exchanges().await?;
        Ok(publisher)
    }

    /// Declare the durable topic exchanges
    async fn setup_exchanges(&self) -> Result<()> {
        for exchange in [MATCHMAKING_EXCHANGE, GAME_EVENTS_EXCHANGE] {
            let mut args = ExchangeDeclareArguments::new(exchange, "topic");
            args.durable(true);
            self.channel.exchange_declare(args).await.map_err(|e| {
                ArenaError::BusConnectionFailed {
                    message: format!("failed to declare exchange {}: {}", exchange, e),
                }
            })?;
        }

        info!("Successfully set up AMQP exchanges");
        Ok(())
    }

    async fn publish<T>(&self, routing_key: &str, payload: T) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send,
    {
        let envelope = MessageEnvelope::new(payload, routing_key.to_string());
        let body = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(exchange_for(routing_key), routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json")
            .with_delivery_mode(2); // persistent

        self.channel
            .basic_publish(properties, body, args)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to publish {}: {}", routing_key, e),
            })?;

        debug!(
            "Published message {} with routing key {}",
            envelope.correlation_id, routing_key
        );
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_queue_joined(&self, event: QueueJoinedEvent) -> Result<()> {
        self.publish(QUEUE_JOIN_ROUTING_KEY, event).await
    }

    async fn publish_queue_left(&self, event: QueueLeftEvent) -> Result<()> {
        self.publish(QUEUE_LEAVE_ROUTING_KEY, event).await
    }

    async fn publish_match_created(&self, event: MatchCreatedEvent) -> Result<()> {
        self.publish(MATCH_CREATED_ROUTING_KEY, event).await
    }

    async fn publish_game_started(&self, event: GameStartedEvent) -> Result<()> {
        self.publish(GAME_STARTED_ROUTING_KEY, event).await
    }

    async fn publish_game_ended(&self, event: GameEndedEvent) -> Result<()> {
        self.publish(GAME_ENDED_ROUTING_KEY, event).await
    }

    async fn publish_rating_updated(&self, event: RatingUpdatedEvent) -> Result<()> {
        self.publish(RATING_UPDATED_ROUTING_KEY, event).await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published: std::sync::Mutex<Vec<(String, serde_json::Value)>>,
    fail_publishes: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail, to exercise best-effort paths
    pub fn set_failing(&self, failing: bool) {
        self.fail_publishes
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// All published (routing key, payload) pairs, in order
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Routing keys only, in publish order
    pub fn routing_keys(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    fn record<T: serde::Serialize>(&self, routing_key: &str, event: &T) -> Result<()> {
        if self.fail_publishes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ArenaError::TransientBackend {
                message: "mock publisher configured to fail".to_string(),
            }
            .into());
        }
        if let Ok(mut events) = self.published.lock() {
            events.push((
                routing_key.to_string(),
                serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_queue_joined(&self, event: QueueJoinedEvent) -> Result<()> {
        self.record(QUEUE_JOIN_ROUTING_KEY, &event)
    }

    async fn publish_queue_left(&self, event: QueueLeftEvent) -> Result<()> {
        self.record(QUEUE_LEAVE_ROUTING_KEY, &event)
    }

    async fn publish_match_created(&self, event: MatchCreatedEvent) -> Result<()> {
        self.record(MATCH_CREATED_ROUTING_KEY, &event)
    }

    async fn publish_game_started(&self, event: GameStartedEvent) -> Result<()> {
        self.record(GAME_STARTED_ROUTING_KEY, &event)
    }

    async fn publish_game_ended(&self, event: GameEndedEvent) -> Result<()> {
        self.record(GAME_ENDED_ROUTING_KEY, &event)
    }

    async fn publish_rating_updated(&self, event: RatingUpdatedEvent) -> Result<()> {
        self.record(RATING_UPDATED_ROUTING_KEY, &event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameMode;
    use crate::utils::{current_timestamp, generate_player_id};

    fn queue_event() -> QueueJoinedEvent {
        QueueJoinedEvent {
            player_id: generate_player_id(),
            game_mode: GameMode::Fps,
            rating: 1000,
            timestamp: current_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_mock_publisher_records_in_order() {
        let publisher = MockEventPublisher::new();
        publisher.publish_queue_joined(queue_event()).await.unwrap();
        publisher
            .publish_queue_left(QueueLeftEvent {
                player_id: generate_player_id(),
                game_mode: GameMode::Fps,
                timestamp: current_timestamp(),
            })
            .await
            .unwrap();

        assert_eq!(
            publisher.routing_keys(),
            vec![
                QUEUE_JOIN_ROUTING_KEY.to_string(),
                QUEUE_LEAVE_ROUTING_KEY.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_publisher_failure_mode() {
        let publisher = MockEventPublisher::new();
        publisher.set_failing(true);
        assert!(publisher.publish_queue_joined(queue_event()).await.is_err());
        assert!(publisher.published().is_empty());
    }

    // Note: Integration tests with an actual AMQP broker would go in tests/
}
