//! Core operations behind the transport events
//!
//! `ArenaCore` translates decoded client events into store and session
//! operations. It is the seam the websocket layer talks to, and the
//! place where the per-participant ordering guarantee is upheld: the
//! queue_joined ack is sent onto the connection's channel before the
//! entry becomes visible to the matchmaker, so no client can observe a
//! match_found for a mode without its queue_joined first.

use crate::error::{ArenaError, Result};
use crate::events::fanout::EventFanOut;
use crate::metrics::MetricsCollector;
use crate::session::manager::SessionManager;
use crate::store::player::PlayerStore;
use crate::store::queue::QueueStore;
use crate::transport::handler::ClientEventHandler;
use crate::types::{ClientEvent, GameMode, MatchId, PlayerId, Preferences, QueueEntry};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// The glue between transport events and the core subsystems
pub struct ArenaCore {
    players: Arc<dyn PlayerStore>,
    queues: Arc<dyn QueueStore>,
    sessions: Arc<SessionManager>,
    fanout: Arc<EventFanOut>,
    metrics: Arc<MetricsCollector>,
}

impl ArenaCore {
    pub fn new(
        players: Arc<dyn PlayerStore>,
        queues: Arc<dyn QueueStore>,
        sessions: Arc<SessionManager>,
        fanout: Arc<EventFanOut>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            players,
            queues,
            sessions,
            fanout,
            metrics,
        }
    }

    /// Enqueue a player for a mode on behalf of a connected session
    pub async fn join_queue(
        &self,
        session_tag: &str,
        player_id: PlayerId,
        mode: GameMode,
        prefs: Preferences,
    ) -> Result<()> {
        let player = self
            .players
            .get(player_id)
            .await?
            .ok_or_else(|| ArenaError::PlayerNotFound {
                player_id: player_id.to_string(),
            })?;
        self.players.touch(player_id).await?;

        let rating = player.rating(mode);

        // Ack before the entry is visible to the matchmaker; an enqueue
        // failure follows up with an error on the same ordered channel.
        self.fanout
            .queue_joined(session_tag, player_id, mode, rating)
            .await;

        let entry = QueueEntry {
            player_id,
            rating,
            session_tag: session_tag.to_string(),
            prefs,
            joined_at: current_timestamp(),
            search_expansion: 0,
        };
        self.queues.enqueue(mode, entry).await?;
        self.metrics.record_queue_join(mode);

        debug!("Player {} queued for {} at rating {}", player_id, mode, rating);
        Ok(())
    }

    /// Remove a player from a mode queue; absent entries are a no-op
    pub async fn leave_queue(
        &self,
        session_tag: &str,
        player_id: PlayerId,
        mode: GameMode,
    ) -> Result<()> {
        let removed = self.queues.dequeue(mode, player_id).await?;
        if removed {
            self.metrics.record_queue_leave(mode);
        }
        self.fanout
            .queue_left(Some(session_tag), player_id, mode)
            .await;
        Ok(())
    }

    /// Route an in-game action; replies only arrive via broadcast
    pub async fn game_action(
        &self,
        session_tag: &str,
        game_id: MatchId,
        action: &str,
        payload: serde_json::Value,
    ) {
        self.sessions
            .handle_action(game_id, session_tag, action, payload)
            .await;
    }

    /// Cancel every queue entry the session tag holds.
    ///
    /// Active matches the player participates in are untouched; they
    /// proceed until another end trigger.
    pub async fn disconnect(&self, session_tag: &str) -> Result<()> {
        let cancelled = self.queues.dequeue_by_session_tag(session_tag).await?;
        for (mode, player_id) in cancelled {
            self.metrics.record_queue_leave(mode);
            self.fanout.queue_left(None, player_id, mode).await;
            debug!(
                "Cancelled queue entry for player {} in {} on disconnect",
                player_id, mode
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ClientEventHandler for ArenaCore {
    async fn handle_event(&self, session_tag: &str, event: ClientEvent) {
        match event {
            ClientEvent::JoinQueue {
                player_id,
                game_mode,
                preferences,
            } => {
                if let Err(e) = self
                    .join_queue(session_tag, player_id, game_mode, preferences)
                    .await
                {
                    self.fanout.send_error(session_tag, e.to_string()).await;
                }
            }
            ClientEvent::LeaveQueue {
                player_id,
                game_mode,
            } => {
                if let Err(e) = self.leave_queue(session_tag, player_id, game_mode).await {
                    self.fanout.send_error(session_tag, e.to_string()).await;
                }
            }
            ClientEvent::GameAction {
                game_id,
                action,
                payload,
            } => {
                self.game_action(session_tag, game_id, &action, payload)
                    .await;
            }
        }
    }

    async fn handle_disconnect(&self, session_tag: &str) {
        if let Err(e) = self.disconnect(session_tag).await {
            warn!(
                "Failed to cancel queue entries for session {}: {}",
                session_tag, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::session::manager::SessionTimings;
    use crate::store::game::InMemoryGameStore;
    use crate::store::player::InMemoryPlayerStore;
    use crate::store::queue::InMemoryQueueStore;
    use crate::transport::registry::{ConnectionRegistry, InMemoryConnectionRegistry};
    use tokio::sync::mpsc;

    struct Harness {
        core: ArenaCore,
        players: Arc<InMemoryPlayerStore>,
        queues: Arc<InMemoryQueueStore>,
        registry: Arc<InMemoryConnectionRegistry>,
        publisher: Arc<MockEventPublisher>,
    }

    fn harness() -> Harness {
        let players = Arc::new(InMemoryPlayerStore::new());
        let queues = Arc::new(InMemoryQueueStore::new());
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let publisher = Arc::new(MockEventPublisher::new());
        let fanout = Arc::new(EventFanOut::new(registry.clone(), publisher.clone()));
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let sessions = Arc::new(SessionManager::new(
            players.clone(),
            Arc::new(InMemoryGameStore::new()),
            fanout.clone(),
            SessionTimings::default(),
            metrics.clone(),
        ));
        let core = ArenaCore::new(
            players.clone(),
            queues.clone(),
            sessions,
            fanout,
            metrics,
        );
        Harness {
            core,
            players,
            queues,
            registry,
            publisher,
        }
    }

    #[tokio::test]
    async fn test_join_queue_acks_and_enqueues() {
        let h = harness();
        let alice = h.players.create("alice", GameMode::Chess).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.register("tag-a".to_string(), tx).await;

        h.core
            .join_queue("tag-a", alice.id, GameMode::Chess, Preferences::default())
            .await
            .unwrap();

        let ack = rx.recv().await.unwrap();
        assert!(ack.contains(r#""type":"queue_joined""#));

        let snapshot = h.queues.snapshot(GameMode::Chess).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].rating, 1000);
        assert_eq!(snapshot[0].session_tag, "tag-a");

        assert!(h
            .publisher
            .routing_keys()
            .contains(&"matchmaking.queue.join".to_string()));
    }

    #[tokio::test]
    async fn test_join_queue_unknown_player_errors() {
        let h = harness();
        let err = h
            .core
            .join_queue(
                "tag-a",
                crate::utils::generate_player_id(),
                GameMode::Chess,
                Preferences::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArenaError>(),
            Some(ArenaError::PlayerNotFound { .. })
        ));
        assert_eq!(h.queues.depth(GameMode::Chess).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handle_event_replies_error_for_unknown_player() {
        let h = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.register("tag-x".to_string(), tx).await;

        h.core
            .handle_event(
                "tag-x",
                ClientEvent::JoinQueue {
                    player_id: crate::utils::generate_player_id(),
                    game_mode: GameMode::Fps,
                    preferences: Preferences::default(),
                },
            )
            .await;

        let reply = rx.recv().await.unwrap();
        assert!(reply.contains(r#""type":"error""#));
    }

    #[tokio::test]
    async fn test_leave_queue_acks_even_when_absent() {
        let h = harness();
        let alice = h.players.create("alice", GameMode::Chess).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.register("tag-a".to_string(), tx).await;

        h.core
            .leave_queue("tag-a", alice.id, GameMode::Chess)
            .await
            .unwrap();
        let ack = rx.recv().await.unwrap();
        assert!(ack.contains(r#""type":"queue_left""#));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_only_tagged_entries() {
        let h = harness();
        let alice = h.players.create("alice", GameMode::Chess).await.unwrap();
        let bob = h.players.create("bobby", GameMode::Chess).await.unwrap();

        h.core
            .join_queue("tag-a", alice.id, GameMode::Chess, Preferences::default())
            .await
            .unwrap();
        h.core
            .join_queue("tag-b", bob.id, GameMode::Chess, Preferences::default())
            .await
            .unwrap();

        h.core.handle_disconnect("tag-a").await;

        let snapshot = h.queues.snapshot(GameMode::Chess).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].player_id, bob.id);

        // Both the join and the disconnect-driven leave reached the bus
        let keys = h.publisher.routing_keys();
        assert!(keys.contains(&"matchmaking.queue.leave".to_string()));
    }
}
