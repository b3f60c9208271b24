//! Test fixtures for integration testing
//!
//! Builds a complete in-process system over the in-memory stores, the
//! mock bus publisher, and a channel-backed connection registry, so
//! tests can observe exactly what clients and the bus would see.

// Not every test file exercises every helper
#![allow(dead_code)]

use arena_hall::amqp::publisher::MockEventPublisher;
use arena_hall::events::EventFanOut;
use arena_hall::matchmaker::{MatchmakerConfig, MatchmakingEngine};
use arena_hall::metrics::MetricsCollector;
use arena_hall::service::ArenaCore;
use arena_hall::session::{SessionManager, SessionTimings};
use arena_hall::store::{InMemoryGameStore, InMemoryPlayerStore, InMemoryQueueStore, PlayerStore};
use arena_hall::transport::{ConnectionRegistry, InMemoryConnectionRegistry};
use arena_hall::types::{GameMode, Player, Preferences, QueueEntry};
use arena_hall::utils::current_timestamp;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct TestSystem {
    pub players: Arc<InMemoryPlayerStore>,
    pub queues: Arc<InMemoryQueueStore>,
    pub registry: Arc<InMemoryConnectionRegistry>,
    pub publisher: Arc<MockEventPublisher>,
    pub sessions: Arc<SessionManager>,
    pub engine: Arc<MatchmakingEngine>,
    pub core: Arc<ArenaCore>,
}

impl TestSystem {
    /// Register a fake client connection and return its inbox
    pub async fn connect(&self, tag: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.register(tag.to_string(), tx).await;
        rx
    }

    /// Create a player and return the record
    pub async fn seed_player(&self, name: &str, mode: GameMode) -> Player {
        self.players.create(name, mode).await.unwrap()
    }

    /// Enqueue directly with a cached rating and backdated join time,
    /// bypassing the core handler
    pub async fn enqueue_waiting(
        &self,
        player: &Player,
        mode: GameMode,
        tag: &str,
        rating: i32,
        waited_seconds: i64,
    ) {
        use arena_hall::store::QueueStore;
        self.queues
            .enqueue(
                mode,
                QueueEntry {
                    player_id: player.id,
                    rating,
                    session_tag: tag.to_string(),
                    prefs: Preferences::default(),
                    joined_at: current_timestamp() - ChronoDuration::seconds(waited_seconds),
                    search_expansion: 0,
                },
            )
            .await
            .unwrap();
    }
}

/// Create a complete system with fast session timers
pub fn create_test_system() -> TestSystem {
    create_test_system_with_timings(SessionTimings {
        start_delay: Duration::from_millis(25),
        eviction_delay: Duration::from_millis(200),
    })
}

/// Create a complete system with explicit session timers
pub fn create_test_system_with_timings(timings: SessionTimings) -> TestSystem {
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
        timings,
        metrics.clone(),
    ));
    let engine = Arc::new(MatchmakingEngine::new(
        queues.clone(),
        players.clone(),
        sessions.clone(),
        fanout.clone(),
        MatchmakerConfig::default(),
        metrics.clone(),
    ));
    let core = Arc::new(ArenaCore::new(
        players.clone(),
        queues.clone(),
        sessions.clone(),
        fanout,
        metrics,
    ));

    TestSystem {
        players,
        queues,
        registry,
        publisher,
        sessions,
        engine,
        core,
    }
}

/// Drain every pending message from an inbox
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut messages = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        messages.push(serde_json::from_str(&raw).unwrap());
    }
    messages
}
