//! Prometheus metrics for the matchmaking and session core

use crate::types::{EndReason, GameMode};
use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

/// Collects counters and gauges for the core loop
pub struct MetricsCollector {
    registry: Registry,
    queue_joins_total: IntCounterVec,
    queue_leaves_total: IntCounterVec,
    queue_depth: IntGaugeVec,
    matchmaking_ticks_total: IntCounterVec,
    matches_created_total: IntCounterVec,
    matches_emitted_total: IntCounterVec,
    games_started_total: IntCounterVec,
    games_ended_total: IntCounterVec,
    active_games: IntGauge,
    rating_updates_total: IntCounter,
}

impl MetricsCollector {
    /// Create a collector with a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let queue_joins_total = IntCounterVec::new(
            Opts::new("queue_joins_total", "Players enqueued, by mode"),
            &["mode"],
        )?;
        let queue_leaves_total = IntCounterVec::new(
            Opts::new("queue_leaves_total", "Players dequeued, by mode"),
            &["mode"],
        )?;
        let queue_depth = IntGaugeVec::new(
            Opts::new("queue_depth", "Waiting players at the last tick, by mode"),
            &["mode"],
        )?;
        let matchmaking_ticks_total = IntCounterVec::new(
            Opts::new("matchmaking_ticks_total", "Engine ticks, by mode"),
            &["mode"],
        )?;
        let matches_created_total = IntCounterVec::new(
            Opts::new("matches_created_total", "Sessions created, by mode"),
            &["mode"],
        )?;
        let matches_emitted_total = IntCounterVec::new(
            Opts::new(
                "matches_emitted_total",
                "Matches emitted with their group dequeued, by mode",
            ),
            &["mode"],
        )?;
        let games_started_total = IntCounterVec::new(
            Opts::new("games_started_total", "Games transitioned to active, by mode"),
            &["mode"],
        )?;
        let games_ended_total = IntCounterVec::new(
            Opts::new("games_ended_total", "Games settled, by mode and reason"),
            &["mode", "reason"],
        )?;
        let active_games =
            IntGauge::new("active_games", "Matches currently held in memory")?;
        let rating_updates_total =
            IntCounter::new("rating_updates_total", "Committed rating updates")?;

        registry.register(Box::new(queue_joins_total.clone()))?;
        registry.register(Box::new(queue_leaves_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(matchmaking_ticks_total.clone()))?;
        registry.register(Box::new(matches_created_total.clone()))?;
        registry.register(Box::new(matches_emitted_total.clone()))?;
        registry.register(Box::new(games_started_total.clone()))?;
        registry.register(Box::new(games_ended_total.clone()))?;
        registry.register(Box::new(active_games.clone()))?;
        registry.register(Box::new(rating_updates_total.clone()))?;

        Ok(Self {
            registry,
            queue_joins_total,
            queue_leaves_total,
            queue_depth,
            matchmaking_ticks_total,
            matches_created_total,
            matches_emitted_total,
            games_started_total,
            games_ended_total,
            active_games,
            rating_updates_total,
        })
    }

    /// The registry backing the /metrics endpoint
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_queue_join(&self, mode: GameMode) {
        self.queue_joins_total
            .with_label_values(&[&mode.to_string()])
            .inc();
    }

    pub fn record_queue_leave(&self, mode: GameMode) {
        self.queue_leaves_total
            .with_label_values(&[&mode.to_string()])
            .inc();
    }

    pub fn set_queue_depth(&self, mode: GameMode, depth: i64) {
        self.queue_depth
            .with_label_values(&[&mode.to_string()])
            .set(depth);
    }

    pub fn record_tick(&self, mode: GameMode) {
        self.matchmaking_ticks_total
            .with_label_values(&[&mode.to_string()])
            .inc();
    }

    pub fn record_match_created(&self, mode: GameMode) {
        self.matches_created_total
            .with_label_values(&[&mode.to_string()])
            .inc();
    }

    pub fn record_match_emitted(&self, mode: GameMode) {
        self.matches_emitted_total
            .with_label_values(&[&mode.to_string()])
            .inc();
    }

    pub fn record_game_started(&self, mode: GameMode) {
        self.games_started_total
            .with_label_values(&[&mode.to_string()])
            .inc();
    }

    pub fn record_game_ended(&self, mode: GameMode, reason: EndReason) {
        self.games_ended_total
            .with_label_values(&[&mode.to_string(), &reason.to_string()])
            .inc();
    }

    pub fn set_active_games(&self, count: i64) {
        self.active_games.set(count);
    }

    pub fn record_rating_update(&self) {
        self.rating_updates_total.inc();
    }
}
