//! Matchmaking engine
//!
//! One tick per mode on a fixed period. A tick reads the queue, groups
//! compatible candidates greedily in FIFO order, asks the session
//! manager for a match per committed group, and only then removes the
//! group from the queue and emits match_found - so an observed
//! match_found always implies the dequeue already happened. A tick that
//! fails leaves the queue untouched; the next tick re-attempts.

use crate::config::MatchmakingSettings;
use crate::error::Result;
use crate::events::fanout::EventFanOut;
use crate::matchmaker::compatibility::{compatible, CompatibilityConfig};
use crate::metrics::MetricsCollector;
use crate::session::manager::SessionManager;
use crate::store::player::PlayerStore;
use crate::store::queue::QueueStore;
use crate::types::{GameMode, Participant, QueueEntry};
use crate::utils::{current_timestamp, generate_match_id};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct MatchmakerConfig {
    /// Tick period per mode
    pub tick_interval: Duration,
    /// Compatibility predicate parameters
    pub compatibility: CompatibilityConfig,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            compatibility: CompatibilityConfig::default(),
        }
    }
}

impl From<&MatchmakingSettings> for MatchmakerConfig {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            tick_interval: Duration::from_millis(settings.tick_interval_ms),
            compatibility: CompatibilityConfig::from(settings),
        }
    }
}

/// Statistics about engine operations
#[derive(Debug, Clone, Default)]
pub struct MatchmakerStats {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub matches_emitted: u64,
    pub players_matched: u64,
}

/// The matchmaking engine
pub struct MatchmakingEngine {
    queues: Arc<dyn QueueStore>,
    players: Arc<dyn PlayerStore>,
    sessions: Arc<SessionManager>,
    fanout: Arc<EventFanOut>,
    config: MatchmakerConfig,
    stats: std::sync::RwLock<MatchmakerStats>,
    metrics: Arc<MetricsCollector>,
}

impl MatchmakingEngine {
    pub fn new(
        queues: Arc<dyn QueueStore>,
        players: Arc<dyn PlayerStore>,
        sessions: Arc<SessionManager>,
        fanout: Arc<EventFanOut>,
        config: MatchmakerConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queues,
            players,
            sessions,
            fanout,
            config,
            stats: std::sync::RwLock::new(MatchmakerStats::default()),
            metrics,
        }
    }

    /// Run one tick for a mode; returns the number of matches emitted
    pub async fn tick(&self, mode: GameMode) -> Result<usize> {
        self.metrics.record_tick(mode);
        if let Ok(mut stats) = self.stats.write() {
            stats.ticks += 1;
        }

        let entries = self.queues.snapshot(mode).await?;
        self.metrics.set_queue_depth(mode, entries.len() as i64);

        let target = mode.players_per_match();
        if entries.len() < target {
            return Ok(0);
        }

        let now = current_timestamp();
        let groups = form_groups(entries, mode, now, &self.config.compatibility);
        debug!(
            "Tick for {}: {} candidate group(s) of size {}",
            mode,
            groups.len(),
            target
        );

        let mut emitted = 0;
        for group in groups {
            if self.commit_group(mode, &group).await? {
                emitted += 1;
            }
        }

        if emitted > 0 {
            if let Ok(mut stats) = self.stats.write() {
                stats.matches_emitted += emitted as u64;
                stats.players_matched += (emitted * target) as u64;
            }
        }
        Ok(emitted)
    }

    /// Create a session for one committed group, dequeue its members,
    /// and notify them. Returns false when the group stays enqueued.
    async fn commit_group(&self, mode: GameMode, group: &[QueueEntry]) -> Result<bool> {
        // Freeze participants; a vanished player record invalidates its
        // entry rather than producing a nameless participant.
        let mut participants = Vec::with_capacity(group.len());
        for entry in group {
            match self.players.get(entry.player_id).await? {
                Some(player) => {
                    let rating = player.rating(mode);
                    participants.push(Participant {
                        player_id: player.id,
                        name: player.name,
                        rating,
                        session_tag: entry.session_tag.clone(),
                    })
                }
                None => {
                    warn!(
                        "Player {} expired while queued for {}; dropping entry",
                        entry.player_id, mode
                    );
                    self.queues.dequeue(mode, entry.player_id).await?;
                    return Ok(false);
                }
            }
        }

        let match_id = generate_match_id();
        let game = match self
            .sessions
            .create(match_id, participants, mode)
            .await
        {
            Ok(game) => game,
            Err(e) => {
                // The group stays enqueued and is re-evaluated next tick
                warn!(
                    "Session create failed for {} group, leaving players queued: {}",
                    mode, e
                );
                return Ok(false);
            }
        };

        self.queues.remove(mode, group).await?;
        self.metrics.record_match_emitted(mode);
        info!(
            "Match {} emitted for {} with {} players",
            game.id,
            mode,
            game.participants.len()
        );
        self.fanout.match_found(&game).await;
        Ok(true)
    }

    /// Spawn one periodic tick task per mode; modes are independent
    pub fn spawn_tick_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        GameMode::ALL
            .iter()
            .map(|mode| {
                let engine = Arc::clone(self);
                let mode = *mode;
                let period = engine.config.tick_interval;
                tokio::spawn(async move {
                    let mut ticker = interval(period);
                    loop {
                        ticker.tick().await;
                        match engine.tick(mode).await {
                            Ok(0) => {}
                            Ok(n) => debug!("Tick for {} emitted {} match(es)", mode, n),
                            Err(e) => {
                                // Skip this tick; the unchanged queue is
                                // re-attempted on the next one
                                if let Ok(mut stats) = engine.stats.write() {
                                    stats.failed_ticks += 1;
                                }
                                error!("Tick for {} failed: {}", mode, e);
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Get current engine statistics
    pub fn stats(&self) -> MatchmakerStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

/// Greedy grouping over a queue snapshot.
///
/// Candidates are visited in FIFO order; each unused candidate seeds a
/// tentative group filled with later candidates compatible with the
/// seed. A group short of the target releases its members for later
/// seeds.
fn form_groups(
    mut entries: Vec<QueueEntry>,
    mode: GameMode,
    now: DateTime<Utc>,
    config: &CompatibilityConfig,
) -> Vec<Vec<QueueEntry>> {
    entries.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });

    let target = mode.players_per_match();
    let mut used = vec![false; entries.len()];
    let mut groups = Vec::new();

    for seed in 0..entries.len() {
        if used[seed] {
            continue;
        }
        let mut tentative = vec![seed];
        for candidate in (seed + 1)..entries.len() {
            if tentative.len() == target {
                break;
            }
            if used[candidate] {
                continue;
            }
            if compatible(&entries[seed], &entries[candidate], mode, now, config) {
                tentative.push(candidate);
            }
        }
        if tentative.len() == target {
            for &index in &tentative {
                used[index] = true;
            }
            groups.push(tentative.iter().map(|&i| entries[i].clone()).collect());
        }
    }

    groups
}
