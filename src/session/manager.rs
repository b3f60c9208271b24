//! Game session manager
//!
//! Owns every match from creation through settlement. The lifecycle is
//! `Starting -> Active -> Finished`, driven by a start timer, the end
//! operation, and a post-settlement eviction timer. Within one match all
//! action handling runs on a single worker so broadcasts reach every
//! participant in acceptance order; across matches workers are
//! independent.

use crate::error::{ArenaError, Result};
use crate::events::fanout::EventFanOut;
use crate::metrics::MetricsCollector;
use crate::session::actions::{self, ActionEffect};
use crate::store::game::GameStore;
use crate::store::player::PlayerStore;
use crate::types::{
    EndReason, GameMode, Match, MatchId, MatchStatus, Outcome, Participant, PlayerId,
};
use crate::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Lifecycle timer configuration
#[derive(Debug, Clone)]
pub struct SessionTimings {
    /// Delay between creation and the automatic start
    pub start_delay: Duration,
    /// Cool-down a finished match stays readable in memory
    pub eviction_delay: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(5),
            eviction_delay: Duration::from_secs(60),
        }
    }
}

impl From<&crate::config::SessionSettings> for SessionTimings {
    fn from(settings: &crate::config::SessionSettings) -> Self {
        Self {
            start_delay: Duration::from_millis(settings.start_delay_ms),
            eviction_delay: Duration::from_millis(settings.eviction_delay_ms),
        }
    }
}

/// Statistics about session manager operations
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub matches_created: u64,
    pub games_started: u64,
    pub games_finished: u64,
    pub matches_evicted: u64,
}

/// One action waiting on a match's serial worker
struct QueuedAction {
    player_id: PlayerId,
    action: String,
    payload: serde_json::Value,
}

/// A live match: an immutable snapshot replaced wholesale on update,
/// plus the channel into its action worker.
struct ActiveMatch {
    snapshot: Arc<Match>,
    actions: mpsc::UnboundedSender<QueuedAction>,
}

/// The game session manager
pub struct SessionManager {
    /// Hot map of live matches; the only shared mutable core structure
    games: RwLock<HashMap<MatchId, ActiveMatch>>,
    players: Arc<dyn PlayerStore>,
    game_store: Arc<dyn GameStore>,
    fanout: Arc<EventFanOut>,
    timings: SessionTimings,
    stats: std::sync::RwLock<SessionStats>,
    metrics: Arc<MetricsCollector>,
}

impl SessionManager {
    pub fn new(
        players: Arc<dyn PlayerStore>,
        game_store: Arc<dyn GameStore>,
        fanout: Arc<EventFanOut>,
        timings: SessionTimings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            players,
            game_store,
            fanout,
            timings,
            stats: std::sync::RwLock::new(SessionStats::default()),
            metrics,
        }
    }

    /// Create a session for a committed group.
    ///
    /// The participant order is frozen as given. Persistence happens
    /// before the match becomes visible, so a failed create leaves no
    /// trace and the matchmaker keeps the group enqueued.
    pub async fn create(
        self: &Arc<Self>,
        match_id: MatchId,
        participants: Vec<Participant>,
        mode: GameMode,
    ) -> Result<Match> {
        let game = Match {
            id: match_id,
            participants,
            mode,
            created_at: current_timestamp(),
            status: MatchStatus::Starting,
            started_at: None,
            ended_at: None,
            result: None,
        };

        self.game_store.save(&game).await?;

        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        {
            let mut games = self.games.write().await;
            games.insert(
                match_id,
                ActiveMatch {
                    snapshot: Arc::new(game.clone()),
                    actions: actions_tx,
                },
            );
            self.metrics.set_active_games(games.len() as i64);
        }

        // Serial action worker for this match
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            worker.run_action_worker(match_id, actions_rx).await;
        });

        // Automatic start timer; a conflict means someone started or
        // ended the match first, which is fine
        let starter = Arc::clone(self);
        let start_delay = self.timings.start_delay;
        tokio::spawn(async move {
            sleep(start_delay).await;
            if let Err(e) = starter.start(match_id).await {
                if !ArenaError::is_conflict(&e) {
                    error!("Failed to start match {}: {}", match_id, e);
                }
            }
        });

        if let Ok(mut stats) = self.stats.write() {
            stats.matches_created += 1;
        }
        self.metrics.record_match_created(mode);

        info!(
            "Created {} match {} with {} players",
            mode,
            match_id,
            game.participants.len()
        );
        Ok(game)
    }

    /// Transition a match to active.
    ///
    /// Anything but the first start of a live match raises Conflict;
    /// callers treat that as a no-op.
    pub async fn start(&self, match_id: MatchId) -> Result<()> {
        let started = {
            let mut games = self.games.write().await;
            let Some(entry) = games.get_mut(&match_id) else {
                debug!("start on unknown match {}, ignoring", match_id);
                return Ok(());
            };
            if entry.snapshot.status != MatchStatus::Starting {
                return Err(ArenaError::Conflict {
                    message: format!(
                        "match {} is {:?}, not starting",
                        match_id, entry.snapshot.status
                    ),
                }
                .into());
            }

            let mut updated = (*entry.snapshot).clone();
            updated.status = MatchStatus::Active;
            updated.started_at = Some(current_timestamp());
            entry.snapshot = Arc::new(updated);
            entry.snapshot.clone()
        };

        // Best effort; the in-memory state is authoritative while live
        if let Err(e) = self.game_store.save(&started).await {
            warn!("Failed to persist start of match {}: {}", match_id, e);
        }

        if let Ok(mut stats) = self.stats.write() {
            stats.games_started += 1;
        }
        self.metrics.record_game_started(started.mode);

        info!("Match {} is now active", match_id);
        self.fanout.game_started(&started).await;
        Ok(())
    }

    /// Queue an action onto the match's serial worker.
    ///
    /// Anything not addressable - unknown match, inactive status, or a
    /// session tag that is not a participant - is silently dropped.
    pub async fn handle_action(
        &self,
        match_id: MatchId,
        session_tag: &str,
        action: &str,
        payload: serde_json::Value,
    ) {
        let games = self.games.read().await;
        let Some(entry) = games.get(&match_id) else {
            debug!("action for unknown match {}, dropped", match_id);
            return;
        };
        if entry.snapshot.status != MatchStatus::Active {
            debug!(
                "action {:?} for match {} in status {:?}, dropped",
                action, match_id, entry.snapshot.status
            );
            return;
        }
        let Some(actor) = entry.snapshot.participant_by_tag(session_tag) else {
            debug!(
                "action from non-participant tag on match {}, dropped",
                match_id
            );
            return;
        };

        let _ = entry.actions.send(QueuedAction {
            player_id: actor.player_id,
            action: action.to_string(),
            payload,
        });
    }

    /// Terminate a match and settle it.
    ///
    /// A second end is a no-op; ending a match that never started
    /// raises Conflict, which callers treat as a no-op.
    pub async fn end(
        self: &Arc<Self>,
        match_id: MatchId,
        winner_id: Option<PlayerId>,
        reason: EndReason,
    ) -> Result<()> {
        let finished = {
            let mut games = self.games.write().await;
            let Some(entry) = games.get_mut(&match_id) else {
                debug!("end on unknown match {}, ignoring", match_id);
                return Ok(());
            };
            match entry.snapshot.status {
                MatchStatus::Finished => return Ok(()),
                MatchStatus::Starting => {
                    return Err(ArenaError::Conflict {
                        message: format!("match {} has not started", match_id),
                    }
                    .into());
                }
                MatchStatus::Active => {}
            }

            let mut updated = (*entry.snapshot).clone();
            updated.status = MatchStatus::Finished;
            updated.ended_at = Some(current_timestamp());
            updated.result = Some(crate::types::MatchResult { winner_id, reason });
            entry.snapshot = Arc::new(updated);
            entry.snapshot.clone()
        };

        if let Err(e) = self.game_store.save(&finished).await {
            warn!("Failed to persist end of match {}: {}", match_id, e);
        }

        if finished.mode.is_rated() && finished.participants.len() == 2 {
            self.settle_ratings(&finished, winner_id).await;
        }

        if let Ok(mut stats) = self.stats.write() {
            stats.games_finished += 1;
        }
        self.metrics.record_game_ended(finished.mode, reason);

        info!(
            "Match {} finished ({}), winner: {:?}",
            match_id, reason, winner_id
        );
        self.fanout.game_ended(&finished).await;

        // Cool-down before the record leaves memory
        let evictor = Arc::clone(self);
        let eviction_delay = self.timings.eviction_delay;
        tokio::spawn(async move {
            sleep(eviction_delay).await;
            evictor.evict(match_id).await;
        });

        Ok(())
    }

    /// Apply pairwise rating updates for a two-player rated match
    async fn settle_ratings(&self, game: &Match, winner_id: Option<PlayerId>) {
        let (a, b) = (&game.participants[0], &game.participants[1]);

        let outcomes = match winner_id {
            None => (Outcome::Draw, Outcome::Draw),
            Some(w) if w == a.player_id => (Outcome::Win, Outcome::Loss),
            Some(w) if w == b.player_id => (Outcome::Loss, Outcome::Win),
            Some(w) => {
                warn!(
                    "winner {} is not a participant of match {}, skipping settlement",
                    w, game.id
                );
                return;
            }
        };

        for (me, opponent, outcome) in [(a, b, outcomes.0), (b, a, outcomes.1)] {
            match self
                .players
                .update_rating(me.player_id, game.mode, opponent.rating, outcome)
                .await
            {
                Ok(updated) => {
                    self.metrics.record_rating_update();
                    self.fanout
                        .rating_updated(
                            me.player_id,
                            game.mode,
                            me.rating,
                            updated.rating(game.mode),
                        )
                        .await;
                }
                Err(e) => {
                    error!(
                        "Rating settlement failed for player {} in match {}: {}",
                        me.player_id, game.id, e
                    );
                }
            }
        }
    }

    /// Drop a finished match from the hot map; its worker drains and exits
    async fn evict(&self, match_id: MatchId) {
        let mut games = self.games.write().await;
        if games.remove(&match_id).is_some() {
            self.metrics.set_active_games(games.len() as i64);
            if let Ok(mut stats) = self.stats.write() {
                stats.matches_evicted += 1;
            }
            debug!("Evicted match {} from memory", match_id);
        }
    }

    /// Serial dispatch loop for one match
    async fn run_action_worker(
        self: Arc<Self>,
        match_id: MatchId,
        mut actions_rx: mpsc::UnboundedReceiver<QueuedAction>,
    ) {
        while let Some(queued) = actions_rx.recv().await {
            let snapshot = {
                let games = self.games.read().await;
                games.get(&match_id).map(|entry| entry.snapshot.clone())
            };
            let Some(game) = snapshot else { break };

            // Re-check under the serial worker: the match may have ended
            // between queueing and dispatch.
            if game.status != MatchStatus::Active {
                continue;
            }
            let Some(actor) = game
                .participants
                .iter()
                .find(|p| p.player_id == queued.player_id)
            else {
                continue;
            };

            match actions::dispatch(&game, actor, &queued.action, &queued.payload) {
                Some(ActionEffect::Broadcast(data)) => {
                    self.fanout.game_update(&game, data).await;
                }
                Some(ActionEffect::EndMatch { winner_id, reason }) => {
                    // Conflicts (a concurrent end won) are a no-op here
                    if let Err(e) = self.end(match_id, winner_id, reason).await {
                        if !ArenaError::is_conflict(&e) {
                            error!("Failed to end match {} from action: {}", match_id, e);
                        }
                    }
                }
                None => {
                    debug!(
                        "Unsupported action {:?} on {} match {}, dropped",
                        queued.action, game.mode, match_id
                    );
                }
            }
        }
    }

    /// Look up a match: the hot map first, then the persistent store
    pub async fn get(&self, match_id: MatchId) -> Result<Option<Match>> {
        {
            let games = self.games.read().await;
            if let Some(entry) = games.get(&match_id) {
                return Ok(Some((*entry.snapshot).clone()));
            }
        }
        self.game_store.get(match_id).await
    }

    /// Number of matches currently held in memory
    pub async fn active_count(&self) -> usize {
        self.games.read().await.len()
    }

    /// Get current manager statistics
    pub fn stats(&self) -> SessionStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::store::game::InMemoryGameStore;
    use crate::store::player::InMemoryPlayerStore;
    use crate::transport::registry::{ConnectionRegistry, InMemoryConnectionRegistry};
    use crate::utils::generate_match_id;
    use serde_json::json;

    struct Harness {
        manager: Arc<SessionManager>,
        players: Arc<InMemoryPlayerStore>,
        publisher: Arc<MockEventPublisher>,
        registry: Arc<InMemoryConnectionRegistry>,
    }

    fn harness(timings: SessionTimings) -> Harness {
        let players = Arc::new(InMemoryPlayerStore::new());
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let publisher = Arc::new(MockEventPublisher::new());
        let fanout = Arc::new(EventFanOut::new(registry.clone(), publisher.clone()));
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let manager = Arc::new(SessionManager::new(
            players.clone(),
            Arc::new(InMemoryGameStore::new()),
            fanout,
            timings,
            metrics,
        ));
        Harness {
            manager,
            players,
            publisher,
            registry,
        }
    }

    fn fast_timings() -> SessionTimings {
        SessionTimings {
            start_delay: Duration::from_millis(5),
            eviction_delay: Duration::from_millis(50),
        }
    }

    async fn chess_participants(players: &InMemoryPlayerStore) -> Vec<Participant> {
        let alice = players.create("alice", GameMode::Chess).await.unwrap();
        let bob = players.create("bob", GameMode::Chess).await.unwrap();
        vec![
            Participant {
                player_id: alice.id,
                name: alice.name.clone(),
                rating: alice.rating(GameMode::Chess),
                session_tag: "tag-alice".to_string(),
            },
            Participant {
                player_id: bob.id,
                name: bob.name.clone(),
                rating: bob.rating(GameMode::Chess),
                session_tag: "tag-bob".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_lifecycle_reaches_active() {
        let h = harness(fast_timings());
        let participants = chess_participants(&h.players).await;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();
        assert_eq!(game.status, MatchStatus::Starting);

        // The start timer fires after the configured delay
        sleep(Duration::from_millis(50)).await;
        let live = h.manager.get(game.id).await.unwrap().unwrap();
        assert_eq!(live.status, MatchStatus::Active);
        assert!(live.started_at.is_some());
    }

    #[tokio::test]
    async fn test_second_start_conflicts_without_effect() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();

        h.manager.start(game.id).await.unwrap();
        let first = h.manager.get(game.id).await.unwrap().unwrap();

        // A repeat start surfaces Conflict and changes nothing
        let err = h.manager.start(game.id).await.unwrap_err();
        assert!(ArenaError::is_conflict(&err));
        let second = h.manager.get(game.id).await.unwrap().unwrap();
        assert_eq!(first.started_at, second.started_at);
        assert_eq!(second.status, MatchStatus::Active);
    }

    #[tokio::test]
    async fn test_end_before_start_conflicts() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let alice_id = participants[0].player_id;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();

        let err = h
            .manager
            .end(game.id, Some(alice_id), EndReason::Completed)
            .await
            .unwrap_err();
        assert!(ArenaError::is_conflict(&err));

        // The match is untouched and no settlement happened
        let unchanged = h.manager.get(game.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, MatchStatus::Starting);
        assert!(unchanged.result.is_none());
        let alice = h.players.get(alice_id).await.unwrap().unwrap();
        assert_eq!(alice.games_played, 0);
    }

    #[tokio::test]
    async fn test_end_settles_chess_ratings_once() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let alice_id = participants[0].player_id;
        let bob_id = participants[1].player_id;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();
        h.manager.start(game.id).await.unwrap();

        h.manager
            .end(game.id, Some(alice_id), EndReason::Completed)
            .await
            .unwrap();

        let alice = h.players.get(alice_id).await.unwrap().unwrap();
        let bob = h.players.get(bob_id).await.unwrap().unwrap();
        assert_eq!(alice.rating(GameMode::Chess), 1016);
        assert_eq!(bob.rating(GameMode::Chess), 984);
        assert_eq!(alice.wins, 1);
        assert_eq!(bob.losses, 1);

        // Reentrant end is a no-op: counters stay put
        h.manager
            .end(game.id, Some(bob_id), EndReason::Completed)
            .await
            .unwrap();
        let alice = h.players.get(alice_id).await.unwrap().unwrap();
        assert_eq!(alice.games_played, 1);
        assert_eq!(alice.rating(GameMode::Chess), 1016);
    }

    #[tokio::test]
    async fn test_end_draw_settles_both() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let alice_id = participants[0].player_id;
        let bob_id = participants[1].player_id;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();
        h.manager.start(game.id).await.unwrap();
        h.manager
            .end(game.id, None, EndReason::Completed)
            .await
            .unwrap();

        // Equal ratings drawing leaves both unchanged
        let alice = h.players.get(alice_id).await.unwrap().unwrap();
        let bob = h.players.get(bob_id).await.unwrap().unwrap();
        assert_eq!(alice.rating(GameMode::Chess), 1000);
        assert_eq!(bob.rating(GameMode::Chess), 1000);
        assert_eq!(alice.draws, 1);
        assert_eq!(bob.draws, 1);
    }

    #[tokio::test]
    async fn test_actions_only_from_active_participants() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        h.registry.register("tag-alice".to_string(), tx).await;

        // Still starting: dropped
        h.manager
            .handle_action(game.id, "tag-alice", "move", json!({"from":"e2","to":"e4"}))
            .await;

        h.manager.start(game.id).await.unwrap();
        // game_started notification lands first
        let raw = rx.recv().await.unwrap();
        assert!(raw.contains("game_started"));

        // Unknown tag: dropped
        h.manager
            .handle_action(game.id, "tag-mallory", "move", json!({"from":"e7","to":"e5"}))
            .await;

        // Participant move: relayed
        h.manager
            .handle_action(game.id, "tag-alice", "move", json!({"from":"e2","to":"e4"}))
            .await;
        let raw = rx.recv().await.unwrap();
        assert!(raw.contains(r#""type":"game_update""#));
        assert!(raw.contains(r#""from":"e2""#));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resign_ends_match_for_opponent() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let alice_id = participants[0].player_id;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();
        h.manager.start(game.id).await.unwrap();

        // Bob resigns; alice wins by resignation
        h.manager
            .handle_action(game.id, "tag-bob", "resign", serde_json::Value::Null)
            .await;

        // The serial worker processes the resign asynchronously
        let mut finished = None;
        for _ in 0..50 {
            sleep(Duration::from_millis(10)).await;
            let current = h.manager.get(game.id).await.unwrap().unwrap();
            if current.status == MatchStatus::Finished {
                finished = Some(current);
                break;
            }
        }
        let finished = finished.expect("match should finish after resign");
        let result = finished.result.unwrap();
        assert_eq!(result.winner_id, Some(alice_id));
        assert_eq!(result.reason, EndReason::Resignation);
    }

    #[tokio::test]
    async fn test_eviction_after_cooldown_keeps_store_copy() {
        let h = harness(fast_timings());
        let participants = chess_participants(&h.players).await;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Chess)
            .await
            .unwrap();

        sleep(Duration::from_millis(20)).await; // allow the start timer
        h.manager
            .end(game.id, None, EndReason::Abandoned)
            .await
            .unwrap();

        // Cool-down passes, the hot entry is evicted
        sleep(Duration::from_millis(120)).await;
        assert_eq!(h.manager.active_count().await, 0);

        // The persisted record remains readable
        let stored = h.manager.get(game.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Finished);
    }

    #[tokio::test]
    async fn test_non_rated_mode_skips_settlement() {
        let h = harness(SessionTimings {
            start_delay: Duration::from_secs(300),
            eviction_delay: Duration::from_secs(300),
        });
        let participants = chess_participants(&h.players).await;
        let alice_id = participants[0].player_id;
        let game = h
            .manager
            .create(generate_match_id(), participants, GameMode::Rts)
            .await
            .unwrap();
        h.manager.start(game.id).await.unwrap();
        h.manager
            .end(game.id, Some(alice_id), EndReason::Completed)
            .await
            .unwrap();

        let alice = h.players.get(alice_id).await.unwrap().unwrap();
        assert_eq!(alice.games_played, 0);
        assert_eq!(alice.rating(GameMode::Rts), 1000);

        // game.ended still reaches the bus
        assert!(h
            .publisher
            .routing_keys()
            .contains(&"game.ended".to_string()));
    }
}
