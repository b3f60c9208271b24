//! Player records and leaderboards
//!
//! The player store exclusively owns player records and the per-mode and
//! global leaderboards. Every write refreshes the sliding 24-hour TTL on
//! the record.

use crate::error::{ArenaError, Result};
use crate::rating::elo;
use crate::types::{GameMode, Outcome, Player, PlayerId};
use crate::utils::{current_timestamp, generate_player_id};
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

/// Which leaderboard a read targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaderboardScope {
    Global,
    Mode(GameMode),
}

impl LeaderboardScope {
    /// Store key suffix for this scope
    pub fn key(&self) -> String {
        match self {
            LeaderboardScope::Global => "global".to_string(),
            LeaderboardScope::Mode(mode) => mode.to_string(),
        }
    }
}

impl std::fmt::Display for LeaderboardScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for LeaderboardScope {
    type Err = ArenaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "global" {
            Ok(LeaderboardScope::Global)
        } else {
            Ok(LeaderboardScope::Mode(s.parse()?))
        }
    }
}

/// One leaderboard row; rank is 1-based and dense
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub id: PlayerId,
    pub name: String,
    pub rating: i32,
    pub games_played: u32,
}

/// Trait for player record and leaderboard operations
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Create a fresh player and seed the global leaderboard
    async fn create(&self, name: &str, primary_mode: GameMode) -> Result<Player>;

    /// Fetch a player record
    async fn get(&self, id: PlayerId) -> Result<Option<Player>>;

    /// Apply a rating update for a settled game and persist the result
    async fn update_rating(
        &self,
        id: PlayerId,
        mode: GameMode,
        opponent_rating: i32,
        outcome: Outcome,
    ) -> Result<Player>;

    /// Read a leaderboard, descending by rating
    async fn leaderboard(&self, scope: LeaderboardScope, limit: usize)
        -> Result<Vec<LeaderboardRow>>;

    /// Presence refresh: bump last_active and the record TTL
    async fn touch(&self, id: PlayerId) -> Result<()>;
}

/// Reject names shorter than two printable characters
fn validate_name(name: &str) -> Result<()> {
    let printable = name
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .count();
    if printable < 2 {
        return Err(ArenaError::InvalidInput {
            reason: format!("name must contain at least 2 printable characters: {:?}", name),
        }
        .into());
    }
    Ok(())
}

/// Apply the Elo update and counters to a loaded record
fn settle_record(
    player: &mut Player,
    mode: GameMode,
    opponent_rating: i32,
    outcome: Outcome,
    k_factor: f64,
) -> Result<i32> {
    let current = player.rating(mode);
    let updated = elo::new_rating(current, opponent_rating, outcome, k_factor)?;

    player.ratings.insert(mode, updated);
    player.games_played += 1;
    match outcome {
        Outcome::Win => player.wins += 1,
        Outcome::Loss => player.losses += 1,
        Outcome::Draw => player.draws += 1,
    }
    player.last_active = current_timestamp();

    Ok(updated)
}

/// Assign dense 1-based ranks to rows already sorted descending by rating
fn assign_dense_ranks(rows: &mut [LeaderboardRow]) {
    let mut rank = 0;
    let mut previous: Option<i32> = None;
    for row in rows.iter_mut() {
        if previous != Some(row.rating) {
            rank += 1;
            previous = Some(row.rating);
        }
        row.rank = rank;
    }
}

fn player_key(id: PlayerId) -> String {
    format!("player:{}", id)
}

fn leaderboard_key(scope: LeaderboardScope) -> String {
    format!("leaderboard:{}", scope.key())
}

/// Redis-backed player store
pub struct RedisPlayerStore {
    conn: redis::aio::MultiplexedConnection,
    ttl_seconds: i64,
    k_factor: f64,
}

impl RedisPlayerStore {
    pub fn new(conn: redis::aio::MultiplexedConnection, ttl_seconds: i64) -> Self {
        Self {
            conn,
            ttl_seconds,
            k_factor: elo::DEFAULT_K_FACTOR,
        }
    }

    async fn save(&self, player: &Player) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(player).map_err(|e| ArenaError::InternalError {
            message: format!("failed to serialize player: {}", e),
        })?;

        conn.set_ex::<_, _, ()>(player_key(player.id), body, self.ttl_seconds as u64)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to persist player: {}", e),
            })?;
        Ok(())
    }

    async fn load(&self, id: PlayerId) -> Result<Option<Player>> {
        let mut conn = self.conn.clone();
        let body: Option<String> =
            conn.get(player_key(id))
                .await
                .map_err(|e| ArenaError::TransientBackend {
                    message: format!("failed to load player: {}", e),
                })?;

        match body {
            Some(raw) => {
                let player = serde_json::from_str(&raw).map_err(|e| ArenaError::InternalError {
                    message: format!("corrupt player record {}: {}", id, e),
                })?;
                Ok(Some(player))
            }
            None => Ok(None),
        }
    }

    async fn upsert_leaderboard(
        &self,
        scope: LeaderboardScope,
        id: PlayerId,
        rating: i32,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(leaderboard_key(scope), id.to_string(), rating)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to update leaderboard: {}", e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for RedisPlayerStore {
    async fn create(&self, name: &str, primary_mode: GameMode) -> Result<Player> {
        validate_name(name)?;

        let player = Player::new(generate_player_id(), name.trim().to_string(), current_timestamp());
        self.save(&player).await?;
        self.upsert_leaderboard(
            LeaderboardScope::Global,
            player.id,
            player.rating(primary_mode),
        )
        .await?;

        Ok(player)
    }

    async fn get(&self, id: PlayerId) -> Result<Option<Player>> {
        self.load(id).await
    }

    async fn update_rating(
        &self,
        id: PlayerId,
        mode: GameMode,
        opponent_rating: i32,
        outcome: Outcome,
    ) -> Result<Player> {
        let mut player = self.load(id).await?.ok_or_else(|| ArenaError::PlayerNotFound {
            player_id: id.to_string(),
        })?;

        let updated = settle_record(&mut player, mode, opponent_rating, outcome, self.k_factor)?;

        self.save(&player).await?;
        self.upsert_leaderboard(LeaderboardScope::Mode(mode), id, updated)
            .await?;

        Ok(player)
    }

    async fn leaderboard(
        &self,
        scope: LeaderboardScope,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = conn
            .zrevrange_withscores(leaderboard_key(scope), 0, limit as isize - 1)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to read leaderboard: {}", e),
            })?;

        if members.is_empty() {
            return Ok(Vec::new());
        }

        let scored: Vec<(PlayerId, i32)> = members
            .iter()
            .filter_map(|(member, score)| {
                PlayerId::parse_str(member).ok().map(|id| (id, *score as i32))
            })
            .collect();
        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = scored.iter().map(|(id, _)| player_key(*id)).collect();
        let bodies: Vec<Option<String>> =
            conn.mget(keys)
                .await
                .map_err(|e| ArenaError::TransientBackend {
                    message: format!("failed to load leaderboard players: {}", e),
                })?;

        let mut rows = Vec::with_capacity(scored.len());
        for ((id, rating), body) in scored.into_iter().zip(bodies) {
            // Expired player records drop off the board silently
            let Some(raw) = body else { continue };
            let Ok(player) = serde_json::from_str::<Player>(&raw) else {
                continue;
            };
            rows.push(LeaderboardRow {
                rank: 0,
                id,
                name: player.name,
                rating,
                games_played: player.games_played,
            });
        }

        assign_dense_ranks(&mut rows);
        Ok(rows)
    }

    async fn touch(&self, id: PlayerId) -> Result<()> {
        if let Some(mut player) = self.load(id).await? {
            player.last_active = current_timestamp();
            self.save(&player).await?;
        }
        Ok(())
    }
}

/// In-memory player store for tests and development
pub struct InMemoryPlayerStore {
    players: RwLock<HashMap<PlayerId, Player>>,
    /// scope key -> (player -> rating)
    boards: RwLock<HashMap<String, HashMap<PlayerId, i32>>>,
    k_factor: f64,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            boards: RwLock::new(HashMap::new()),
            k_factor: elo::DEFAULT_K_FACTOR,
        }
    }

    fn upsert_board(&self, scope: LeaderboardScope, id: PlayerId, rating: i32) -> Result<()> {
        let mut boards = self.boards.write().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire leaderboard lock".to_string(),
        })?;
        boards.entry(scope.key()).or_default().insert(id, rating);
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn create(&self, name: &str, primary_mode: GameMode) -> Result<Player> {
        validate_name(name)?;

        let player = Player::new(generate_player_id(), name.trim().to_string(), current_timestamp());
        {
            let mut players = self.players.write().map_err(|_| ArenaError::InternalError {
                message: "failed to acquire players lock".to_string(),
            })?;
            players.insert(player.id, player.clone());
        }
        self.upsert_board(
            LeaderboardScope::Global,
            player.id,
            player.rating(primary_mode),
        )?;

        Ok(player)
    }

    async fn get(&self, id: PlayerId) -> Result<Option<Player>> {
        let players = self.players.read().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire players lock".to_string(),
        })?;
        Ok(players.get(&id).cloned())
    }

    async fn update_rating(
        &self,
        id: PlayerId,
        mode: GameMode,
        opponent_rating: i32,
        outcome: Outcome,
    ) -> Result<Player> {
        let updated_player = {
            let mut players = self.players.write().map_err(|_| ArenaError::InternalError {
                message: "failed to acquire players lock".to_string(),
            })?;
            let player = players.get_mut(&id).ok_or_else(|| ArenaError::PlayerNotFound {
                player_id: id.to_string(),
            })?;

            settle_record(player, mode, opponent_rating, outcome, self.k_factor)?;
            player.clone()
        };

        self.upsert_board(LeaderboardScope::Mode(mode), id, updated_player.rating(mode))?;
        Ok(updated_player)
    }

    async fn leaderboard(
        &self,
        scope: LeaderboardScope,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>> {
        let board = {
            let boards = self.boards.read().map_err(|_| ArenaError::InternalError {
                message: "failed to acquire leaderboard lock".to_string(),
            })?;
            boards.get(&scope.key()).cloned().unwrap_or_default()
        };
        let players = self.players.read().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire players lock".to_string(),
        })?;

        let mut entries: Vec<(PlayerId, i32)> = board.into_iter().collect();
        // Descending by rating, ties by id for a stable order
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);

        let mut rows = Vec::with_capacity(entries.len());
        for (id, rating) in entries {
            let Some(player) = players.get(&id) else { continue };
            rows.push(LeaderboardRow {
                rank: 0,
                id,
                name: player.name.clone(),
                rating,
                games_played: player.games_played,
            });
        }

        assign_dense_ranks(&mut rows);
        Ok(rows)
    }

    async fn touch(&self, id: PlayerId) -> Result<()> {
        let mut players = self.players.write().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire players lock".to_string(),
        })?;
        if let Some(player) = players.get_mut(&id) {
            player.last_active = current_timestamp();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_RATING;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryPlayerStore::new();
        let player = store.create("alice", GameMode::Chess).await.unwrap();

        assert_eq!(player.rating(GameMode::Chess), DEFAULT_RATING);
        let loaded = store.get(player.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "alice");

        // Fresh player appears on the global board at the default rating
        let board = store
            .leaderboard(LeaderboardScope::Global, 10)
            .await
            .unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].rating, DEFAULT_RATING);
        assert_eq!(board[0].rank, 1);
    }

    #[tokio::test]
    async fn test_name_validation() {
        let store = InMemoryPlayerStore::new();
        assert!(store.create("a", GameMode::Chess).await.is_err());
        assert!(store.create("  ", GameMode::Chess).await.is_err());
        assert!(store.create("\t\n", GameMode::Chess).await.is_err());
        assert!(store.create("ab", GameMode::Chess).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_rating_counters_and_board() {
        let store = InMemoryPlayerStore::new();
        let alice = store.create("alice", GameMode::Chess).await.unwrap();

        let updated = store
            .update_rating(alice.id, GameMode::Chess, 1200, Outcome::Win)
            .await
            .unwrap();
        assert_eq!(updated.rating(GameMode::Chess), 1024);
        assert_eq!(updated.wins, 1);
        assert_eq!(updated.games_played, 1);
        assert_eq!(
            updated.games_played,
            updated.wins + updated.losses + updated.draws
        );
        assert!(updated.last_active >= alice.last_active);

        // Board reflects the new rating immediately after the update returns
        let board = store
            .leaderboard(LeaderboardScope::Mode(GameMode::Chess), 10)
            .await
            .unwrap();
        assert_eq!(board[0].id, alice.id);
        assert_eq!(board[0].rating, 1024);
    }

    #[tokio::test]
    async fn test_update_rating_missing_player() {
        let store = InMemoryPlayerStore::new();
        let missing = generate_player_id();
        let err = store
            .update_rating(missing, GameMode::Chess, 1000, Outcome::Win)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArenaError>(),
            Some(ArenaError::PlayerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_dense_ranks() {
        let store = InMemoryPlayerStore::new();
        let a = store.create("aa", GameMode::Chess).await.unwrap();
        let b = store.create("bb", GameMode::Chess).await.unwrap();
        let c = store.create("cc", GameMode::Chess).await.unwrap();

        // a: 1024, b and c stay tied at 976 after symmetric losses
        store
            .update_rating(a.id, GameMode::Chess, 1000, Outcome::Win)
            .await
            .unwrap();
        store
            .update_rating(b.id, GameMode::Chess, 1000, Outcome::Loss)
            .await
            .unwrap();
        store
            .update_rating(c.id, GameMode::Chess, 1000, Outcome::Loss)
            .await
            .unwrap();

        let board = store
            .leaderboard(LeaderboardScope::Mode(GameMode::Chess), 10)
            .await
            .unwrap();
        let ranks: Vec<usize> = board.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_leaderboard_limit() {
        let store = InMemoryPlayerStore::new();
        for i in 0..5 {
            store
                .create(&format!("player{}", i), GameMode::Fps)
                .await
                .unwrap();
        }
        let board = store
            .leaderboard(LeaderboardScope::Global, 3)
            .await
            .unwrap();
        assert_eq!(board.len(), 3);
    }
}
