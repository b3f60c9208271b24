//! Persisted match records
//!
//! The session manager writes match state here on every transition; reads
//! outside the hot in-memory map (HTTP lookups after eviction) come
//! through this store until the record's TTL lapses.

use crate::error::{ArenaError, Result};
use crate::types::{Match, MatchId};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for match record persistence
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Persist the current state of a match
    async fn save(&self, game: &Match) -> Result<()>;

    /// Fetch a match record
    async fn get(&self, id: MatchId) -> Result<Option<Match>>;
}

fn game_key(id: MatchId) -> String {
    format!("game:{}", id)
}

/// Redis-backed match store
pub struct RedisGameStore {
    conn: redis::aio::MultiplexedConnection,
    ttl_seconds: i64,
}

impl RedisGameStore {
    pub fn new(conn: redis::aio::MultiplexedConnection, ttl_seconds: i64) -> Self {
        Self { conn, ttl_seconds }
    }
}

#[async_trait]
impl GameStore for RedisGameStore {
    async fn save(&self, game: &Match) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(game).map_err(|e| ArenaError::InternalError {
            message: format!("failed to serialize match: {}", e),
        })?;
        conn.set_ex::<_, _, ()>(game_key(game.id), body, self.ttl_seconds as u64)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to persist match: {}", e),
            })?;
        Ok(())
    }

    async fn get(&self, id: MatchId) -> Result<Option<Match>> {
        let mut conn = self.conn.clone();
        let body: Option<String> =
            conn.get(game_key(id))
                .await
                .map_err(|e| ArenaError::TransientBackend {
                    message: format!("failed to load match: {}", e),
                })?;

        match body {
            Some(raw) => {
                let game = serde_json::from_str(&raw).map_err(|e| ArenaError::InternalError {
                    message: format!("corrupt match record {}: {}", id, e),
                })?;
                Ok(Some(game))
            }
            None => Ok(None),
        }
    }
}

/// In-memory match store for tests and development
#[derive(Default)]
pub struct InMemoryGameStore {
    games: RwLock<HashMap<MatchId, Match>>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn save(&self, game: &Match) -> Result<()> {
        let mut games = self.games.write().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire games lock".to_string(),
        })?;
        games.insert(game.id, game.clone());
        Ok(())
    }

    async fn get(&self, id: MatchId) -> Result<Option<Match>> {
        let games = self.games.read().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire games lock".to_string(),
        })?;
        Ok(games.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameMode, MatchStatus};
    use crate::utils::{current_timestamp, generate_match_id};

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let store = InMemoryGameStore::new();
        let game = Match {
            id: generate_match_id(),
            participants: vec![],
            mode: GameMode::Chess,
            created_at: current_timestamp(),
            status: MatchStatus::Starting,
            started_at: None,
            ended_at: None,
            result: None,
        };

        store.save(&game).await.unwrap();
        let loaded = store.get(game.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, game.id);
        assert_eq!(loaded.status, MatchStatus::Starting);

        assert!(store.get(generate_match_id()).await.unwrap().is_none());
    }
}
