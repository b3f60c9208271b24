//! Per-mode waiting queues
//!
//! Queue sets are keyed by rating so a range scan yields rating order;
//! entry bodies are stored under their own keys and the sorted set holds
//! only player ids, keeping per-player removal cheap.

use crate::error::{ArenaError, Result};
use crate::types::{GameMode, PlayerId, QueueEntry};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for queue operations
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Add or supersede the entry for (player, mode); refreshes the queue TTL
    async fn enqueue(&self, mode: GameMode, entry: QueueEntry) -> Result<()>;

    /// Remove the unique entry for a player; returns whether one existed
    async fn dequeue(&self, mode: GameMode, player_id: PlayerId) -> Result<bool>;

    /// Remove every entry carrying the session tag, across all modes
    async fn dequeue_by_session_tag(&self, tag: &str) -> Result<Vec<(GameMode, PlayerId)>>;

    /// All entries for a mode; callers must tolerate concurrent changes
    async fn snapshot(&self, mode: GameMode) -> Result<Vec<QueueEntry>>;

    /// Atomic multi-remove of committed entries
    async fn remove(&self, mode: GameMode, entries: &[QueueEntry]) -> Result<()>;

    /// Current number of waiting entries in a mode
    async fn depth(&self, mode: GameMode) -> Result<usize>;
}

fn queue_key(mode: GameMode) -> String {
    format!("queue:{}", mode)
}

fn entry_key(mode: GameMode, player_id: PlayerId) -> String {
    format!("queue:{}:entry:{}", mode, player_id)
}

/// Redis-backed queue store
pub struct RedisQueueStore {
    conn: redis::aio::MultiplexedConnection,
    ttl_seconds: i64,
}

impl RedisQueueStore {
    pub fn new(conn: redis::aio::MultiplexedConnection, ttl_seconds: i64) -> Self {
        Self { conn, ttl_seconds }
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn enqueue(&self, mode: GameMode, entry: QueueEntry) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(&entry).map_err(|e| ArenaError::InternalError {
            message: format!("failed to serialize queue entry: {}", e),
        })?;

        // ZADD on an existing member replaces its score, so a re-enqueue
        // supersedes the previous entry in one shot.
        redis::pipe()
            .atomic()
            .zadd(queue_key(mode), entry.player_id.to_string(), entry.rating)
            .ignore()
            .set_ex(
                entry_key(mode, entry.player_id),
                body,
                self.ttl_seconds as u64,
            )
            .ignore()
            .expire(queue_key(mode), self.ttl_seconds)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to enqueue: {}", e),
            })?;

        Ok(())
    }

    async fn dequeue(&self, mode: GameMode, player_id: PlayerId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .zrem(queue_key(mode), player_id.to_string())
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to dequeue: {}", e),
            })?;
        conn.del::<_, ()>(entry_key(mode, player_id))
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to drop queue entry body: {}", e),
            })?;

        Ok(removed > 0)
    }

    async fn dequeue_by_session_tag(&self, tag: &str) -> Result<Vec<(GameMode, PlayerId)>> {
        let mut cancelled = Vec::new();
        for mode in GameMode::ALL {
            let entries = self.snapshot(mode).await?;
            for entry in entries.into_iter().filter(|e| e.session_tag == tag) {
                if self.dequeue(mode, entry.player_id).await? {
                    cancelled.push((mode, entry.player_id));
                }
            }
        }
        Ok(cancelled)
    }

    async fn snapshot(&self, mode: GameMode) -> Result<Vec<QueueEntry>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> =
            conn.zrange(queue_key(mode), 0, -1)
                .await
                .map_err(|e| ArenaError::TransientBackend {
                    message: format!("failed to scan queue: {}", e),
                })?;

        if members.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = members
            .iter()
            .filter_map(|m| PlayerId::parse_str(m).ok())
            .map(|id| entry_key(mode, id))
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let bodies: Vec<Option<String>> =
            conn.mget(keys)
                .await
                .map_err(|e| ArenaError::TransientBackend {
                    message: format!("failed to load queue entries: {}", e),
                })?;

        // An id whose body expired is treated as no longer waiting
        let entries = bodies
            .into_iter()
            .flatten()
            .filter_map(|raw| serde_json::from_str(&raw).ok())
            .collect();
        Ok(entries)
    }

    async fn remove(&self, mode: GameMode, entries: &[QueueEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in entries {
            pipe.zrem(queue_key(mode), entry.player_id.to_string())
                .ignore()
                .del(entry_key(mode, entry.player_id))
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ArenaError::TransientBackend {
                message: format!("failed to remove committed group: {}", e),
            })?;

        Ok(())
    }

    async fn depth(&self, mode: GameMode) -> Result<usize> {
        let mut conn = self.conn.clone();
        let count: usize =
            conn.zcard(queue_key(mode))
                .await
                .map_err(|e| ArenaError::TransientBackend {
                    message: format!("failed to read queue depth: {}", e),
                })?;
        Ok(count)
    }
}

/// In-memory queue store for tests and development
#[derive(Default)]
pub struct InMemoryQueueStore {
    queues: RwLock<HashMap<GameMode, HashMap<PlayerId, QueueEntry>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_queues<T>(
        &self,
        f: impl FnOnce(&mut HashMap<GameMode, HashMap<PlayerId, QueueEntry>>) -> T,
    ) -> Result<T> {
        let mut queues = self.queues.write().map_err(|_| ArenaError::InternalError {
            message: "failed to acquire queue lock".to_string(),
        })?;
        Ok(f(&mut queues))
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, mode: GameMode, entry: QueueEntry) -> Result<()> {
        self.with_queues(|queues| {
            queues.entry(mode).or_default().insert(entry.player_id, entry);
        })
    }

    async fn dequeue(&self, mode: GameMode, player_id: PlayerId) -> Result<bool> {
        self.with_queues(|queues| {
            queues
                .get_mut(&mode)
                .map(|q| q.remove(&player_id).is_some())
                .unwrap_or(false)
        })
    }

    async fn dequeue_by_session_tag(&self, tag: &str) -> Result<Vec<(GameMode, PlayerId)>> {
        self.with_queues(|queues| {
            let mut cancelled = Vec::new();
            for (mode, queue) in queues.iter_mut() {
                let tagged: Vec<PlayerId> = queue
                    .values()
                    .filter(|e| e.session_tag == tag)
                    .map(|e| e.player_id)
                    .collect();
                for player_id in tagged {
                    queue.remove(&player_id);
                    cancelled.push((*mode, player_id));
                }
            }
            cancelled
        })
    }

    async fn snapshot(&self, mode: GameMode) -> Result<Vec<QueueEntry>> {
        self.with_queues(|queues| {
            let mut entries: Vec<QueueEntry> = queues
                .get(&mode)
                .map(|q| q.values().cloned().collect())
                .unwrap_or_default();
            // Mirror the sorted-set scan order: ascending by rating
            entries.sort_by(|a, b| {
                a.rating
                    .cmp(&b.rating)
                    .then_with(|| a.player_id.cmp(&b.player_id))
            });
            entries
        })
    }

    async fn remove(&self, mode: GameMode, entries: &[QueueEntry]) -> Result<()> {
        self.with_queues(|queues| {
            if let Some(queue) = queues.get_mut(&mode) {
                for entry in entries {
                    queue.remove(&entry.player_id);
                }
            }
        })
    }

    async fn depth(&self, mode: GameMode) -> Result<usize> {
        self.with_queues(|queues| queues.get(&mode).map(|q| q.len()).unwrap_or(0))
    }
}
