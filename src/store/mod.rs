//! Persistence layer for players, queues, and match records
//!
//! All access to the external store goes through these traits; no other
//! component touches keys directly. Each trait ships a Redis-backed
//! implementation and an in-memory one for tests and development.

pub mod game;
pub mod player;
pub mod queue;

// Re-export commonly used types
pub use game::{GameStore, InMemoryGameStore, RedisGameStore};
pub use player::{
    InMemoryPlayerStore, LeaderboardRow, LeaderboardScope, PlayerStore, RedisPlayerStore,
};
pub use queue::{InMemoryQueueStore, QueueStore, RedisQueueStore};
