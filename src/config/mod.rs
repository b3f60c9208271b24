//! Configuration management for the matchmaking and game-session service

pub mod app;
pub mod modes;

// Re-export commonly used types
pub use app::{
    AmqpSettings, AppConfig, MatchmakingSettings, RedisSettings, ServiceSettings, SessionSettings,
};
pub use modes::{MapSize, ModeConfig};
