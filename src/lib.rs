//! Arena Hall - Matchmaking and game-session core for multiplayer games
//!
//! This crate pairs waiting players into balanced matches per game mode,
//! runs each match's lifecycle from creation through settlement, relays
//! in-game events among participants, and applies Elo rating updates to
//! persistent player records on settlement.

pub mod amqp;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod matchmaker;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ArenaError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use events::EventFanOut;
pub use matchmaker::MatchmakingEngine;
pub use session::SessionManager;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
