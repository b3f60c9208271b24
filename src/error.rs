//! Error types for the matchmaking and game-session service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and session scenarios
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("player not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("backend unavailable: {message}")]
    TransientBackend { message: String },

    #[error("conflicting state transition: {message}")]
    Conflict { message: String },

    #[error("bus connection failed: {message}")]
    BusConnectionFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}

impl ArenaError {
    /// Whether an error should be treated as a no-op by lifecycle callers.
    pub fn is_conflict(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ArenaError>(),
            Some(ArenaError::Conflict { .. })
        )
    }
}
