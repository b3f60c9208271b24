//! Utility functions for the matchmaking and game-session service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique player ID
pub fn generate_player_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a fresh session tag for a transport connection
pub fn generate_session_tag() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Seconds a queue entry has been waiting, clamped at zero
pub fn wait_seconds(joined_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - joined_at).num_seconds().max(0) as u64
}
