//! Rating system for settled games
//!
//! Classic integer Elo over the skillratings crate's expected-score
//! primitive, with the service's rounding and floor policy on top.

pub mod elo;

// Re-export commonly used items
pub use elo::{expected_score, new_rating, DEFAULT_K_FACTOR, RATING_FLOOR};
