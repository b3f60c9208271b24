//! Pairwise compatibility for candidate grouping
//!
//! The rating window widens with wait time; that widening is the sole
//! relaxation mechanism. The predicate is symmetric and reflexive but
//! not transitive, so greedy grouping can leave suboptimal partitions -
//! accepted.

use crate::config::MatchmakingSettings;
use crate::types::{GameMode, QueueEntry};
use crate::utils::wait_seconds;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Configuration for the compatibility predicate
#[derive(Debug, Clone)]
pub struct CompatibilityConfig {
    /// Rating window granted to a fresh pair
    pub base_window: i32,
    /// Widening per interval of waiting
    pub relax_step: i32,
    /// Waiting time that earns one widening step
    pub relax_interval: Duration,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            base_window: 100,
            relax_step: 30,
            relax_interval: Duration::from_secs(10),
        }
    }
}

impl From<&MatchmakingSettings> for CompatibilityConfig {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            base_window: settings.base_rating_window,
            relax_step: settings.relax_step,
            relax_interval: Duration::from_secs(settings.relax_interval_seconds),
        }
    }
}

/// Maximum allowed rating difference after `max_wait_seconds` of waiting
pub fn max_rating_gap(config: &CompatibilityConfig, max_wait_seconds: u64) -> i32 {
    let steps = max_wait_seconds / config.relax_interval.as_secs().max(1);
    config.base_window + config.relax_step * steps as i32
}

/// Whether two waiting candidates may share a match
pub fn compatible(
    a: &QueueEntry,
    b: &QueueEntry,
    mode: GameMode,
    now: DateTime<Utc>,
    config: &CompatibilityConfig,
) -> bool {
    let max_wait = wait_seconds(a.joined_at, now).max(wait_seconds(b.joined_at, now));
    let gap = (a.rating - b.rating).abs();
    if gap > max_rating_gap(config, max_wait) {
        return false;
    }

    match mode {
        GameMode::Fps => same_or_absent(&a.prefs.region, &b.prefs.region),
        GameMode::Chess => same_or_absent(&a.prefs.time_control, &b.prefs.time_control),
        GameMode::Moba | GameMode::Rts => true,
    }
}

/// A preference gates only when both sides state it
fn same_or_absent(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
