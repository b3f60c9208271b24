//! Static per-mode game configuration
//!
//! Mode configs are immutable process-wide data shared by reference;
//! they are serialized into API responses but never deserialized.

use crate::types::GameMode;
use serde::Serialize;

/// Playing-field dimensions, either numeric or a named grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MapSize {
    Dimensions { width: u32, height: u32 },
    Named(&'static str),
}

/// Read-only configuration returned with every match
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeConfig {
    pub max_players: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_size: Option<MapSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_control: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_size: Option<usize>,
    /// Advisory only; the core never auto-ends a match on it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub resources: &'static [&'static str],
}

static FPS_CONFIG: ModeConfig = ModeConfig {
    max_players: 10,
    map_size: Some(MapSize::Dimensions {
        width: 1000,
        height: 1000,
    }),
    time_control: None,
    increment: None,
    team_size: None,
    game_time_ms: Some(600_000),
    resources: &[],
};

static CHESS_CONFIG: ModeConfig = ModeConfig {
    max_players: 2,
    map_size: None,
    time_control: Some("10+0"),
    increment: Some(0),
    team_size: None,
    game_time_ms: None,
    resources: &[],
};

static MOBA_CONFIG: ModeConfig = ModeConfig {
    max_players: 10,
    map_size: None,
    time_control: None,
    increment: None,
    team_size: Some(5),
    game_time_ms: Some(1_800_000),
    resources: &[],
};

static RTS_CONFIG: ModeConfig = ModeConfig {
    max_players: 2,
    map_size: Some(MapSize::Named("128x128")),
    time_control: None,
    increment: None,
    team_size: None,
    game_time_ms: None,
    resources: &["minerals", "gas"],
};

impl GameMode {
    /// Static config for this mode, shared by reference
    pub fn config(&self) -> &'static ModeConfig {
        match self {
            GameMode::Fps => &FPS_CONFIG,
            GameMode::Chess => &CHESS_CONFIG,
            GameMode::Moba => &MOBA_CONFIG,
            GameMode::Rts => &RTS_CONFIG,
        }
    }
}
