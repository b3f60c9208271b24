//! Common types used throughout the matchmaking and game-session service

use crate::error::ArenaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = Uuid;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Opaque identifier the transport layer assigns to each connected client
pub type SessionTag = String;

/// Rating every mode starts at for a fresh player
pub const DEFAULT_RATING: i32 = 1000;

/// Supported game modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Fps,
    Chess,
    Moba,
    Rts,
}

impl GameMode {
    pub const ALL: [GameMode; 4] = [GameMode::Fps, GameMode::Chess, GameMode::Moba, GameMode::Rts];

    /// Number of players a match of this mode is formed with
    pub fn players_per_match(&self) -> usize {
        match self {
            GameMode::Fps | GameMode::Moba => 10,
            GameMode::Chess | GameMode::Rts => 2,
        }
    }

    /// Whether settlement applies rating updates for this mode
    pub fn is_rated(&self) -> bool {
        matches!(self, GameMode::Chess)
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Fps => write!(f, "fps"),
            GameMode::Chess => write!(f, "chess"),
            GameMode::Moba => write!(f, "moba"),
            GameMode::Rts => write!(f, "rts"),
        }
    }
}

impl FromStr for GameMode {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fps" => Ok(GameMode::Fps),
            "chess" => Ok(GameMode::Chess),
            "moba" => Ok(GameMode::Moba),
            "rts" => Ok(GameMode::Rts),
            other => Err(ArenaError::InvalidInput {
                reason: format!("unknown game mode: {}", other),
            }),
        }
    }
}

/// Result of a game from a single player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    /// Actual score used in the rating formula
    pub fn score(&self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.5,
            Outcome::Loss => 0.0,
        }
    }
}

impl FromStr for Outcome {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Outcome::Win),
            "draw" => Ok(Outcome::Draw),
            "loss" => Ok(Outcome::Loss),
            other => Err(ArenaError::InvalidInput {
                reason: format!("unknown outcome: {}", other),
            }),
        }
    }
}

/// Persistent player record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Per-mode ratings; every mode is seeded at creation time
    pub ratings: HashMap<GameMode, i32>,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Player {
    /// Create a fresh player with all mode ratings at the default
    pub fn new(id: PlayerId, name: String, now: DateTime<Utc>) -> Self {
        let ratings = GameMode::ALL
            .iter()
            .map(|mode| (*mode, DEFAULT_RATING))
            .collect();

        Self {
            id,
            name,
            ratings,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            created_at: now,
            last_active: now,
        }
    }

    /// Current rating for a mode
    pub fn rating(&self, mode: GameMode) -> i32 {
        self.ratings.get(&mode).copied().unwrap_or(DEFAULT_RATING)
    }
}

/// Matchmaking preferences carried on a queue entry.
///
/// The inbound map may contain arbitrary keys; only the recognized ones
/// survive deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
}

/// A player's waiting record inside a mode queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub player_id: PlayerId,
    /// Rating cached at enqueue time; queue ordering key
    pub rating: i32,
    pub session_tag: SessionTag,
    #[serde(default)]
    pub prefs: Preferences,
    pub joined_at: DateTime<Utc>,
    /// Retained on the wire; relaxation derives from wait time instead
    #[serde(default)]
    pub search_expansion: u32,
}

/// A match participant, frozen at match-creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub player_id: PlayerId,
    pub name: String,
    pub rating: i32,
    pub session_tag: SessionTag,
}

/// Lifecycle states of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Starting,
    Active,
    Finished,
}

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Completed,
    Resignation,
    Timeout,
    Abandoned,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::Completed => write!(f, "completed"),
            EndReason::Resignation => write!(f, "resignation"),
            EndReason::Timeout => write!(f, "timeout"),
            EndReason::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Terminal result of a match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// None means a draw
    pub winner_id: Option<PlayerId>,
    pub reason: EndReason,
}

/// A game session from creation through settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    /// Frozen in the order the matchmaker committed the group
    pub participants: Vec<Participant>,
    pub mode: GameMode,
    pub created_at: DateTime<Utc>,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
}

impl Match {
    /// Participant lookup by session tag
    pub fn participant_by_tag(&self, tag: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.session_tag == tag)
    }

    /// Session tags of all participants, in participant order
    pub fn session_tags(&self) -> Vec<SessionTag> {
        self.participants
            .iter()
            .map(|p| p.session_tag.clone())
            .collect()
    }
}

/// Bus event payloads

/// Published when a player enters a mode queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJoinedEvent {
    pub player_id: PlayerId,
    pub game_mode: GameMode,
    pub rating: i32,
    pub timestamp: DateTime<Utc>,
}

/// Published when a player leaves a mode queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueLeftEvent {
    pub player_id: PlayerId,
    pub game_mode: GameMode,
    pub timestamp: DateTime<Utc>,
}

/// Published when the matchmaker commits a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreatedEvent {
    pub match_id: MatchId,
    pub game_mode: GameMode,
    pub players: Vec<Participant>,
    pub timestamp: DateTime<Utc>,
}

/// Published when a match transitions to active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartedEvent {
    pub match_id: MatchId,
    pub game_mode: GameMode,
    pub timestamp: DateTime<Utc>,
}

/// Published on settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEndedEvent {
    pub match_id: MatchId,
    pub game_mode: GameMode,
    pub result: MatchResult,
    pub timestamp: DateTime<Utc>,
}

/// Published after a rating update commits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingUpdatedEvent {
    pub player_id: PlayerId,
    pub game_mode: GameMode,
    pub old_rating: i32,
    pub new_rating: i32,
    pub timestamp: DateTime<Utc>,
}

/// Transport messages, client to core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinQueue {
        player_id: PlayerId,
        game_mode: GameMode,
        #[serde(default)]
        preferences: Preferences,
    },
    #[serde(rename_all = "camelCase")]
    LeaveQueue {
        player_id: PlayerId,
        game_mode: GameMode,
    },
    #[serde(rename_all = "camelCase")]
    GameAction {
        game_id: MatchId,
        action: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Player summary carried in a match_found notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFoundPlayer {
    pub id: PlayerId,
    pub username: String,
    pub rating: i32,
}

/// Transport messages, core to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    QueueJoined { game_mode: GameMode },
    QueueLeft {},
    #[serde(rename_all = "camelCase")]
    MatchFound {
        game_id: MatchId,
        game_mode: GameMode,
        players: Vec<MatchFoundPlayer>,
    },
    GameUpdate { data: serde_json::Value },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("chess".parse::<GameMode>().unwrap(), GameMode::Chess);
        assert_eq!("fps".parse::<GameMode>().unwrap(), GameMode::Fps);
        assert!("checkers".parse::<GameMode>().is_err());
    }

    #[test]
    fn test_mode_group_sizes() {
        assert_eq!(GameMode::Fps.players_per_match(), 10);
        assert_eq!(GameMode::Moba.players_per_match(), 10);
        assert_eq!(GameMode::Chess.players_per_match(), 2);
        assert_eq!(GameMode::Rts.players_per_match(), 2);
    }

    #[test]
    fn test_outcome_scores() {
        assert_eq!(Outcome::Win.score(), 1.0);
        assert_eq!(Outcome::Draw.score(), 0.5);
        assert_eq!(Outcome::Loss.score(), 0.0);
        assert!("victory".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_new_player_seeds_all_modes() {
        let player = Player::new(Uuid::new_v4(), "alice".to_string(), Utc::now());
        for mode in GameMode::ALL {
            assert_eq!(player.rating(mode), DEFAULT_RATING);
        }
        assert_eq!(player.games_played, 0);
    }

    #[test]
    fn test_preferences_ignore_unknown_keys() {
        let prefs: Preferences = serde_json::from_str(
            r#"{"region":"eu","timeControl":"10+0","favoriteColor":"green"}"#,
        )
        .unwrap();
        assert_eq!(prefs.region.as_deref(), Some("eu"));
        assert_eq!(prefs.time_control.as_deref(), Some("10+0"));
        assert_eq!(prefs.max_latency, None);
    }

    #[test]
    fn test_client_event_wire_format() {
        let raw = r#"{"type":"join_queue","playerId":"7f0c0eb2-94ea-4d95-9c3b-d1a0f6f6b1aa","gameMode":"chess","preferences":{"timeControl":"10+0"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::JoinQueue {
                game_mode,
                preferences,
                ..
            } => {
                assert_eq!(game_mode, GameMode::Chess);
                assert_eq!(preferences.time_control.as_deref(), Some("10+0"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_server_event_wire_format() {
        let event = ServerEvent::QueueJoined {
            game_mode: GameMode::Fps,
        };
        let raw = serde_json::to_string(&event).unwrap();
        assert_eq!(raw, r#"{"type":"queue_joined","gameMode":"fps"}"#);
    }
}
