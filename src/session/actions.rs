//! Per-mode dispatch of in-game actions
//!
//! The core is a pass-through relay: payloads are opaque except for the
//! fields lifted into the broadcast shape. Unknown actions and modes
//! without a handler produce no effect; callers log and drop them.

use crate::types::{EndReason, GameMode, Match, Participant, PlayerId};
use crate::utils::current_timestamp;
use serde_json::{json, Value};

/// What an accepted action does
#[derive(Debug, Clone)]
pub enum ActionEffect {
    /// Relay a payload to every participant
    Broadcast(Value),
    /// Terminate the match
    EndMatch {
        winner_id: Option<PlayerId>,
        reason: EndReason,
    },
}

/// Dispatch one action from a participant of an active match
pub fn dispatch(game: &Match, actor: &Participant, action: &str, payload: &Value) -> Option<ActionEffect> {
    match game.mode {
        GameMode::Chess => dispatch_chess(game, actor, action, payload),
        GameMode::Fps => dispatch_fps(actor, action, payload),
        _ => None,
    }
}

fn dispatch_chess(
    game: &Match,
    actor: &Participant,
    action: &str,
    payload: &Value,
) -> Option<ActionEffect> {
    match action {
        "move" => Some(ActionEffect::Broadcast(json!({
            "type": "move",
            "playerId": actor.player_id,
            "move": {
                "from": payload.get("from"),
                "to": payload.get("to"),
            },
            "timestamp": current_timestamp().timestamp_millis(),
        }))),
        "resign" => {
            // The remaining player wins
            let winner = game
                .participants
                .iter()
                .find(|p| p.player_id != actor.player_id)?;
            Some(ActionEffect::EndMatch {
                winner_id: Some(winner.player_id),
                reason: EndReason::Resignation,
            })
        }
        _ => None,
    }
}

fn dispatch_fps(actor: &Participant, action: &str, payload: &Value) -> Option<ActionEffect> {
    match action {
        "position_update" => Some(ActionEffect::Broadcast(json!({
            "type": "player_position",
            "playerId": actor.player_id,
            "position": payload.get("position"),
            "rotation": payload.get("rotation"),
            "timestamp": current_timestamp().timestamp_millis(),
        }))),
        "shoot" => Some(ActionEffect::Broadcast(json!({
            "type": "player_shoot",
            "playerId": actor.player_id,
            "target": payload.get("target"),
            "timestamp": current_timestamp().timestamp_millis(),
        }))),
        _ => None,
    }
}
