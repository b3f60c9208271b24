//! Pure Elo rating arithmetic
//!
//! Stateless functions shared by the player store and its tests. The
//! expected-score curve comes from the skillratings crate; rounding and
//! the rating floor are applied here.

use crate::error::{ArenaError, Result};
use crate::types::Outcome;
use skillratings::elo::{expected_score as elo_expected, EloRating};

/// Minimum permissible rating after any update
pub const RATING_FLOOR: i32 = 100;

/// Default K-factor for rating updates
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Probability of the player beating the opponent
pub fn expected_score(player_rating: i32, opponent_rating: i32) -> f64 {
    let player = EloRating {
        rating: f64::from(player_rating),
    };
    let opponent = EloRating {
        rating: f64::from(opponent_rating),
    };
    let (expected, _) = elo_expected(&player, &opponent);
    expected
}

/// New rating for the player after a game against the opponent.
///
/// Ratings below the floor are rejected rather than silently clamped on
/// input; the result is clamped to the floor.
pub fn new_rating(
    player_rating: i32,
    opponent_rating: i32,
    outcome: Outcome,
    k_factor: f64,
) -> Result<i32> {
    if player_rating < RATING_FLOOR || opponent_rating < RATING_FLOOR {
        return Err(ArenaError::InvalidInput {
            reason: format!(
                "ratings must be at least {}: got {} and {}",
                RATING_FLOOR, player_rating, opponent_rating
            ),
        }
        .into());
    }
    if !k_factor.is_finite() || k_factor <= 0.0 {
        return Err(ArenaError::InvalidInput {
            reason: format!("k-factor must be a positive number: got {}", k_factor),
        }
        .into());
    }

    let expected = expected_score(player_rating, opponent_rating);
    let updated = (f64::from(player_rating) + k_factor * (outcome.score() - expected)).round();

    Ok((updated as i32).max(RATING_FLOOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_score_curve() {
        // Equal ratings are a coin flip
        assert!((expected_score(1000, 1000) - 0.5).abs() < 1e-9);

        // A 400-point edge is expected to win ~10:1
        let strong = expected_score(1400, 1000);
        assert!((strong - 10.0 / 11.0).abs() < 1e-9);

        // Complementary probabilities
        let weak = expected_score(1000, 1400);
        assert!((strong + weak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_upset_win_values() {
        // 1000 beats 1200: expected = 1/(1+10^0.5), gain = round(32 * 0.7597) = 24
        let winner = new_rating(1000, 1200, Outcome::Win, DEFAULT_K_FACTOR).unwrap();
        assert_eq!(winner, 1024);

        let loser = new_rating(1200, 1000, Outcome::Loss, DEFAULT_K_FACTOR).unwrap();
        assert_eq!(loser, 1176);
    }

    #[test]
    fn test_symmetry_ignoring_rounding() {
        for (a, b) in [(1000, 1050), (1500, 900), (100, 2400), (1234, 1233)] {
            let new_a = new_rating(a, b, Outcome::Win, DEFAULT_K_FACTOR).unwrap();
            let new_b = new_rating(b, a, Outcome::Loss, DEFAULT_K_FACTOR).unwrap();
            let delta_a = new_a - a;
            let delta_b = new_b - b;
            // Zero-sum up to rounding, and each delta bounded by k
            assert!((delta_a + delta_b).abs() <= 1, "{} vs {}", a, b);
            assert!(delta_a.abs() <= DEFAULT_K_FACTOR as i32);
            assert!(delta_b.abs() <= DEFAULT_K_FACTOR as i32);
        }
    }

    #[test]
    fn test_draw_moves_toward_each_other() {
        let low = new_rating(1000, 1400, Outcome::Draw, DEFAULT_K_FACTOR).unwrap();
        let high = new_rating(1400, 1000, Outcome::Draw, DEFAULT_K_FACTOR).unwrap();
        assert!(low > 1000);
        assert!(high < 1400);
    }

    #[test]
    fn test_rating_floor_enforced() {
        // A floor-rated player losing to a giant cannot sink below the floor
        let result = new_rating(100, 2000, Outcome::Loss, DEFAULT_K_FACTOR).unwrap();
        assert_eq!(result, RATING_FLOOR);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(new_rating(99, 1000, Outcome::Win, DEFAULT_K_FACTOR).is_err());
        assert!(new_rating(1000, 50, Outcome::Win, DEFAULT_K_FACTOR).is_err());
        assert!(new_rating(1000, 1000, Outcome::Win, 0.0).is_err());
        assert!(new_rating(1000, 1000, Outcome::Win, f64::NAN).is_err());
    }
}
