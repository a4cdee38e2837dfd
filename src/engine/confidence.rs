//! Confidence calibration for a forecast line.

use super::smoothing::coefficient_of_variation;

pub const CONFIDENCE_FLOOR: f64 = 0.1;
pub const CONFIDENCE_CEILING: f64 = 1.0;

/// Score starts at 0.5 and earns boosts for history depth and
/// stability, clamped into [0.1, 1.0].
pub fn confidence_score(history: &[f64]) -> f64 {
    let mut score: f64 = 0.5;
    let n = history.len();

    if n >= 7 {
        score += 0.3;
    } else if n >= 3 {
        score += 0.15;
    }

    if n >= 3 {
        let cv = coefficient_of_variation(history);
        if cv < 0.3 {
            score += 0.2;
        } else if cv < 0.6 {
            score += 0.1;
        }
    }

    score.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
}
