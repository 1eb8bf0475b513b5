//! Centipawn to win-probability mapping.
//!
//! Uses the logistic curve fitted on rated online games,
//! `p = 1 / (1 + exp(-0.00368208 * cp))`, so a fixed centipawn swing weighs
//! more near equality than in an already decided position.

use engine::MATE_BASE;

const LOGISTIC_SCALE: f64 = 0.00368208;

/// Centipawns beyond this add nothing to the estimate.
const CP_CEILING: i32 = 1000;

/// White's expected winning chance in `[0, 1]` for a White-relative score.
///
/// Mate-coded scores map to certainty for the side that mates.
pub fn win_probability(centipawns: i32) -> f64 {
    if centipawns > MATE_BASE {
        return 1.0;
    }
    if centipawns < -MATE_BASE {
        return 0.0;
    }
    let cp = f64::from(centipawns.clamp(-CP_CEILING, CP_CEILING));
    1.0 / (1.0 + (-LOGISTIC_SCALE * cp).exp())
}

/// Share of winning chances the mover gave away, in `[0, 1]`.
///
/// Gains for the mover count as zero.
pub fn win_probability_loss(pre: i32, post: i32, white_moved: bool) -> f64 {
    let before = win_probability(pre);
    let after = win_probability(post);
    let loss = if white_moved {
        before - after
    } else {
        after - before
    };
    loss.clamp(0.0, 1.0)
}
