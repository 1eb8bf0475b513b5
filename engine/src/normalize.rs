//! White-relative score normalization.
//!
//! Engines report scores from the side to move. Everything downstream works
//! in White's perspective with mates folded into the centipawn range as
//! `sign * (MATE_BASE + N)`.

use chess::PieceColor;

use crate::Score;

/// Offset for mate-coded scores; `abs(value) > MATE_BASE` marks a mate.
pub const MATE_BASE: i32 = 5000;

/// Plain centipawn scores are clamped below the mate range.
pub const MAX_CENTIPAWNS: i32 = MATE_BASE - 1;

/// Convert a side-to-move score into a White-relative centipawn value.
pub fn normalize_score(score: Score, side_to_move: PieceColor) -> i32 {
    let mover_relative = match score {
        Score::Centipawns(cp) => cp.clamp(-MAX_CENTIPAWNS, MAX_CENTIPAWNS),
        Score::Mate(n) if n > 0 => MATE_BASE.saturating_add(n),
        // `mate 0` is reported for a side that is already checkmated
        Score::Mate(n) => -MATE_BASE.saturating_add(n.saturating_abs()),
    };

    match side_to_move {
        PieceColor::White => mover_relative,
        PieceColor::Black => -mover_relative,
    }
}

/// Signed moves-to-mate for a mate-coded value, `None` for plain centipawns.
pub fn mate_distance(value: i32) -> Option<i32> {
    if value.abs() > MATE_BASE {
        Some(value.signum() * (value.abs() - MATE_BASE))
    } else {
        None
    }
}
