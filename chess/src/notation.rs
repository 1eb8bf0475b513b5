//! Move-numbered human notation for engine output.
//!
//! Engine moves arrive in UCI form and are rendered against the position
//! they were reported for. A move that does not fit that position is passed
//! through as raw text instead of failing the caller.

use serde::{Deserialize, Serialize};

use crate::fen::Position;
use crate::san::format_san;
use crate::uci::validate_uci_move;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotationError {
    #[error("Invalid move notation: {0}")]
    InvalidMove(String),

    #[error("Illegal move in position: {0}")]
    IllegalMove(String),
}

/// A rendered move or line, tagged with whether it was checked against the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum MoveNotation {
    Validated(String),
    RawFallback(String),
}

impl MoveNotation {
    pub fn text(&self) -> &str {
        match self {
            Self::Validated(s) | Self::RawFallback(s) => s,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Validated(s) | Self::RawFallback(s) => s,
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated(_))
    }
}

impl std::fmt::Display for MoveNotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Move number prefix: "12." for White, "12..." for Black.
fn move_prefix(position: &Position) -> String {
    if position.is_white_to_move() {
        format!("{}.", position.fullmove_number())
    } else {
        format!("{}...", position.fullmove_number())
    }
}

/// Render a single UCI move as "12. Nf3" / "12... Nc6".
pub fn numbered_move(position: &Position, uci: &str) -> MoveNotation {
    match validate_uci_move(position.board(), uci) {
        Ok(mv) => MoveNotation::Validated(format!(
            "{} {}",
            move_prefix(position),
            format_san(position.board(), mv)
        )),
        Err(_) => MoveNotation::RawFallback(uci.to_string()),
    }
}

/// Render a principal variation as "12... Nc6 13. Nf3 Nf6".
///
/// Black-to-move lines open with the "N..." prefix; afterwards only White
/// moves carry a number. Any move that fails to validate turns the whole
/// line into a space-joined raw fallback.
pub fn numbered_line(position: &Position, moves: &[String]) -> MoveNotation {
    let raw = || MoveNotation::RawFallback(moves.join(" "));

    let mut board = position.board().clone();
    let mut parts = Vec::with_capacity(moves.len());

    for (i, uci) in moves.iter().enumerate() {
        let mv = match validate_uci_move(&board, uci) {
            Ok(mv) => mv,
            Err(_) => return raw(),
        };
        let san = format_san(&board, mv);
        let white = board.side_to_move() == cozy_chess::Color::White;
        if white {
            parts.push(format!("{}. {}", board.fullmove_number(), san));
        } else if i == 0 {
            parts.push(format!("{}... {}", board.fullmove_number(), san));
        } else {
            parts.push(san);
        }
        board.play_unchecked(mv);
    }

    MoveNotation::Validated(parts.join(" "))
}
