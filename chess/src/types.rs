//! Canonical piece and color types for the project.
//! cozy-chess types are internal implementation details.

use serde::{Deserialize, Serialize};

/// Project-owned piece type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// Project-owned color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceColor {
    White,
    Black,
}

impl PieceKind {
    /// SAN piece letter; pawns have none.
    pub fn san_letter(self) -> Option<char> {
        match self {
            Self::Pawn => None,
            Self::Knight => Some('N'),
            Self::Bishop => Some('B'),
            Self::Rook => Some('R'),
            Self::Queen => Some('Q'),
            Self::King => Some('K'),
        }
    }

    /// Lowercase letter used for UCI promotion suffixes.
    pub fn uci_letter(self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }
}

impl PieceColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl From<cozy_chess::Piece> for PieceKind {
    fn from(p: cozy_chess::Piece) -> Self {
        match p {
            cozy_chess::Piece::Pawn => Self::Pawn,
            cozy_chess::Piece::Knight => Self::Knight,
            cozy_chess::Piece::Bishop => Self::Bishop,
            cozy_chess::Piece::Rook => Self::Rook,
            cozy_chess::Piece::Queen => Self::Queen,
            cozy_chess::Piece::King => Self::King,
        }
    }
}

impl From<cozy_chess::Color> for PieceColor {
    fn from(c: cozy_chess::Color) -> Self {
        match c {
            cozy_chess::Color::White => Self::White,
            cozy_chess::Color::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for PieceColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
