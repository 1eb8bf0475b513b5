use cozy_chess::Board;

use crate::types::PieceColor;

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(FenError::InvalidFormat(fen.to_string()));
    }

    fen.parse().map_err(|_| FenError::InvalidFormat(fen.to_string()))
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

/// An immutable board state.
///
/// The FEN text is kept verbatim because it is the key the engine and the
/// evaluation cache work with; the parsed board is only read for side to
/// move, move numbers and move validation.
#[derive(Debug, Clone)]
pub struct Position {
    fen: String,
    board: Board,
}

impl Position {
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fen = fen.trim();
        let board = parse_fen(fen)?;
        Ok(Self {
            fen: fen.to_string(),
            board,
        })
    }

    pub fn start() -> Self {
        Self {
            fen: START_FEN.to_string(),
            board: Board::default(),
        }
    }

    pub fn from_board(board: Board) -> Self {
        Self {
            fen: format_fen(&board),
            board,
        }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.board.side_to_move().into()
    }

    pub fn is_white_to_move(&self) -> bool {
        self.side_to_move() == PieceColor::White
    }

    pub fn fullmove_number(&self) -> u16 {
        self.board.fullmove_number()
    }

    /// The position reached after playing a UCI move, if it is legal here.
    pub fn play_uci(&self, uci: &str) -> Result<Position, crate::NotationError> {
        let mv = crate::uci::validate_uci_move(&self.board, uci)?;
        let mut board = self.board.clone();
        board.play_unchecked(mv);
        Ok(Self::from_board(board))
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.fen == other.fen
    }
}

impl Eq for Position {}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fen)
    }
}

impl std::str::FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN: {0}")]
    InvalidFormat(String),
}
