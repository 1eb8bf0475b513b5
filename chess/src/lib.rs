pub mod fen;
pub mod notation;
pub mod san;
pub mod types;
pub mod uci;

pub use fen::{format_fen, parse_fen, FenError, Position, START_FEN};
pub use notation::{numbered_line, numbered_move, MoveNotation, NotationError};
pub use san::format_san;
pub use types::{PieceColor, PieceKind};
pub use uci::{format_uci_move, legal_moves, parse_uci_move, validate_uci_move};
