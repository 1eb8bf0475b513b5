use cozy_chess::{Board, GameStatus, Move, Piece};

use crate::types::PieceKind;
use crate::uci::{file_char, format_square, legal_moves, rank_char};

/// Format a legal move as Standard Algebraic Notation.
///
/// `mv` must be legal on `board` and use cozy-chess castling (king takes own rook).
pub fn format_san(board: &Board, mv: Move) -> String {
    let piece = match board.piece_on(mv.from) {
        Some(p) => p,
        None => return crate::uci::format_uci_move(mv),
    };

    let mut san = String::new();

    let castles = piece == Piece::King && board.color_on(mv.to) == Some(board.side_to_move());
    if castles {
        if mv.to.file() as u8 > mv.from.file() as u8 {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let is_capture = board.piece_on(mv.to).is_some()
            || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        match PieceKind::from(piece).san_letter() {
            Some(letter) => {
                san.push(letter);
                san.push_str(&disambiguation(board, mv, piece));
            }
            None => {
                if is_capture {
                    san.push(file_char(mv.from.file()));
                }
            }
        }

        if is_capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            if let Some(letter) = PieceKind::from(promo).san_letter() {
                san.push(letter);
            }
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.status() == GameStatus::Won {
        san.push('#');
    } else if !after.checkers().is_empty() {
        san.push('+');
    }

    san
}

/// File, rank or full square needed to tell `mv` apart from sibling moves.
fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let rivals: Vec<Move> = legal_moves(board)
        .into_iter()
        .filter(|m| m.to == mv.to && m.from != mv.from && board.piece_on(m.from) == Some(piece))
        .collect();

    if rivals.is_empty() {
        return String::new();
    }

    let shares_file = rivals.iter().any(|m| m.from.file() == mv.from.file());
    let shares_rank = rivals.iter().any(|m| m.from.rank() == mv.from.rank());

    if !shares_file {
        file_char(mv.from.file()).to_string()
    } else if !shares_rank {
        rank_char(mv.from.rank()).to_string()
    } else {
        format_square(mv.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::parse_fen;
    use crate::uci::validate_uci_move;

    fn san(fen: &str, uci: &str) -> String {
        let board = parse_fen(fen).unwrap();
        let mv = validate_uci_move(&board, uci).unwrap();
        format_san(&board, mv)
    }

    const START_FEN: &str = crate::fen::START_FEN;

    #[test]
    fn test_pawn_push() {
        assert_eq!(san(START_FEN, "e2e4"), "e4");
    }

    #[test]
    fn test_knight() {
        assert_eq!(san(START_FEN, "g1f3"), "Nf3");
    }

    #[test]
    fn test_pawn_capture() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        assert_eq!(san(fen, "e4d5"), "exd5");
    }

    #[test]
    fn test_en_passant_capture() {
        let fen = "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        assert_eq!(san(fen, "e5f6"), "exf6");
    }

    #[test]
    fn test_castling_both_sides() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        assert_eq!(san(fen, "e1g1"), "O-O");
        assert_eq!(san(fen, "e1c1"), "O-O-O");
    }

    #[test]
    fn test_promotion() {
        assert_eq!(san("8/P7/8/8/8/8/8/4K2k w - - 0 1", "a7a8q"), "a8=Q+");
        assert_eq!(san("8/P7/8/8/8/8/8/4K2k w - - 0 1", "a7a8n"), "a8=N");
    }

    #[test]
    fn test_file_disambiguation() {
        // Knights on b1 and f3 can both reach d2
        let fen = "4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1";
        assert_eq!(san(fen, "b1d2"), "Nbd2");
        assert_eq!(san(fen, "f3d2"), "Nfd2");
    }

    #[test]
    fn test_rank_disambiguation() {
        // Rooks on a1 and a5 can both reach a3
        let fen = "4k3/8/8/R7/8/8/8/R3K3 w - - 0 1";
        assert_eq!(san(fen, "a1a3"), "R1a3");
    }

    #[test]
    fn test_check_and_mate_suffixes() {
        // Scholar's mate
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
        assert_eq!(san(fen, "f3f7"), "Qxf7#");
        assert_eq!(san("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", "a1a8"), "Ra8+");
    }
}
