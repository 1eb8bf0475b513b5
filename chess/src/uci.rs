//! UCI (Universal Chess Interface) move utilities

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::notation::NotationError;
use crate::types::PieceKind;

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, NotationError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(NotationError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2]).ok_or_else(|| NotationError::InvalidMove(s.to_string()))?;
    let to = parse_square(&s[2..4]).ok_or_else(|| NotationError::InvalidMove(s.to_string()))?;

    let promotion = if s.len() == 5 {
        Some(match &s[4..5] {
            "q" => Piece::Queen,
            "r" => Piece::Rook,
            "b" => Piece::Bishop,
            "n" => Piece::Knight,
            _ => return Err(NotationError::InvalidMove(s.to_string())),
        })
    } else {
        None
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = match chars.next()? {
        'a' => File::A,
        'b' => File::B,
        'c' => File::C,
        'd' => File::D,
        'e' => File::E,
        'f' => File::F,
        'g' => File::G,
        'h' => File::H,
        _ => return None,
    };
    let rank = match chars.next()? {
        '1' => Rank::First,
        '2' => Rank::Second,
        '3' => Rank::Third,
        '4' => Rank::Fourth,
        '5' => Rank::Fifth,
        '6' => Rank::Sixth,
        '7' => Rank::Seventh,
        '8' => Rank::Eighth,
        _ => return None,
    };
    Some(Square::new(file, rank))
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(PieceKind::from(promo).uci_letter());
    }
    s
}

pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_char(sq.file()), rank_char(sq.rank()))
}

pub(crate) fn file_char(file: File) -> char {
    match file {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    }
}

pub(crate) fn rank_char(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let rook_file = if mv.to.file() == File::G {
            File::H
        } else {
            File::A
        };
        let converted = Move {
            from: mv.from,
            to: Square::new(rook_file, mv.from.rank()),
            promotion: None,
        };

        // Only a real castle if the king-to-rook form is legal here
        if legal_moves.contains(&converted) && !legal_moves.contains(&mv) {
            return converted;
        }
    }

    mv
}

/// All legal moves in a position.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|piece_moves| {
        moves.extend(piece_moves);
        false
    });
    moves
}

/// Parse a UCI move string and check it is legal on `board`.
pub fn validate_uci_move(board: &Board, uci: &str) -> Result<Move, NotationError> {
    let mv = parse_uci_move(uci)?;
    let legal = legal_moves(board);
    let mv = convert_uci_castling_to_cozy(mv, &legal);
    if legal.contains(&mv) {
        Ok(mv)
    } else {
        Err(NotationError::IllegalMove(uci.to_string()))
    }
}
