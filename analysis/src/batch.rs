use chess::{NotationError, Position};
use engine::EngineEvaluation;

/// Inputs for one analysis run, parallel by index.
///
/// `positions` holds the starting position followed by the position after
/// each move, so it is one longer than `moves`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub moves: Vec<String>,
    pub positions: Vec<Position>,
    pub move_numbers: Vec<u16>,
}

impl BatchRequest {
    /// Play `moves` (UCI) from `start`, recording every position on the way.
    pub fn from_line(start: Position, moves: &[String]) -> Result<Self, NotationError> {
        let mut positions = Vec::with_capacity(moves.len() + 1);
        positions.push(start);
        for mv in moves {
            let next = positions[positions.len() - 1].play_uci(mv)?;
            positions.push(next);
        }
        let move_numbers = positions.iter().map(Position::fullmove_number).collect();

        Ok(Self {
            moves: moves.to_vec(),
            positions,
            move_numbers,
        })
    }

    /// The same batch with the latest position first, so feedback on the
    /// last move played arrives before older moves.
    ///
    /// Pair with [`reorder_results`] on the completed batch.
    pub fn most_recent_first(mut self) -> Self {
        self.moves.reverse();
        self.positions.reverse();
        self.move_numbers.reverse();
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Undo [`BatchRequest::most_recent_first`] on a completed batch, restoring
/// chronological order for classification.
pub fn reorder_results(
    mut results: Vec<Option<EngineEvaluation>>,
) -> Vec<Option<EngineEvaluation>> {
    results.reverse();
    results
}
