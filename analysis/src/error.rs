/// Errors surfaced by the analysis session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    #[error("An analysis run is already in progress")]
    AlreadyRunning,
    #[error("Mismatched batch: {moves} moves, {positions} positions, {move_numbers} move numbers")]
    MismatchedBatch {
        moves: usize,
        positions: usize,
        move_numbers: usize,
    },
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Opening-book lookup failures. Callers treat all of them as "not book".
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Book service returned status {0}")]
    Status(u16),
}
