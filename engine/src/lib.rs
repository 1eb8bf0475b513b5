pub mod evaluation;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod normalize;
pub mod stockfish;
pub mod transport;
pub mod uci;

pub use evaluation::{EngineEvaluation, PendingEvaluation};
#[cfg(any(test, feature = "mock"))]
pub use mock::{request_count, MockBehavior, MockCall, MockEngine, MockResponse};
pub use normalize::{mate_distance, normalize_score, MATE_BASE, MAX_CENTIPAWNS};
pub use stockfish::{EngineConfig, StockfishEngine};
pub use transport::EngineTransport;
pub use uci::{UciError, UciMessage};

/// Events received from the engine while a search is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `readyok` after an `isready` probe
    Ready,
    /// Principal-line report for one search depth
    DepthInfo(DepthInfo),
    /// Search finished; `None` for `bestmove (none)` in terminal positions
    BestMove(Option<String>),
}

/// One `info depth ... score ... pv ...` report, side-to-move relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthInfo {
    pub depth: u8,
    pub score: Score,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32), // Negative for being mated
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine executable not found")]
    NotFound,

    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("UCI error: {0}")]
    Uci(#[from] UciError),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Engine process closed")]
    Closed,
}
