pub mod batch;
pub mod book;
pub mod cache;
pub mod calibrate;
pub mod classify;
pub mod config;
pub mod error;
pub mod persistence;
pub mod review;
pub mod session;
pub mod win_probability;

pub use batch::{reorder_results, BatchRequest};
pub use book::{book_move_indices, BookMove, ExplorerClient, OpeningBook};
pub use cache::{CacheEntry, EvalCache};
pub use calibrate::{run_calibration, CalibrationConfig, CalibrationReport, ProbeOutcome};
pub use classify::{classify, AnalysisItem, Classification, ClassifyOptions};
pub use config::PipelineConfig;
pub use error::{AnalysisError, BookError};
pub use persistence::{Hurdle, HurdleRepository, JsonHurdleStore, PersistenceError};
pub use review::{review_batch, ExplanationService, HttpExplanationService, ReviewOutcome};
pub use session::{
    drain_run, spawn_session, spawn_session_with_cache, RunEvent, RunPhase, SessionConfig,
    SessionHandle,
};
pub use win_probability::{win_probability, win_probability_loss};
