use std::sync::Arc;
use std::time::Duration;

use chess::Position;
use engine::{EngineEvaluation, EngineTransport, PendingEvaluation};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::events::RunEvent;
use crate::cache::EvalCache;
use crate::calibrate::CalibrationConfig;
use crate::config::DEFAULT_CACHE_OPENING_WINDOW;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cache_opening_window: u16,
    /// Pause after a cache-served result before the next position
    pub cache_hit_delay: Duration,
    /// Upper bound on one engine round-trip
    pub request_timeout: Duration,
    pub calibration: CalibrationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_opening_window: DEFAULT_CACHE_OPENING_WINDOW,
            cache_hit_delay: Duration::from_millis(10),
            request_timeout: Duration::from_secs(30),
            calibration: CalibrationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
    /// Aborted because the engine became unavailable
    Failed,
}

/// What the current run is blocked on.
pub(crate) enum Waiting {
    /// Between steps; only seen transiently inside the actor
    Nothing,
    /// Pause after a cache hit
    Delay(Instant),
    Engine {
        pending: PendingEvaluation,
        deadline: Instant,
    },
}

/// One batch being analysed. Owned by the actor; nothing else touches it.
pub(crate) struct AnalysisRun {
    pub positions: Vec<Position>,
    pub move_numbers: Vec<u16>,
    pub depth: u8,
    pub results: Vec<Option<EngineEvaluation>>,
    pub cursor: usize,
    pub cancelled: bool,
    pub waiting: Waiting,
    events: mpsc::UnboundedSender<RunEvent>,
}

impl AnalysisRun {
    pub fn new(
        positions: Vec<Position>,
        move_numbers: Vec<u16>,
        depth: u8,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> Self {
        let results = vec![None; positions.len()];
        Self {
            positions,
            move_numbers,
            depth,
            results,
            cursor: 0,
            cancelled: false,
            waiting: Waiting::Nothing,
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Report to the caller. A caller that stopped listening is not an error.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    /// Label for progress messages, e.g. `move 12` or `move 12...` when
    /// Black is to move.
    pub fn label(&self, index: usize) -> String {
        let number = self.move_numbers.get(index).copied().unwrap_or_default();
        let black = self
            .positions
            .get(index)
            .is_some_and(|p| !p.is_white_to_move());
        format!("move {}{}", number, if black { "..." } else { "" })
    }
}

/// Internal mutable state, owned entirely by the session actor. No locks
/// except inside the shared cache.
pub(crate) struct SessionState {
    pub engine: Box<dyn EngineTransport>,
    pub cache: Arc<EvalCache>,
    pub config: SessionConfig,
    pub phase: RunPhase,
    pub run: Option<AnalysisRun>,
    /// Set once the engine is gone; later runs are refused
    pub engine_error: Option<String>,
}

impl SessionState {
    pub fn new(engine: Box<dyn EngineTransport>, cache: Arc<EvalCache>, config: SessionConfig) -> Self {
        Self {
            engine,
            cache,
            config,
            phase: RunPhase::Idle,
            run: None,
            engine_error: None,
        }
    }

    pub fn awaiting_engine(&self) -> bool {
        matches!(
            self.run.as_ref().map(|r| &r.waiting),
            Some(Waiting::Engine { .. })
        )
    }

    /// When the actor must wake up without an outside event.
    pub fn wake_at(&self) -> Option<Instant> {
        match self.run.as_ref().map(|r| &r.waiting) {
            Some(Waiting::Delay(at)) => Some(*at),
            Some(Waiting::Engine { deadline, .. }) => Some(*deadline),
            _ => None,
        }
    }

    /// End the current run with `phase`, reporting `event` as its last word.
    pub fn finish_run(&mut self, phase: RunPhase, event: RunEvent) {
        if let Some(run) = self.run.take() {
            run.emit(event);
        }
        self.phase = phase;
    }
}
