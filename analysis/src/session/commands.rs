use chess::Position;
use tokio::sync::{mpsc, oneshot};

use super::events::RunEvent;
use super::state::RunPhase;
use crate::calibrate::CalibrationReport;
use crate::error::AnalysisError;

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
pub(crate) enum SessionCommand {
    Start {
        moves: Vec<String>,
        positions: Vec<Position>,
        move_numbers: Vec<u16>,
        depth: u8,
        reply: oneshot::Sender<Result<mpsc::UnboundedReceiver<RunEvent>, AnalysisError>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    Calibrate {
        reply: oneshot::Sender<Result<CalibrationReport, AnalysisError>>,
    },
    GetPhase {
        reply: oneshot::Sender<RunPhase>,
    },
    Shutdown,
}
