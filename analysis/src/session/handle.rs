use std::sync::Arc;

use chess::Position;
use tokio::sync::{mpsc, oneshot};

use super::commands::SessionCommand;
use super::events::RunEvent;
use super::state::RunPhase;
use crate::cache::EvalCache;
use crate::calibrate::CalibrationReport;
use crate::error::AnalysisError;

/// Cheap, cloneable handle to an analysis session actor.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    cache: Arc<EvalCache>,
}

impl SessionHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<SessionCommand>, cache: Arc<EvalCache>) -> Self {
        Self { cmd_tx, cache }
    }

    /// The evaluation cache this session reads and writes.
    pub fn cache(&self) -> &Arc<EvalCache> {
        &self.cache
    }

    /// Start analysing `positions` in the order given.
    ///
    /// Rejected with [`AnalysisError::AlreadyRunning`] while another run is
    /// in progress. The returned receiver yields the run's events and ends
    /// after `Completed`, `Cancelled` or `Failed`.
    pub async fn start(
        &self,
        moves: Vec<String>,
        positions: Vec<Position>,
        move_numbers: Vec<u16>,
        depth: u8,
    ) -> Result<mpsc::UnboundedReceiver<RunEvent>, AnalysisError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Start {
            moves,
            positions,
            move_numbers,
            depth,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| AnalysisError::Internal("Reply dropped".into()))?
    }

    /// Request cancellation of the current run. Returns false when nothing
    /// was running.
    pub async fn cancel(&self) -> Result<bool, AnalysisError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Cancel { reply: tx }).await?;
        rx.await
            .map_err(|_| AnalysisError::Internal("Reply dropped".into()))
    }

    pub async fn calibrate(&self) -> Result<CalibrationReport, AnalysisError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Calibrate { reply: tx }).await?;
        rx.await
            .map_err(|_| AnalysisError::Internal("Reply dropped".into()))?
    }

    pub async fn phase(&self) -> Result<RunPhase, AnalysisError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetPhase { reply: tx }).await?;
        rx.await
            .map_err(|_| AnalysisError::Internal("Reply dropped".into()))
    }

    /// Stop the actor and terminate its engine. Returns once the actor is gone.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
        self.cmd_tx.closed().await;
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), AnalysisError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| AnalysisError::Internal("Session actor closed".into()))
    }
}
