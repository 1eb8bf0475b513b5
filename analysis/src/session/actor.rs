use chess::Position;
use engine::{EngineError, EngineEvent};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::Instrument;

use super::commands::SessionCommand;
use super::events::RunEvent;
use super::state::{AnalysisRun, RunPhase, SessionState, Waiting};
use crate::cache::CacheEntry;
use crate::calibrate::run_calibration;
use crate::error::AnalysisError;

/// The main session actor loop.
/// Owns all mutable state. Processes commands and engine events sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
) {
    let fingerprint = state.engine.config_fingerprint().to_string();
    run_session_actor_inner(state, cmd_rx)
        .instrument(tracing::info_span!("analysis_session", engine = %fingerprint))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
) {
    tracing::info!("Analysis session started");

    loop {
        let wake_at = state.wake_at();
        let awaiting_engine = state.awaiting_engine();

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    shutdown(&mut state).await;
                    break;
                };
                if !handle_command(&mut state, cmd).await {
                    break;
                }
            }

            event = state.engine.next_event(), if awaiting_engine => {
                match event {
                    Some(event) => handle_engine_event(&mut state, event).await,
                    None => engine_lost(&mut state, "Engine process closed".to_string()),
                }
            }

            _ = time::sleep_until(wake_at.unwrap_or_else(Instant::now)), if wake_at.is_some() => {
                handle_wake(&mut state).await;
            }
        }
    }

    tracing::info!("Analysis session exited");
}

/// Returns false once the actor should exit.
async fn handle_command(state: &mut SessionState, cmd: SessionCommand) -> bool {
    match cmd {
        SessionCommand::Start {
            moves,
            positions,
            move_numbers,
            depth,
            reply,
        } => {
            if let Err(e) = check_can_start(state, &moves, &positions, &move_numbers) {
                tracing::debug!("Start rejected: {}", e);
                let _ = reply.send(Err(e));
                return true;
            }

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let run = AnalysisRun::new(positions, move_numbers, depth, events_tx);
            let count = run.len();
            run.emit(RunEvent::Progress(format!(
                "Starting analysis of {} positions at depth {}",
                count, depth
            )));
            tracing::info!(positions = count, depth, "Analysis run started");

            state.run = Some(run);
            state.phase = RunPhase::Running;
            let _ = reply.send(Ok(events_rx));
            process_next(state).await;
        }
        SessionCommand::Cancel { reply } => {
            let cancelled = cancel_run(state).await;
            let _ = reply.send(cancelled);
        }
        SessionCommand::Calibrate { reply } => {
            if state.phase == RunPhase::Running {
                let _ = reply.send(Err(AnalysisError::AlreadyRunning));
                return true;
            }
            if let Some(reason) = &state.engine_error {
                let _ = reply.send(Err(AnalysisError::EngineUnavailable(reason.clone())));
                return true;
            }
            let report = run_calibration(state.engine.as_mut(), &state.config.calibration).await;
            let _ = reply.send(Ok(report));
        }
        SessionCommand::GetPhase { reply } => {
            let _ = reply.send(state.phase);
        }
        SessionCommand::Shutdown => {
            shutdown(state).await;
            return false;
        }
    }
    true
}

async fn shutdown(state: &mut SessionState) {
    tracing::info!("Analysis session shutting down");
    if state.phase == RunPhase::Running {
        state.finish_run(RunPhase::Cancelled, RunEvent::Cancelled);
    }
    state.engine.terminate().await;
}

fn check_can_start(
    state: &SessionState,
    moves: &[String],
    positions: &[Position],
    move_numbers: &[u16],
) -> Result<(), AnalysisError> {
    if state.phase == RunPhase::Running {
        return Err(AnalysisError::AlreadyRunning);
    }
    if let Some(reason) = &state.engine_error {
        return Err(AnalysisError::EngineUnavailable(reason.clone()));
    }
    // One label per position, or one fewer when the final position has no move
    if move_numbers.len() != positions.len() || moves.len() > positions.len() {
        return Err(AnalysisError::MismatchedBatch {
            moves: moves.len(),
            positions: positions.len(),
            move_numbers: move_numbers.len(),
        });
    }
    Ok(())
}

/// Advance the run by one step: finish it, serve a cached result, or put the
/// engine to work on the next position.
async fn process_next(state: &mut SessionState) {
    loop {
        let Some(run) = state.run.as_mut() else {
            return;
        };

        if run.cancelled {
            tracing::info!(analysed = run.cursor, "Analysis run cancelled");
            state.finish_run(RunPhase::Cancelled, RunEvent::Cancelled);
            return;
        }

        let index = run.cursor;
        if index == run.len() {
            let results = std::mem::take(&mut run.results);
            tracing::info!(
                positions = results.len(),
                missing = results.iter().filter(|r| r.is_none()).count(),
                "Analysis run completed"
            );
            state.finish_run(RunPhase::Completed, RunEvent::Completed(results));
            return;
        }

        let position = run.positions[index].clone();

        if let Some(entry) = state
            .cache
            .lookup(&position, state.engine.config_fingerprint(), run.depth)
        {
            tracing::debug!(index, depth = entry.depth, "Serving evaluation from cache");
            let evaluation = entry.to_evaluation();
            run.results[index] = Some(evaluation.clone());
            run.emit(RunEvent::Evaluation {
                index,
                evaluation,
                from_cache: true,
            });
            run.cursor += 1;
            run.waiting = Waiting::Delay(Instant::now() + state.config.cache_hit_delay);
            return;
        }

        tracing::debug!(index, fen = %position, depth = run.depth, "Requesting analysis");
        run.emit(RunEvent::Progress(format!(
            "Analyzing {} ({}/{})",
            run.label(index),
            index + 1,
            run.len()
        )));

        let depth = run.depth;
        match state.engine.request_analysis(&position, depth).await {
            Ok(()) => {
                run.waiting = Waiting::Engine {
                    pending: engine::PendingEvaluation::new(position, depth),
                    deadline: Instant::now() + state.config.request_timeout,
                };
                return;
            }
            // Still alive, it only missed the ready handshake
            Err(EngineError::Timeout(what)) => {
                tracing::warn!(index, "Engine did not confirm {}, leaving slot empty", what);
                run.emit(RunEvent::Progress(format!(
                    "Timed out analyzing {}",
                    run.label(index)
                )));
                run.cursor += 1;
                state.engine.stop().await;
            }
            Err(e) => {
                engine_lost(state, e.to_string());
                return;
            }
        }
    }
}

async fn handle_engine_event(state: &mut SessionState, event: EngineEvent) {
    let Some(run) = state.run.as_mut() else {
        return;
    };
    let Waiting::Engine { pending, .. } = &mut run.waiting else {
        return;
    };
    let Some(result) = pending.handle(event) else {
        return;
    };

    let index = run.cursor;
    run.waiting = Waiting::Nothing;
    run.cursor += 1;

    if run.cancelled {
        tracing::debug!(index, "Discarding result of cancelled run");
    } else {
        match result {
            Some(evaluation) => {
                let position = &run.positions[index];
                let entry = CacheEntry::from_evaluation(&evaluation);
                if state
                    .cache
                    .store(position, state.engine.config_fingerprint(), entry)
                {
                    tracing::trace!(index, "Evaluation cached");
                }
                run.results[index] = Some(evaluation.clone());
                run.emit(RunEvent::Evaluation {
                    index,
                    evaluation,
                    from_cache: false,
                });
            }
            None => {
                tracing::warn!(index, "Engine finished without a score, leaving slot empty");
                run.emit(RunEvent::Progress(format!(
                    "No evaluation for {}",
                    run.label(index)
                )));
            }
        }
    }

    process_next(state).await;
}

async fn handle_wake(state: &mut SessionState) {
    let Some(run) = state.run.as_mut() else {
        return;
    };

    let now = Instant::now();
    let timed_out = match &run.waiting {
        Waiting::Delay(at) if now >= *at => false,
        Waiting::Engine { deadline, .. } if now >= *deadline => true,
        _ => return,
    };
    run.waiting = Waiting::Nothing;

    if timed_out {
        let index = run.cursor;
        tracing::warn!(index, "Analysis request timed out, leaving slot empty");
        run.emit(RunEvent::Progress(format!(
            "Timed out analyzing {}",
            run.label(index)
        )));
        run.cursor += 1;
        state.engine.stop().await;
    }

    process_next(state).await;
}

/// Returns whether a run was actually cancelled.
async fn cancel_run(state: &mut SessionState) -> bool {
    let Some(run) = state.run.as_mut() else {
        return false;
    };
    if run.cancelled {
        return true;
    }
    run.cancelled = true;
    tracing::info!(at = run.cursor, "Cancellation requested");

    // Let a stopped search report back so its bestmove is consumed
    if matches!(run.waiting, Waiting::Engine { .. }) {
        state.engine.stop().await;
    } else {
        process_next(state).await;
    }
    true
}

fn engine_lost(state: &mut SessionState, reason: String) {
    tracing::error!("Engine unavailable, aborting run: {}", reason);
    state.engine_error = Some(reason.clone());
    state.finish_run(RunPhase::Failed, RunEvent::Failed(reason));
}
