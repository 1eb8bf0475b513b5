//! Per-device search depth calibration.
//!
//! Probes the engine at depth 1, 2, 3, ... on a fixed position and keeps the
//! deepest search that still finishes within the target latency.

use std::time::Duration;

use chess::Position;
use engine::EngineTransport;
use serde::Serialize;

/// Middlegame position used for every probe.
pub const BENCHMARK_FEN: &str =
    "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

pub const MIN_DEPTH: u8 = 10;
pub const MAX_DEPTH: u8 = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationConfig {
    /// Wall-clock budget for one search
    pub target: Duration,
    pub min_depth: u8,
    pub max_depth: u8,
    pub probe_timeout: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target: Duration::from_millis(500),
            min_depth: MIN_DEPTH,
            max_depth: MAX_DEPTH,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Completed { elapsed_ms: u64 },
    TimedOut,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub depth: u8,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalibrationReport {
    pub recommended_depth: u8,
    /// Deepest probe that stayed within the target, before clamping
    pub fastest_within_target: Option<u8>,
    pub probes: Vec<ProbeResult>,
}

/// Run calibration probes one after another on `engine`.
///
/// Never fails: timed-out or failed probes are recorded and skipped, and the
/// result is always within `[min_depth, max_depth]`.
#[tracing::instrument(level = "info", skip_all)]
pub async fn run_calibration<E>(engine: &mut E, config: &CalibrationConfig) -> CalibrationReport
where
    E: EngineTransport + ?Sized,
{
    let min_depth = config.min_depth.min(config.max_depth);
    let max_depth = config.max_depth;
    let mut probes = Vec::new();
    let mut within_target = None;

    let benchmark = match Position::from_fen(BENCHMARK_FEN) {
        Ok(pos) => pos,
        Err(e) => {
            tracing::error!("Benchmark position rejected: {}", e);
            return CalibrationReport {
                recommended_depth: min_depth,
                fastest_within_target: None,
                probes,
            };
        }
    };

    for depth in 1..=max_depth {
        let outcome =
            match tokio::time::timeout(config.probe_timeout, engine.analyze(&benchmark, depth))
                .await
            {
                Ok(Ok(Some(eval))) => ProbeOutcome::Completed {
                    elapsed_ms: eval.calculation_time_ms,
                },
                Ok(Ok(None)) => ProbeOutcome::Failed {
                    reason: "no score reported".to_string(),
                },
                Ok(Err(e)) => ProbeOutcome::Failed {
                    reason: e.to_string(),
                },
                Err(_) => {
                    engine.stop().await;
                    ProbeOutcome::TimedOut
                }
            };

        let over_target = match &outcome {
            ProbeOutcome::Completed { elapsed_ms } => {
                let over = Duration::from_millis(*elapsed_ms) > config.target;
                tracing::debug!(depth, elapsed_ms, over, "Calibration probe finished");
                if !over {
                    within_target = Some(depth);
                }
                over
            }
            ProbeOutcome::TimedOut => {
                tracing::warn!(depth, "Calibration probe timed out, skipping");
                false
            }
            ProbeOutcome::Failed { reason } => {
                tracing::warn!(depth, %reason, "Calibration probe failed, skipping");
                false
            }
        };

        probes.push(ProbeResult { depth, outcome });

        // Deeper searches never get faster
        if over_target {
            break;
        }
    }

    let recommended_depth = within_target
        .unwrap_or(min_depth)
        .clamp(min_depth, max_depth);
    tracing::info!(
        recommended_depth,
        probes = probes.len(),
        "Calibration complete"
    );

    CalibrationReport {
        recommended_depth,
        fastest_within_target: within_target,
        probes,
    }
}
