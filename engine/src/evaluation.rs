use chess::{numbered_line, numbered_move, Position};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::normalize::normalize_score;
use crate::{DepthInfo, EngineEvent};

/// Result of analysing one position to a target depth.
///
/// `evaluation_centipawns` is always White-relative. Best move and PV are
/// rendered in move-numbered notation, or raw engine text when they do not
/// fit the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvaluation {
    pub evaluation_centipawns: i32,
    pub best_move: String,
    pub principal_variation: String,
    pub depth: u8,
    pub calculation_time_ms: u64,
}

/// Collects engine events for one request until `bestmove` arrives.
///
/// The first report at or above the requested depth is the evaluation.
/// When the engine stops early the deepest report seen stands in.
#[derive(Debug)]
pub struct PendingEvaluation {
    position: Position,
    requested_depth: u8,
    started: Instant,
    chosen: Option<DepthInfo>,
    deepest: Option<DepthInfo>,
}

impl PendingEvaluation {
    /// Start collecting; the clock runs from now, which callers take to be
    /// the moment the engine reported ready.
    pub fn new(position: Position, requested_depth: u8) -> Self {
        Self {
            position,
            requested_depth,
            started: Instant::now(),
            chosen: None,
            deepest: None,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn requested_depth(&self) -> u8 {
        self.requested_depth
    }

    pub fn observe(&mut self, info: DepthInfo) {
        if self.chosen.is_some() {
            return;
        }
        if info.depth >= self.requested_depth {
            self.chosen = Some(info);
            return;
        }
        if self
            .deepest
            .as_ref()
            .map_or(true, |deepest| info.depth >= deepest.depth)
        {
            self.deepest = Some(info);
        }
    }

    /// Feed one engine event. Returns `Some` once the search is complete;
    /// the inner `None` means the engine finished without a usable score.
    pub fn handle(&mut self, event: EngineEvent) -> Option<Option<EngineEvaluation>> {
        match event {
            EngineEvent::DepthInfo(info) => {
                self.observe(info);
                None
            }
            EngineEvent::BestMove(best) => Some(self.finish(best)),
            EngineEvent::Ready => None,
        }
    }

    pub fn finish(&mut self, best_move: Option<String>) -> Option<EngineEvaluation> {
        let elapsed = self.started.elapsed();
        let info = self.chosen.take().or_else(|| self.deepest.take())?;

        let evaluation_centipawns = normalize_score(info.score, self.position.side_to_move());

        let best_uci = best_move.or_else(|| info.pv.first().cloned());
        let best_move = match best_uci {
            Some(uci) => numbered_move(&self.position, &uci).into_text(),
            None => String::new(),
        };
        let principal_variation = numbered_line(&self.position, &info.pv).into_text();

        Some(EngineEvaluation {
            evaluation_centipawns,
            best_move,
            principal_variation,
            depth: info.depth,
            calculation_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Score;

    fn info(depth: u8, cp: i32, pv: &[&str]) -> DepthInfo {
        DepthInfo {
            depth,
            score: Score::Centipawns(cp),
            pv: pv.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_first_report_at_depth_wins() {
        let mut pending = PendingEvaluation::new(Position::start(), 10);
        assert!(pending.handle(EngineEvent::DepthInfo(info(9, 5, &["d2d4"]))).is_none());
        assert!(pending.handle(EngineEvent::DepthInfo(info(10, 30, &["e2e4"]))).is_none());
        assert!(pending.handle(EngineEvent::DepthInfo(info(11, 45, &["g1f3"]))).is_none());

        let eval = pending
            .handle(EngineEvent::BestMove(Some("g1f3".to_string())))
            .unwrap()
            .unwrap();
        assert_eq!(eval.evaluation_centipawns, 30);
        assert_eq!(eval.depth, 10);
        assert_eq!(eval.principal_variation, "1. e4");
        assert_eq!(eval.best_move, "1. Nf3");
    }

    #[test]
    fn test_early_stop_uses_deepest_report() {
        let mut pending = PendingEvaluation::new(Position::start(), 20);
        pending.observe(info(3, 10, &["e2e4"]));
        pending.observe(info(7, 25, &["d2d4", "d7d5"]));
        let eval = pending.finish(Some("d2d4".to_string())).unwrap();
        assert_eq!(eval.depth, 7);
        assert_eq!(eval.evaluation_centipawns, 25);
        assert_eq!(eval.principal_variation, "1. d4 d5");
    }

    #[test]
    fn test_no_reports_yields_nothing() {
        let mut pending = PendingEvaluation::new(Position::start(), 12);
        assert_eq!(pending.handle(EngineEvent::BestMove(None)), Some(None));
    }

    #[test]
    fn test_black_to_move_is_flipped() {
        let pos = Position::start().play_uci("e2e4").unwrap();
        let mut pending = PendingEvaluation::new(pos, 5);
        pending.observe(info(5, 40, &["e7e5"]));
        let eval = pending.finish(Some("e7e5".to_string())).unwrap();
        assert_eq!(eval.evaluation_centipawns, -40);
        assert_eq!(eval.best_move, "1... e5");
    }

    #[test]
    fn test_mismatched_pv_falls_back_to_raw() {
        let mut pending = PendingEvaluation::new(Position::start(), 1);
        pending.observe(info(1, 0, &["e7e5", "e2e4"]));
        let eval = pending.finish(Some("e7e5".to_string())).unwrap();
        assert_eq!(eval.principal_variation, "e7e5 e2e4");
        assert_eq!(eval.best_move, "e7e5");
    }

    #[test]
    fn test_best_move_defaults_to_pv_head() {
        let mut pending = PendingEvaluation::new(Position::start(), 1);
        pending.observe(info(1, 0, &["c2c4"]));
        let eval = pending.finish(None).unwrap();
        assert_eq!(eval.best_move, "1. c4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_calculation_time_is_measured() {
        let mut pending = PendingEvaluation::new(Position::start(), 1);
        pending.observe(info(1, 0, &["e2e4"]));
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        let eval = pending.finish(Some("e2e4".to_string())).unwrap();
        assert_eq!(eval.calculation_time_ms, 250);
    }
}
