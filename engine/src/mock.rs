//! Scripted engine for tests - only compiled in test mode or with mock feature

use crate::transport::EngineTransport;
use crate::{DepthInfo, EngineError, EngineEvent, Score};
use async_trait::async_trait;
use chess::{PieceColor, Position};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Scripted answer for one position.
///
/// `centipawns` is White-relative; the mock reports it from the side to move
/// the way a real engine does.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub centipawns: i32,
    pub best_move: Option<String>,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Respond(MockResponse),
    /// Finish with `bestmove` but no scored depth report
    NoScore,
    /// Never finish the search
    Hang,
    /// Miss the `readyok` before the search starts
    NotReady,
    /// Close the event stream, as if the process died
    Crash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    RequestAnalysis { fen: String, depth: u8 },
    Stop,
    Terminate,
}

pub struct MockEngine {
    behaviors: HashMap<String, MockBehavior>,
    default_behavior: MockBehavior,
    search_delays: HashMap<u8, Duration>,
    default_delay: Duration,
    fail_requests: bool,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    queue: VecDeque<EngineEvent>,
    finish_at: Option<Instant>,
    hanging: bool,
    closed: bool,
    fingerprint: String,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            default_behavior: MockBehavior::Respond(MockResponse {
                centipawns: 0,
                best_move: None,
                pv: Vec::new(),
            }),
            search_delays: HashMap::new(),
            default_delay: Duration::from_millis(10),
            fail_requests: false,
            call_log: Arc::new(Mutex::new(Vec::new())),
            queue: VecDeque::new(),
            finish_at: None,
            hanging: false,
            closed: false,
            fingerprint: "mock;hash=16;multipv=1;threads=1".to_string(),
        }
    }

    /// Score `fen` at `centipawns` (White-relative)
    pub fn with_eval(self, fen: &str, centipawns: i32) -> Self {
        self.with_behavior(
            fen,
            MockBehavior::Respond(MockResponse {
                centipawns,
                best_move: None,
                pv: Vec::new(),
            }),
        )
    }

    pub fn with_response(self, fen: &str, response: MockResponse) -> Self {
        self.with_behavior(fen, MockBehavior::Respond(response))
    }

    pub fn with_behavior(mut self, fen: &str, behavior: MockBehavior) -> Self {
        self.behaviors.insert(fen.to_string(), behavior);
        self
    }

    pub fn with_default_behavior(mut self, behavior: MockBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Time between the search starting and `bestmove` for a given depth
    pub fn with_search_delay(mut self, depth: u8, delay: Duration) -> Self {
        self.search_delays.insert(depth, delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Make every `request_analysis` fail as if the engine were gone
    pub fn with_failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = fingerprint.to_string();
        self
    }

    /// Shared call log; stays readable after the engine moves into a session
    pub fn call_log(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.call_log)
    }

    /// Get recorded calls for verification
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    fn record(&self, call: MockCall) {
        self.call_log.lock().unwrap().push(call);
    }

    fn delay_for(&self, depth: u8) -> Duration {
        self.search_delays
            .get(&depth)
            .copied()
            .unwrap_or(self.default_delay)
    }
}

/// Count the analysis requests in a call log
pub fn request_count(calls: &[MockCall]) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, MockCall::RequestAnalysis { .. }))
        .count()
}

#[async_trait]
impl EngineTransport for MockEngine {
    fn config_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    async fn request_analysis(&mut self, position: &Position, depth: u8) -> Result<(), EngineError> {
        self.record(MockCall::RequestAnalysis {
            fen: position.fen().to_string(),
            depth,
        });
        if self.closed || self.fail_requests {
            return Err(EngineError::Closed);
        }

        // A new request discards whatever the previous search left behind
        self.queue.clear();
        self.hanging = false;
        self.finish_at = None;

        let behavior = self
            .behaviors
            .get(position.fen())
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone());

        match behavior {
            MockBehavior::NotReady => return Err(EngineError::Timeout("readyok")),
            MockBehavior::Respond(response) => {
                let mover_relative = match position.side_to_move() {
                    PieceColor::White => response.centipawns,
                    PieceColor::Black => -response.centipawns,
                };
                for d in 1..=depth {
                    self.queue.push_back(EngineEvent::DepthInfo(DepthInfo {
                        depth: d,
                        score: Score::Centipawns(mover_relative),
                        pv: response.pv.clone(),
                    }));
                }
                let best = response.best_move.or_else(|| response.pv.first().cloned());
                self.queue.push_back(EngineEvent::BestMove(best));
                self.finish_at = Some(Instant::now() + self.delay_for(depth));
            }
            MockBehavior::NoScore => {
                self.queue.push_back(EngineEvent::BestMove(None));
                self.finish_at = Some(Instant::now() + self.delay_for(depth));
            }
            MockBehavior::Hang => self.hanging = true,
            MockBehavior::Crash => self.closed = true,
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        if self.closed {
            return None;
        }
        if self.hanging || self.queue.is_empty() {
            std::future::pending::<()>().await;
        }
        if matches!(self.queue.front(), Some(EngineEvent::BestMove(_))) {
            if let Some(finish_at) = self.finish_at {
                tokio::time::sleep_until(finish_at).await;
            }
        }
        self.queue.pop_front()
    }

    async fn stop(&mut self) {
        self.record(MockCall::Stop);
        if self.hanging {
            self.hanging = false;
            self.queue.push_back(EngineEvent::BestMove(None));
        }
    }

    async fn terminate(&mut self) {
        self.record(MockCall::Terminate);
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scripted_eval_round_trip() {
        let pos = Position::start().play_uci("e2e4").unwrap();
        let mut engine = MockEngine::new().with_response(
            pos.fen(),
            MockResponse {
                centipawns: 30,
                best_move: Some("e7e5".to_string()),
                pv: vec!["e7e5".to_string(), "g1f3".to_string()],
            },
        );

        let eval = engine.analyze(&pos, 4).await.unwrap().unwrap();
        assert_eq!(eval.evaluation_centipawns, 30);
        assert_eq!(eval.depth, 4);
        assert_eq!(eval.best_move, "1... e5");
        assert_eq!(eval.principal_variation, "1... e5 2. Nf3");
        assert_eq!(eval.calculation_time_ms, 10);
        assert_eq!(
            engine.get_calls(),
            vec![MockCall::RequestAnalysis {
                fen: pos.fen().to_string(),
                depth: 4
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_hanging_search() {
        let mut engine = MockEngine::new().with_default_behavior(MockBehavior::Hang);
        engine.request_analysis(&Position::start(), 5).await.unwrap();
        let pending = tokio::time::timeout(Duration::from_secs(60), engine.next_event()).await;
        assert!(pending.is_err());

        engine.stop().await;
        assert_eq!(engine.next_event().await, Some(EngineEvent::BestMove(None)));
    }

    #[tokio::test]
    async fn test_crash_closes_stream() {
        let mut engine = MockEngine::new().with_default_behavior(MockBehavior::Crash);
        engine.request_analysis(&Position::start(), 5).await.unwrap();
        assert_eq!(engine.next_event().await, None);
        assert!(engine.request_analysis(&Position::start(), 5).await.is_err());
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let mut engine = MockEngine::new();
        engine.terminate().await;
        engine.terminate().await;
        assert_eq!(request_count(&engine.get_calls()), 0);
        assert_eq!(engine.next_event().await, None);
    }
}
