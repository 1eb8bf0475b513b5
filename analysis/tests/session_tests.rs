use std::sync::Arc;
use std::time::Duration;

use analysis::cache::{now_timestamp, CacheEntry};
use analysis::calibrate::MAX_DEPTH;
use analysis::{
    classify, drain_run, reorder_results, spawn_session, spawn_session_with_cache,
    AnalysisError, BatchRequest, Classification, ClassifyOptions, EvalCache, RunEvent, RunPhase,
    SessionConfig,
};
use chess::Position;
use engine::{request_count, EngineTransport, MockBehavior, MockCall, MockEngine};

fn line(moves: &[&str]) -> Vec<String> {
    moves.iter().map(|m| m.to_string()).collect()
}

fn italian() -> BatchRequest {
    BatchRequest::from_line(
        Position::start(),
        &line(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4"]),
    )
    .unwrap()
}

/// Scores every position in `batch` at `cps[i]`.
fn scripted(batch: &BatchRequest, cps: &[i32]) -> MockEngine {
    batch
        .positions
        .iter()
        .zip(cps)
        .fold(MockEngine::new(), |engine, (pos, cp)| {
            engine.with_eval(pos.fen(), *cp)
        })
}

async fn run_to_end(
    handle: &analysis::SessionHandle,
    batch: &BatchRequest,
    depth: u8,
) -> Vec<RunEvent> {
    let mut rx = handle
        .start(
            batch.moves.clone(),
            batch.positions.clone(),
            batch.move_numbers.clone(),
            depth,
        )
        .await
        .unwrap();
    let mut events = Vec::new();
    drain_run(&mut rx, |e| events.push(e.clone())).await;
    events
}

fn evaluation_indices(events: &[RunEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Evaluation { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

mod ordering_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn evaluations_arrive_in_supplied_order() {
        let batch = italian();
        let engine = scripted(&batch, &[20, 25, 30, 20, 15, 35]);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        let events = run_to_end(&handle, &batch, 12).await;

        assert!(matches!(&events[0], RunEvent::Progress(msg) if msg.starts_with("Starting")));
        assert_eq!(evaluation_indices(&events), vec![0, 1, 2, 3, 4, 5]);

        let Some(RunEvent::Completed(results)) = events.last() else {
            panic!("run did not complete: {:?}", events.last());
        };
        let cps: Vec<i32> = results
            .iter()
            .map(|r| r.as_ref().unwrap().evaluation_centipawns)
            .collect();
        assert_eq!(cps, vec![20, 25, 30, 20, 15, 35]);

        let requested: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                MockCall::RequestAnalysis { fen, depth } => {
                    assert_eq!(*depth, 12);
                    Some(fen.clone())
                }
                _ => None,
            })
            .collect();
        let expected: Vec<String> = batch.positions.iter().map(|p| p.fen().to_string()).collect();
        assert_eq!(requested, expected);
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn most_recent_first_restores_chronological_batch() {
        let batch = italian();
        let cps = [20, 25, 30, 20, 15, 35];
        let handle = spawn_session(scripted(&batch, &cps), SessionConfig::default());

        let reversed = batch.clone().most_recent_first();
        let events = run_to_end(&handle, &reversed, 10).await;

        let Some(RunEvent::Evaluation { evaluation, .. }) = events
            .iter()
            .find(|e| matches!(e, RunEvent::Evaluation { .. }))
        else {
            panic!("no evaluation reported");
        };
        assert_eq!(evaluation.evaluation_centipawns, 35);

        let Some(RunEvent::Completed(results)) = events.last().cloned() else {
            panic!("run did not complete");
        };
        let restored: Vec<i32> = reorder_results(results)
            .iter()
            .map(|r| r.as_ref().unwrap().evaluation_centipawns)
            .collect();
        assert_eq!(restored, cps.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_completes_immediately() {
        let handle = spawn_session(MockEngine::new(), SessionConfig::default());
        let mut rx = handle.start(vec![], vec![], vec![], 12).await.unwrap();

        let last = drain_run(&mut rx, |_| {}).await;
        assert_eq!(last, Some(RunEvent::Completed(vec![])));
    }
}

mod cache_tests {
    use super::*;

    fn deep_entry(centipawns: i32, depth: u8) -> CacheEntry {
        CacheEntry {
            centipawns,
            depth,
            best_move: "1. e4".to_string(),
            principal_variation: "1. e4 e5".to_string(),
            timestamp: now_timestamp(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_never_requests_analysis() {
        let batch = BatchRequest::from_line(Position::start(), &line(&["d2d4"])).unwrap();
        let engine = MockEngine::new();
        let fingerprint = engine.config_fingerprint().to_string();
        let calls = engine.call_log();

        let cache = Arc::new(EvalCache::default());
        for pos in &batch.positions {
            assert!(cache.store(pos, &fingerprint, deep_entry(40, 100)));
        }
        let handle = spawn_session_with_cache(engine, Arc::clone(&cache), SessionConfig::default());

        let events = run_to_end(&handle, &batch, 20).await;

        assert_eq!(request_count(&calls.lock().unwrap()), 0);
        for event in &events {
            if let RunEvent::Evaluation {
                evaluation,
                from_cache,
                ..
            } = event
            {
                assert!(*from_cache);
                assert_eq!(evaluation.calculation_time_ms, 0);
                assert_eq!(evaluation.depth, 100);
            }
        }
        assert!(matches!(events.last(), Some(RunEvent::Completed(r)) if r.len() == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn shallower_entry_is_not_honoured() {
        let batch = BatchRequest::from_line(Position::start(), &line(&["d2d4"])).unwrap();
        let engine = scripted(&batch, &[15, 10]);
        let fingerprint = engine.config_fingerprint().to_string();
        let calls = engine.call_log();

        let cache = Arc::new(EvalCache::default());
        cache.store(&batch.positions[0], &fingerprint, deep_entry(99, 6));
        let handle = spawn_session_with_cache(engine, Arc::clone(&cache), SessionConfig::default());

        let events = run_to_end(&handle, &batch, 12).await;

        assert_eq!(request_count(&calls.lock().unwrap()), 2);
        assert!(events
            .iter()
            .all(|e| !matches!(e, RunEvent::Evaluation { from_cache: true, .. })));
        // The fresh, deeper result replaced the shallow one
        let refreshed = cache.lookup(&batch.positions[0], &fingerprint, 12).unwrap();
        assert_eq!(refreshed.centipawns, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_is_served_from_cache() {
        let batch = italian();
        let engine = scripted(&batch, &[20, 25, 30, 20, 15, 35]);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        run_to_end(&handle, &batch, 12).await;
        assert_eq!(request_count(&calls.lock().unwrap()), 6);
        assert_eq!(handle.cache().len(), 6);

        let events = run_to_end(&handle, &batch, 12).await;
        assert_eq!(request_count(&calls.lock().unwrap()), 6);
        assert_eq!(evaluation_indices(&events), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn positions_past_opening_window_are_not_cached() {
        let late = Position::from_fen(
            "r1bq1rk1/pp2bppp/2n1pn2/3p4/2PP4/2N2N2/PP2BPPP/R2QKB1R w KQ - 4 30",
        )
        .unwrap();
        let engine = MockEngine::new().with_eval(late.fen(), 50);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        let batch = BatchRequest {
            moves: vec![],
            positions: vec![late.clone()],
            move_numbers: vec![30],
        };
        run_to_end(&handle, &batch, 12).await;
        run_to_end(&handle, &batch, 12).await;

        assert_eq!(request_count(&calls.lock().unwrap()), 2);
        assert!(handle.cache().is_empty());
    }
}

mod cancellation_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn no_evaluation_after_cancel() {
        let batch = italian();
        let handle = spawn_session(
            scripted(&batch, &[20, 25, 30, 20, 15, 35]),
            SessionConfig::default(),
        );
        let mut rx = handle
            .start(
                batch.moves.clone(),
                batch.positions.clone(),
                batch.move_numbers.clone(),
                12,
            )
            .await
            .unwrap();

        let k = 1;
        while let Some(event) = rx.recv().await {
            if matches!(event, RunEvent::Evaluation { index, .. } if index == k) {
                break;
            }
        }
        assert!(handle.cancel().await.unwrap());

        let mut after = Vec::new();
        let last = drain_run(&mut rx, |e| after.push(e.clone())).await;

        assert_eq!(last, Some(RunEvent::Cancelled));
        assert!(evaluation_indices(&after).is_empty());
        assert!(!after.iter().any(|e| matches!(e, RunEvent::Completed(_))));
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_hanging_search() {
        let engine = MockEngine::new().with_default_behavior(MockBehavior::Hang);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        let mut rx = handle
            .start(vec![], vec![Position::start()], vec![1], 18)
            .await
            .unwrap();
        assert!(handle.cancel().await.unwrap());

        let last = drain_run(&mut rx, |_| {}).await;
        assert_eq!(last, Some(RunEvent::Cancelled));
        assert!(calls.lock().unwrap().contains(&MockCall::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_when_idle_is_a_no_op() {
        let handle = spawn_session(MockEngine::new(), SessionConfig::default());
        assert!(!handle.cancel().await.unwrap());
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Idle);
    }
}

mod reentrancy_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_rejected() {
        let engine = MockEngine::new().with_default_behavior(MockBehavior::Hang);
        let handle = spawn_session(engine, SessionConfig::default());

        let mut first = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await
            .unwrap();

        let second = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await;
        assert!(matches!(second, Err(AnalysisError::AlreadyRunning)));
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Running);

        handle.cancel().await.unwrap();
        assert_eq!(drain_run(&mut first, |_| {}).await, Some(RunEvent::Cancelled));

        // A finished run frees the session
        let third = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await;
        assert!(third.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn calibrate_while_running_is_rejected() {
        let engine = MockEngine::new().with_default_behavior(MockBehavior::Hang);
        let handle = spawn_session(engine, SessionConfig::default());
        let _rx = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await
            .unwrap();

        assert!(matches!(
            handle.calibrate().await,
            Err(AnalysisError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn mismatched_batch_is_rejected() {
        let handle = spawn_session(MockEngine::new(), SessionConfig::default());
        let result = handle
            .start(
                line(&["e2e4", "e7e5"]),
                vec![Position::start()],
                vec![1],
                12,
            )
            .await;
        assert!(matches!(
            result,
            Err(AnalysisError::MismatchedBatch { moves: 2, .. })
        ));
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Idle);
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timed_out_request_leaves_empty_slot() {
        let batch = BatchRequest::from_line(Position::start(), &line(&["c2c4", "g8f6"])).unwrap();
        let engine = scripted(&batch, &[10, 5, 20])
            .with_behavior(batch.positions[1].fen(), MockBehavior::Hang);
        let calls = engine.call_log();
        let config = SessionConfig {
            request_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        };
        let handle = spawn_session(engine, config);

        let events = run_to_end(&handle, &batch, 12).await;

        let Some(RunEvent::Completed(results)) = events.last() else {
            panic!("run did not complete: {:?}", events.last());
        };
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_some());
        assert_eq!(evaluation_indices(&events), vec![0, 2]);
        assert!(events
            .iter()
            .any(|e| matches!(e, RunEvent::Progress(msg) if msg.starts_with("Timed out"))));
        assert_eq!(request_count(&calls.lock().unwrap()), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missed_readyok_skips_position_only() {
        let batch = BatchRequest::from_line(Position::start(), &line(&["e2e4"])).unwrap();
        let engine = scripted(&batch, &[20, 30])
            .with_behavior(batch.positions[0].fen(), MockBehavior::NotReady);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        let events = run_to_end(&handle, &batch, 12).await;

        let Some(RunEvent::Completed(results)) = events.last() else {
            panic!("run did not complete: {:?}", events.last());
        };
        assert!(results[0].is_none());
        assert_eq!(results[1].as_ref().unwrap().evaluation_centipawns, 30);
        assert!(events
            .iter()
            .any(|e| matches!(e, RunEvent::Progress(msg) if msg == "Timed out analyzing move 1")));
        assert!(calls.lock().unwrap().contains(&MockCall::Stop));
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Completed);

        // The engine is still usable afterwards
        let again = run_to_end(&handle, &batch, 12).await;
        assert!(matches!(again.last(), Some(RunEvent::Completed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn scoreless_search_leaves_empty_slot() {
        let batch = BatchRequest::from_line(Position::start(), &line(&["g1f3"])).unwrap();
        let engine = scripted(&batch, &[10, 12])
            .with_behavior(batch.positions[0].fen(), MockBehavior::NoScore);
        let handle = spawn_session(engine, SessionConfig::default());

        let events = run_to_end(&handle, &batch, 12).await;
        let Some(RunEvent::Completed(results)) = events.last() else {
            panic!("run did not complete");
        };
        assert_eq!(results.len(), 2);
        assert!(results[0].is_none());
        assert_eq!(results[1].as_ref().unwrap().evaluation_centipawns, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_crash_fails_run_once() {
        let batch = italian();
        let engine = scripted(&batch, &[20, 25, 30, 20, 15, 35])
            .with_behavior(batch.positions[2].fen(), MockBehavior::Crash);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        let events = run_to_end(&handle, &batch, 12).await;

        assert_eq!(evaluation_indices(&events), vec![0, 1]);
        assert!(matches!(events.last(), Some(RunEvent::Failed(_))));
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Failed);

        // No retry: later runs are refused without touching the engine
        let again = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await;
        assert!(matches!(again, Err(AnalysisError::EngineUnavailable(_))));
        assert_eq!(request_count(&calls.lock().unwrap()), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_fails_run() {
        let handle = spawn_session(
            MockEngine::new().with_failing_requests(),
            SessionConfig::default(),
        );
        let mut rx = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await
            .unwrap();

        let last = drain_run(&mut rx, |_| {}).await;
        assert!(matches!(last, Some(RunEvent::Failed(_))));
    }
}

mod pipeline_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn calibrate_through_session() {
        let handle = spawn_session(MockEngine::new(), SessionConfig::default());

        let first = handle.calibrate().await.unwrap();
        let second = handle.calibrate().await.unwrap();

        assert_eq!(first.recommended_depth, MAX_DEPTH);
        assert_eq!(first.recommended_depth, second.recommended_depth);
        assert_eq!(handle.phase().await.unwrap(), RunPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn analysed_batch_classifies() {
        let batch = BatchRequest::from_line(Position::start(), &line(&["e2e4", "e7e5", "d1h5"]))
            .unwrap();
        // White's queen sortie drops 150 centipawns; Black's reply is fine
        let engine = scripted(&batch, &[20, 30, 25, -125]);
        let handle = spawn_session(engine, SessionConfig::default());

        let events = run_to_end(&handle, &batch, 12).await;
        let Some(RunEvent::Completed(results)) = events.last() else {
            panic!("run did not complete");
        };

        let items = classify(&batch.moves, results, &ClassifyOptions::default());

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].centipawn_change, Some(0));
        assert_eq!(items[1].centipawn_change, Some(0));
        assert_eq!(items[1].classification, Classification::None);
        assert!(!items[1].is_white_move);
        assert_eq!(items[2].centipawn_change, Some(150));
        assert_ne!(items[2].classification, Classification::None);
        assert!(items[2].is_ai_worthy);
        assert!(items[2].will_use_ai);
        assert_eq!(items[2].move_number, 2);
    }

    #[tokio::test]
    async fn shutdown_terminates_engine() {
        let engine = MockEngine::new();
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());

        handle.shutdown().await;

        assert!(calls.lock().unwrap().contains(&MockCall::Terminate));
        assert!(matches!(
            handle.phase().await,
            Err(AnalysisError::Internal(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_run_reports_cancelled() {
        let engine = MockEngine::new().with_default_behavior(MockBehavior::Hang);
        let calls = engine.call_log();
        let handle = spawn_session(engine, SessionConfig::default());
        let mut rx = handle
            .start(vec![], vec![Position::start()], vec![1], 12)
            .await
            .unwrap();

        handle.shutdown().await;

        let last = drain_run(&mut rx, |_| {}).await;
        assert!(matches!(last, Some(RunEvent::Cancelled)));
        assert!(calls.lock().unwrap().contains(&MockCall::Terminate));
    }
}
