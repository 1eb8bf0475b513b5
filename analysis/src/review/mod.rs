//! Follow-up work on a classified batch: explanations for the moves that won
//! an AI slot, and hurdles for every move worth practising.

mod explanation;

pub use explanation::{ExplanationRequest, ExplanationService, HttpExplanationService};

use std::collections::BTreeMap;

use chess::Position;
use serde::Serialize;

use crate::classify::AnalysisItem;
use crate::persistence::{Hurdle, HurdleRepository};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    /// Explanation text keyed by batch index
    pub explanations: BTreeMap<usize, String>,
    pub hurdles_saved: usize,
    pub failures: usize,
}

/// Request explanations and save hurdles for a classified batch.
///
/// `positions[i]` is the position `items[i]` was played from. Every failure is
/// logged and counted; none stops the rest of the batch.
pub async fn review_batch(
    items: &[AnalysisItem],
    positions: &[Position],
    explainer: Option<&dyn ExplanationService>,
    hurdles: &dyn HurdleRepository,
) -> ReviewOutcome {
    let mut outcome = ReviewOutcome::default();

    for (i, (item, position)) in items.iter().zip(positions).enumerate() {
        if !item.is_ai_worthy {
            continue;
        }

        let mut explanation = None;
        if item.will_use_ai {
            if let Some(explainer) = explainer {
                let request = ExplanationRequest::new(item, position.fen());
                match explainer.explain(&request).await {
                    Ok(text) => explanation = Some(text),
                    Err(e) => {
                        outcome.failures += 1;
                        tracing::warn!(index = i, "Explanation request failed: {}", e);
                    }
                }
            }
        }

        if let Some(text) = &explanation {
            outcome.explanations.insert(i, text.clone());
        }

        let hurdle = Hurdle::from_item(item, position.fen(), explanation);
        match hurdles.save_hurdle(&hurdle) {
            Ok(_) => outcome.hurdles_saved += 1,
            Err(e) => {
                outcome.failures += 1;
                tracing::warn!(index = i, "Failed to save hurdle: {}", e);
            }
        }
    }

    tracing::info!(
        explanations = outcome.explanations.len(),
        hurdles = outcome.hurdles_saved,
        failures = outcome.failures,
        "Batch review complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::persistence::{JsonHurdleStore, PersistenceError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedExplainer {
        fail_on: Option<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExplanationService for CannedExplainer {
        async fn explain(&self, request: &ExplanationRequest) -> Result<String, PersistenceError> {
            self.seen.lock().unwrap().push(request.mv.clone());
            if self.fail_on.as_deref() == Some(request.mv.as_str()) {
                return Err(PersistenceError::Status(503));
            }
            Ok(format!("{} loses material", request.mv))
        }
    }

    fn item(mv: &str, worthy: bool, use_ai: bool) -> AnalysisItem {
        AnalysisItem {
            mv: mv.to_string(),
            move_number: 1,
            is_white_move: true,
            absolute_move_index: 0,
            pre_move_eval: Some(0),
            post_move_eval: Some(-300),
            best_move: Some("1. e4".to_string()),
            centipawn_change: Some(300),
            wpl: Some(0.25),
            classification: Classification::Blunder,
            mate_distance: None,
            is_book_move: false,
            is_ai_worthy: worthy,
            will_use_ai: use_ai,
        }
    }

    #[tokio::test]
    async fn test_explains_only_slotted_moves_and_saves_all_worthy() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHurdleStore::new(dir.path());
        let explainer = CannedExplainer {
            fail_on: None,
            seen: Mutex::new(Vec::new()),
        };
        let items = vec![
            item("a2a3", true, true),
            item("b2b3", true, false),
            item("c2c3", false, false),
        ];
        let positions = vec![Position::start(); 3];

        let outcome = review_batch(&items, &positions, Some(&explainer), &store).await;

        assert_eq!(*explainer.seen.lock().unwrap(), vec!["a2a3".to_string()]);
        assert_eq!(outcome.explanations.len(), 1);
        assert_eq!(outcome.explanations[&0], "a2a3 loses material");
        assert_eq!(outcome.hurdles_saved, 2);
        assert_eq!(store.list_hurdles().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_explanation_still_saves_hurdle() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHurdleStore::new(dir.path());
        let explainer = CannedExplainer {
            fail_on: Some("a2a3".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let items = vec![item("a2a3", true, true), item("b2b3", true, true)];
        let positions = vec![Position::start(); 2];

        let outcome = review_batch(&items, &positions, Some(&explainer), &store).await;

        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.hurdles_saved, 2);
        assert!(outcome.explanations.contains_key(&1));
        let saved = store.list_hurdles().unwrap();
        assert!(saved
            .iter()
            .any(|h| h.played_move == "a2a3" && h.ai_explanation.is_none()));
    }

    #[tokio::test]
    async fn test_without_explainer_only_hurdles() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHurdleStore::new(dir.path());
        let items = vec![item("a2a3", true, true)];
        let positions = vec![Position::start()];

        let outcome = review_batch(&items, &positions, None, &store).await;
        assert!(outcome.explanations.is_empty());
        assert_eq!(outcome.hurdles_saved, 1);
    }
}
