//! Turns a chronological evaluation batch into per-move feedback.
//!
//! `evaluations[i]` scores the position before `moves[i]` and
//! `evaluations[i + 1]` the position after it. All scores are White-relative;
//! losses are measured from the mover's side.

use std::collections::HashSet;

use engine::{mate_distance, EngineEvaluation};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_AI_WORTHY_THRESHOLD, DEFAULT_MAX_AI_SLOTS};
use crate::win_probability::win_probability_loss;

/// Win-probability loss at which each tier starts.
pub const INACCURACY_THRESHOLD: f64 = 0.05;
pub const MISTAKE_THRESHOLD: f64 = 0.10;
pub const BLUNDER_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    None,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Classification {
    pub fn from_wpl(wpl: f64) -> Self {
        if wpl >= BLUNDER_THRESHOLD {
            Self::Blunder
        } else if wpl >= MISTAKE_THRESHOLD {
            Self::Mistake
        } else if wpl >= INACCURACY_THRESHOLD {
            Self::Inaccuracy
        } else {
            Self::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Inaccuracy => "inaccuracy",
            Self::Mistake => "mistake",
            Self::Blunder => "blunder",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback for one move. Numeric fields are `None` when the engine gave no
/// evaluation for either side of the move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisItem {
    #[serde(rename = "move")]
    pub mv: String,
    pub move_number: u32,
    pub is_white_move: bool,
    pub absolute_move_index: usize,
    pub pre_move_eval: Option<i32>,
    pub post_move_eval: Option<i32>,
    pub best_move: Option<String>,
    pub centipawn_change: Option<i32>,
    pub wpl: Option<f64>,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mate_distance: Option<i32>,
    pub is_book_move: bool,
    pub is_ai_worthy: bool,
    pub will_use_ai: bool,
}

#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub ai_worthy_threshold: f64,
    pub max_ai_slots: usize,
    pub start_move_number: u32,
    pub start_with_white: bool,
    pub book_move_indices: HashSet<usize>,
    /// Ply offset of `moves[0]` within the whole game
    pub start_absolute_index: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            ai_worthy_threshold: DEFAULT_AI_WORTHY_THRESHOLD,
            max_ai_slots: DEFAULT_MAX_AI_SLOTS,
            start_move_number: 1,
            start_with_white: true,
            book_move_indices: HashSet::new(),
            start_absolute_index: 0,
        }
    }
}

/// Mover-relative centipawn loss; never negative.
pub fn centipawn_change(pre: i32, post: i32, white_moved: bool) -> i32 {
    let delta = if white_moved {
        i64::from(pre) - i64::from(post)
    } else {
        i64::from(post) - i64::from(pre)
    };
    i32::try_from(delta.max(0)).unwrap_or(i32::MAX)
}

/// Classify every move in the batch.
///
/// Missing evaluations degrade only the moves they touch. At most
/// `max_ai_slots` AI-worthy moves get `will_use_ai`, most severe first, ties
/// going to the earlier move.
pub fn classify(
    moves: &[String],
    evaluations: &[Option<EngineEvaluation>],
    options: &ClassifyOptions,
) -> Vec<AnalysisItem> {
    let eval_at = |i: usize| evaluations.get(i).and_then(|e| e.as_ref());

    let mut items: Vec<AnalysisItem> = moves
        .iter()
        .enumerate()
        .map(|(i, mv)| {
            let is_white_move = options.start_with_white == (i % 2 == 0);
            let move_number = if options.start_with_white {
                options.start_move_number + (i / 2) as u32
            } else {
                options.start_move_number + ((i + 1) / 2) as u32
            };
            let is_book_move = options.book_move_indices.contains(&i);

            let mut item = AnalysisItem {
                mv: mv.clone(),
                move_number,
                is_white_move,
                absolute_move_index: options.start_absolute_index + i,
                pre_move_eval: None,
                post_move_eval: None,
                best_move: None,
                centipawn_change: None,
                wpl: None,
                classification: Classification::None,
                mate_distance: None,
                is_book_move,
                is_ai_worthy: false,
                will_use_ai: false,
            };

            let (Some(pre), Some(post)) = (eval_at(i), eval_at(i + 1)) else {
                return item;
            };
            let (pre_cp, post_cp) = (pre.evaluation_centipawns, post.evaluation_centipawns);
            let wpl = win_probability_loss(pre_cp, post_cp, is_white_move);

            item.pre_move_eval = Some(pre_cp);
            item.post_move_eval = Some(post_cp);
            item.best_move = Some(pre.best_move.clone());
            item.centipawn_change = Some(centipawn_change(pre_cp, post_cp, is_white_move));
            item.wpl = Some(wpl);
            item.mate_distance = mate_distance(post_cp);

            if !is_book_move {
                item.classification = Classification::from_wpl(wpl);
                item.is_ai_worthy = wpl >= options.ai_worthy_threshold;
            }
            item
        })
        .collect();

    let mut worthy: Vec<(usize, f64)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_ai_worthy)
        .filter_map(|(i, item)| item.wpl.map(|wpl| (i, wpl)))
        .collect();
    worthy.sort_by(|(ia, a), (ib, b)| b.total_cmp(a).then(ia.cmp(ib)));

    for &(i, _) in worthy.iter().take(options.max_ai_slots) {
        items[i].will_use_ai = true;
    }

    let throttled = worthy.len().saturating_sub(options.max_ai_slots);
    if throttled > 0 {
        tracing::debug!(
            worthy = worthy.len(),
            throttled,
            "AI explanations capped for batch"
        );
    }

    items
}
