use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{JsonStore, PersistenceError, Storable};
use crate::cache::now_timestamp;
use crate::classify::{AnalysisItem, Classification};

/// A saved mistake for later spaced-repetition practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hurdle {
    pub id: String,
    /// Position before the move
    pub fen: String,
    pub played_move: String,
    pub best_move: Option<String>,
    pub centipawn_change: Option<i32>,
    pub wpl: Option<f64>,
    pub classification: Classification,
    pub absolute_move_index: usize,
    pub ai_explanation: Option<String>,
    pub created_at: u64,
}

impl Hurdle {
    /// Build a hurdle from a classified move and the position it was played in.
    ///
    /// The id depends only on the position and move, so saving the same
    /// mistake twice replaces the earlier record.
    pub fn from_item(item: &AnalysisItem, fen: &str, ai_explanation: Option<String>) -> Self {
        Self {
            id: hurdle_id(fen, &item.mv),
            fen: fen.to_string(),
            played_move: item.mv.clone(),
            best_move: item.best_move.clone(),
            centipawn_change: item.centipawn_change,
            wpl: item.wpl,
            classification: item.classification,
            absolute_move_index: item.absolute_move_index,
            ai_explanation,
            created_at: now_timestamp(),
        }
    }
}

/// File-name-safe id derived from the position and the move played in it.
pub fn hurdle_id(fen: &str, mv: &str) -> String {
    let slug: String = format!("{}_{}", fen, mv)
        .chars()
        .map(|c| match c {
            '/' => '.',
            c if c.is_ascii_alphanumeric() || c == '-' => c,
            _ => '_',
        })
        .collect();
    format!("hurdle_{}", slug)
}

impl Storable for Hurdle {
    fn id(&self) -> &str {
        &self.id
    }
}

pub trait HurdleRepository: Send + Sync {
    fn save_hurdle(&self, hurdle: &Hurdle) -> Result<String, PersistenceError>;
    fn list_hurdles(&self) -> Result<Vec<Hurdle>, PersistenceError>;
}

/// Hurdles stored one JSON file each under a directory.
pub struct JsonHurdleStore {
    inner: JsonStore<Hurdle>,
}

impl JsonHurdleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: JsonStore::new(dir),
        }
    }

    pub fn load(&self, id: &str) -> Result<Option<Hurdle>, PersistenceError> {
        self.inner.load(id)
    }

    pub fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.inner.delete(id)
    }
}

impl HurdleRepository for JsonHurdleStore {
    fn save_hurdle(&self, hurdle: &Hurdle) -> Result<String, PersistenceError> {
        let id = self.inner.save(hurdle)?;
        tracing::debug!(id = %id, dir = ?self.inner.dir(), "Hurdle saved");
        Ok(id)
    }

    /// Oldest first.
    fn list_hurdles(&self) -> Result<Vec<Hurdle>, PersistenceError> {
        let mut hurdles = self.inner.load_all()?;
        hurdles.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(hurdles)
    }
}
