use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chess::Position;
use engine::EngineEvaluation;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_CACHE_OPENING_WINDOW;

/// Cache entry for a position evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// White-relative, mate-coded like `EngineEvaluation`
    pub centipawns: i32,
    pub depth: u8,
    pub best_move: String,
    pub principal_variation: String,
    /// Unix seconds at store time
    pub timestamp: u64,
}

impl CacheEntry {
    pub fn from_evaluation(eval: &EngineEvaluation) -> Self {
        Self {
            centipawns: eval.evaluation_centipawns,
            depth: eval.depth,
            best_move: eval.best_move.clone(),
            principal_variation: eval.principal_variation.clone(),
            timestamp: now_timestamp(),
        }
    }

    /// Evaluation served from the cache; no engine time was spent on it.
    pub fn to_evaluation(&self) -> EngineEvaluation {
        EngineEvaluation {
            evaluation_centipawns: self.centipawns,
            best_move: self.best_move.clone(),
            principal_variation: self.principal_variation.clone(),
            depth: self.depth,
            calculation_time_ms: 0,
        }
    }
}

/// Cache key: the position together with the engine configuration that
/// produced the evaluation.
pub fn cache_key(fen: &str, config_fingerprint: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    fen.hash(&mut hasher);
    config_fingerprint.hash(&mut hasher);
    hasher.finish()
}

/// Process-wide evaluation cache for early-game positions.
///
/// Only positions up to `opening_window` full moves are looked up or stored.
/// Entries satisfy requests at or below their own depth. A single writer is
/// expected; reads may come from anywhere.
#[derive(Debug)]
pub struct EvalCache {
    entries: RwLock<HashMap<u64, CacheEntry>>,
    opening_window: u16,
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_OPENING_WINDOW)
    }
}

impl EvalCache {
    pub fn new(opening_window: u16) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            opening_window,
        }
    }

    pub fn opening_window(&self) -> u16 {
        self.opening_window
    }

    pub fn in_window(&self, position: &Position) -> bool {
        position.fullmove_number() <= self.opening_window
    }

    /// Cached evaluation for `position`, if one exists at `requested_depth` or deeper.
    pub fn lookup(
        &self,
        position: &Position,
        config_fingerprint: &str,
        requested_depth: u8,
    ) -> Option<CacheEntry> {
        if !self.in_window(position) {
            return None;
        }
        let key = cache_key(position.fen(), config_fingerprint);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key)
            .filter(|e| e.depth >= requested_depth)
            .cloned()
    }

    /// Store an evaluation. Positions outside the opening window are not
    /// written, and an existing deeper entry is kept.
    ///
    /// Returns whether the entry was written.
    pub fn store(&self, position: &Position, config_fingerprint: &str, entry: CacheEntry) -> bool {
        if !self.in_window(position) {
            return false;
        }
        let key = cache_key(position.fen(), config_fingerprint);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(existing) if existing.depth > entry.depth => false,
            _ => {
                entries.insert(key, entry);
                true
            }
        }
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
