//! Runtime tunables for the analysis pipeline.
//!
//! Every value has a compile-time default and can be overridden through a
//! `MOVECOACH_*` environment variable. Values that fail to parse fall back
//! to the default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use engine::EngineConfig;

use crate::calibrate::CalibrationConfig;
use crate::session::SessionConfig;

/// Default hash table size handed to the engine (MB).
const DEFAULT_HASH_MB: u32 = 16;

/// Default number of principal variations the engine reports.
const DEFAULT_MULTI_PV: u8 = 1;

/// Default cap on engine search threads.
const DEFAULT_MAX_THREADS: u32 = 4;

/// Default timeout for the UCI handshake (seconds).
const DEFAULT_ENGINE_INIT_TIMEOUT_SECS: u64 = 10;

/// Default timeout for a single analysis request (seconds).
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Positions after this fullmove number are neither cached nor looked up.
pub const DEFAULT_CACHE_OPENING_WINDOW: u16 = 15;

/// Pause between cache-served results (milliseconds).
const DEFAULT_CACHE_HIT_DELAY_MS: u64 = 10;

/// Default share of win probability lost before a move is worth explaining.
pub const DEFAULT_AI_WORTHY_THRESHOLD: f64 = 0.10;

/// Default number of explanation calls per batch.
pub const DEFAULT_MAX_AI_SLOTS: usize = 5;

const DEFAULT_BOOK_ENDPOINT: &str = "https://explorer.lichess.ovh/masters";

const DEFAULT_BOOK_TIMEOUT_MS: u64 = 2500;

/// Book lookups only cover the first full moves of a game.
pub const DEFAULT_BOOK_FULLMOVE_LIMIT: u16 = 12;

const DEFAULT_HURDLE_DIR: &str = "movecoach-hurdles";

/// Read `key` from the environment, falling back to `default` when unset or
/// unparseable.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub engine_path: Option<PathBuf>,
    pub hash_mb: u32,
    pub multi_pv: u8,
    pub max_threads: u32,
    pub engine_init_timeout: Duration,
    pub request_timeout: Duration,
    pub cache_opening_window: u16,
    pub cache_hit_delay: Duration,
    pub calibration: CalibrationConfig,
    pub ai_worthy_threshold: f64,
    pub max_ai_slots: usize,
    pub book_endpoint: String,
    pub book_timeout: Duration,
    pub book_fullmove_limit: u16,
    pub hurdle_dir: PathBuf,
    /// Explanations are skipped when no endpoint is configured
    pub explanation_endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine_path: None,
            hash_mb: DEFAULT_HASH_MB,
            multi_pv: DEFAULT_MULTI_PV,
            max_threads: DEFAULT_MAX_THREADS,
            engine_init_timeout: Duration::from_secs(DEFAULT_ENGINE_INIT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache_opening_window: DEFAULT_CACHE_OPENING_WINDOW,
            cache_hit_delay: Duration::from_millis(DEFAULT_CACHE_HIT_DELAY_MS),
            calibration: CalibrationConfig::default(),
            ai_worthy_threshold: DEFAULT_AI_WORTHY_THRESHOLD,
            max_ai_slots: DEFAULT_MAX_AI_SLOTS,
            book_endpoint: DEFAULT_BOOK_ENDPOINT.to_string(),
            book_timeout: Duration::from_millis(DEFAULT_BOOK_TIMEOUT_MS),
            book_fullmove_limit: DEFAULT_BOOK_FULLMOVE_LIMIT,
            hurdle_dir: PathBuf::from(DEFAULT_HURDLE_DIR),
            explanation_endpoint: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults with every `MOVECOACH_*` override applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let calibration = CalibrationConfig {
            target: Duration::from_millis(env_or(
                "MOVECOACH_CALIBRATION_TARGET_MS",
                millis(defaults.calibration.target),
            )),
            min_depth: env_or("MOVECOACH_MIN_DEPTH", defaults.calibration.min_depth),
            max_depth: env_or("MOVECOACH_MAX_DEPTH", defaults.calibration.max_depth),
            probe_timeout: Duration::from_millis(env_or(
                "MOVECOACH_PROBE_TIMEOUT_MS",
                millis(defaults.calibration.probe_timeout),
            )),
        };

        Self {
            engine_path: std::env::var("MOVECOACH_ENGINE_PATH")
                .ok()
                .map(PathBuf::from),
            hash_mb: env_or("MOVECOACH_HASH_MB", defaults.hash_mb),
            multi_pv: env_or("MOVECOACH_MULTI_PV", defaults.multi_pv),
            max_threads: env_or("MOVECOACH_MAX_THREADS", defaults.max_threads),
            engine_init_timeout: Duration::from_secs(env_or(
                "MOVECOACH_ENGINE_INIT_TIMEOUT_SECS",
                defaults.engine_init_timeout.as_secs(),
            )),
            request_timeout: Duration::from_secs(env_or(
                "MOVECOACH_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            cache_opening_window: env_or(
                "MOVECOACH_CACHE_OPENING_WINDOW",
                defaults.cache_opening_window,
            ),
            cache_hit_delay: Duration::from_millis(env_or(
                "MOVECOACH_CACHE_HIT_DELAY_MS",
                millis(defaults.cache_hit_delay),
            )),
            calibration,
            ai_worthy_threshold: env_or(
                "MOVECOACH_AI_WORTHY_THRESHOLD",
                defaults.ai_worthy_threshold,
            ),
            max_ai_slots: env_or("MOVECOACH_MAX_AI_SLOTS", defaults.max_ai_slots),
            book_endpoint: env_or("MOVECOACH_BOOK_ENDPOINT", defaults.book_endpoint),
            book_timeout: Duration::from_millis(env_or(
                "MOVECOACH_BOOK_TIMEOUT_MS",
                millis(defaults.book_timeout),
            )),
            book_fullmove_limit: env_or(
                "MOVECOACH_BOOK_FULLMOVE_LIMIT",
                defaults.book_fullmove_limit,
            ),
            hurdle_dir: std::env::var("MOVECOACH_HURDLE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.hurdle_dir),
            explanation_endpoint: std::env::var("MOVECOACH_EXPLANATION_ENDPOINT").ok(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            path: self.engine_path.clone(),
            hash_mb: self.hash_mb,
            multi_pv: self.multi_pv,
            max_threads: self.max_threads,
            init_timeout: self.engine_init_timeout,
            ..EngineConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            cache_opening_window: self.cache_opening_window,
            cache_hit_delay: self.cache_hit_delay,
            request_timeout: self.request_timeout,
            calibration: self.calibration.clone(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
