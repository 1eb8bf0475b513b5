mod hurdle_store;
mod json_store;

pub use hurdle_store::{Hurdle, HurdleRepository, JsonHurdleStore};
pub use json_store::{JsonStore, Storable};

/// Errors from the persistence layer and the explanation service.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Service returned status {0}")]
    Status(u16),
}
