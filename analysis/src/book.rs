//! Opening-book detection.
//!
//! Asks an opening explorer which moves have been played from a position and
//! marks the game's moves that appear there. Lookups fail open: any network,
//! status or decoding problem counts as "not a book move".

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chess::{validate_uci_move, Position};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::BookError;

/// A move the explorer knows from this position, with aggregate game counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMove {
    pub uci: String,
    #[serde(default)]
    pub san: String,
    #[serde(default)]
    pub white: u64,
    #[serde(default)]
    pub draws: u64,
    #[serde(default)]
    pub black: u64,
}

impl BookMove {
    pub fn total_games(&self) -> u64 {
        self.white + self.draws + self.black
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookResponse {
    #[serde(default)]
    pub moves: Vec<BookMove>,
}

#[async_trait]
pub trait OpeningBook: Send + Sync {
    /// Candidate moves for `fen`.
    async fn candidate_moves(&self, fen: &str) -> Result<Vec<BookMove>, BookError>;
}

/// HTTP client for an opening explorer endpoint (`GET <endpoint>?fen=...`).
pub struct ExplorerClient {
    client: Client,
    endpoint: String,
}

impl ExplorerClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BookError> {
        let client = Client::builder()
            .user_agent(concat!("movecoach/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl OpeningBook for ExplorerClient {
    async fn candidate_moves(&self, fen: &str) -> Result<Vec<BookMove>, BookError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("fen", fen)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BookError::Status(response.status().as_u16()));
        }

        let body: BookResponse = response.json().await?;
        Ok(body.moves)
    }
}

/// Whether two UCI strings name the same move in `position`.
///
/// Explorers may report castling as king-takes-rook; both spellings resolve
/// to the same legal move.
fn same_move(position: &Position, a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (
        validate_uci_move(position.board(), a),
        validate_uci_move(position.board(), b),
    ) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Indices of `moves` that the book lists for the position they were played from.
///
/// Only positions within the first `fullmove_limit` full moves are queried.
pub async fn book_move_indices<B>(
    book: &B,
    moves: &[String],
    positions: &[Position],
    fullmove_limit: u16,
) -> HashSet<usize>
where
    B: OpeningBook + ?Sized,
{
    let mut indices = HashSet::new();

    for (i, (mv, position)) in moves.iter().zip(positions).enumerate() {
        if position.fullmove_number() > fullmove_limit {
            break;
        }
        match book.candidate_moves(position.fen()).await {
            Ok(candidates) => {
                if candidates.iter().any(|c| same_move(position, &c.uci, mv)) {
                    indices.insert(i);
                }
            }
            Err(e) => {
                tracing::warn!(index = i, "Book lookup failed, treating as not book: {}", e);
            }
        }
    }

    tracing::debug!(book_moves = indices.len(), "Book detection complete");
    indices
}
