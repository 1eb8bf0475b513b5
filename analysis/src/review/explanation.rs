use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::classify::{AnalysisItem, Classification};
use crate::persistence::PersistenceError;

/// What the explanation service is told about a move.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationRequest {
    pub fen: String,
    #[serde(rename = "move")]
    pub mv: String,
    pub move_number: u32,
    pub is_white_move: bool,
    pub best_move: Option<String>,
    pub classification: Classification,
    pub centipawn_change: Option<i32>,
    pub wpl: Option<f64>,
    pub mate_distance: Option<i32>,
}

impl ExplanationRequest {
    pub fn new(item: &AnalysisItem, fen: &str) -> Self {
        Self {
            fen: fen.to_string(),
            mv: item.mv.clone(),
            move_number: item.move_number,
            is_white_move: item.is_white_move,
            best_move: item.best_move.clone(),
            classification: item.classification,
            centipawn_change: item.centipawn_change,
            wpl: item.wpl,
            mate_distance: item.mate_distance,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExplanationResponse {
    explanation: String,
}

/// Natural-language explanations for poor moves. Each call is billed.
#[async_trait]
pub trait ExplanationService: Send + Sync {
    async fn explain(&self, request: &ExplanationRequest) -> Result<String, PersistenceError>;
}

/// Posts the request as JSON and reads `{ "explanation": "..." }` back.
pub struct HttpExplanationService {
    client: Client,
    endpoint: String,
}

impl HttpExplanationService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PersistenceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ExplanationService for HttpExplanationService {
    async fn explain(&self, request: &ExplanationRequest) -> Result<String, PersistenceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PersistenceError::Status(response.status().as_u16()));
        }

        let body: ExplanationResponse = response.json().await?;
        Ok(body.explanation)
    }
}
