//! The `analyze` flow: evaluate a line, classify it, optionally review it.

use std::time::Duration;

use analysis::{
    book_move_indices, classify, drain_run, reorder_results, review_batch, AnalysisError,
    AnalysisItem, BatchRequest, ClassifyOptions, ExplanationService, HttpExplanationService,
    JsonHurdleStore, OpeningBook, PipelineConfig, ReviewOutcome, RunEvent, SessionHandle,
};
use chess::{FenError, NotationError, Position};
use serde::Serialize;

const EXPLANATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Moves in UCI notation, oldest first
    pub moves: Vec<String>,
    pub fen: Option<String>,
    /// Calibrated when not given
    pub depth: Option<u8>,
    /// Ply index of the first move within the whole game
    pub start_ply: usize,
    pub recent_first: bool,
    pub review: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReport {
    pub depth: u8,
    pub items: Vec<AnalysisItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fen(#[from] FenError),
    #[error("Bad move in line: {0}")]
    Notation(#[from] NotationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Analysis aborted: {0}")]
    RunFailed(String),
    #[error("Analysis was cancelled")]
    RunCancelled,
}

/// Analyse `options.moves` on `session` and classify the result.
pub async fn run_analysis(
    session: &SessionHandle,
    config: &PipelineConfig,
    options: &AnalyzeOptions,
    book: Option<&dyn OpeningBook>,
) -> Result<AnalyzeReport, PipelineError> {
    let start = match &options.fen {
        Some(fen) => Position::from_fen(fen)?,
        None => Position::start(),
    };
    let batch = BatchRequest::from_line(start.clone(), &options.moves)?;

    let depth = match options.depth {
        Some(depth) => depth,
        None => session.calibrate().await?.recommended_depth,
    };

    let submitted = if options.recent_first {
        batch.clone().most_recent_first()
    } else {
        batch.clone()
    };

    let mut events = session
        .start(
            submitted.moves,
            submitted.positions,
            submitted.move_numbers,
            depth,
        )
        .await?;

    let last = drain_run(&mut events, |event| match event {
        RunEvent::Progress(msg) => tracing::info!("{}", msg),
        RunEvent::Evaluation {
            index,
            evaluation,
            from_cache,
        } => tracing::debug!(
            index,
            cp = evaluation.evaluation_centipawns,
            from_cache,
            "Position evaluated"
        ),
        _ => {}
    })
    .await;

    let mut results = match last {
        Some(RunEvent::Completed(results)) => results,
        Some(RunEvent::Failed(reason)) => return Err(PipelineError::RunFailed(reason)),
        _ => return Err(PipelineError::RunCancelled),
    };
    if options.recent_first {
        results = reorder_results(results);
    }

    let book_move_indices = match book {
        Some(book) => {
            book_move_indices(
                book,
                &batch.moves,
                &batch.positions,
                config.book_fullmove_limit,
            )
            .await
        }
        None => Default::default(),
    };

    let classify_options = ClassifyOptions {
        ai_worthy_threshold: config.ai_worthy_threshold,
        max_ai_slots: config.max_ai_slots,
        start_move_number: u32::from(start.fullmove_number()),
        start_with_white: start.is_white_to_move(),
        book_move_indices,
        start_absolute_index: options.start_ply,
    };
    let items = classify(&batch.moves, &results, &classify_options);

    let review = if options.review {
        Some(review_items(config, &items, &batch.positions).await)
    } else {
        None
    };

    Ok(AnalyzeReport {
        depth,
        items,
        review,
    })
}

async fn review_items(
    config: &PipelineConfig,
    items: &[AnalysisItem],
    positions: &[Position],
) -> ReviewOutcome {
    let store = JsonHurdleStore::new(&config.hurdle_dir);
    let explainer = config.explanation_endpoint.as_ref().and_then(|endpoint| {
        HttpExplanationService::new(endpoint.as_str(), EXPLANATION_TIMEOUT)
            .map_err(|e| tracing::warn!("Explanations disabled: {}", e))
            .ok()
    });

    review_batch(
        items,
        positions,
        explainer.as_ref().map(|e| e as &dyn ExplanationService),
        &store,
    )
    .await
}
