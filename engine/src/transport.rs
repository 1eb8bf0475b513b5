use async_trait::async_trait;
use chess::Position;

use crate::evaluation::{EngineEvaluation, PendingEvaluation};
use crate::{EngineError, EngineEvent};

/// One engine process seen as a request/event channel.
///
/// A handle serves a single request at a time. Callers await `bestmove`
/// (via [`EngineTransport::next_event`]) before issuing the next request.
#[async_trait]
pub trait EngineTransport: Send {
    /// Identifies the applied engine options; evaluations are only
    /// comparable between handles with the same fingerprint.
    fn config_fingerprint(&self) -> &str;

    /// Discard any running search, set up `position` and start a search to
    /// `depth`. Returns once the engine has confirmed it is ready and the
    /// search command has been sent.
    async fn request_analysis(&mut self, position: &Position, depth: u8)
        -> Result<(), EngineError>;

    /// Next parsed event, or `None` once the engine has gone away.
    ///
    /// Must be cancel safe: dropping the future loses no event.
    async fn next_event(&mut self) -> Option<EngineEvent>;

    /// Ask the engine to end the current search early. Best effort.
    async fn stop(&mut self);

    /// Shut the engine down. Safe to call more than once.
    async fn terminate(&mut self);

    /// Run one request to completion and collect its evaluation.
    ///
    /// `Ok(None)` means the search finished without a usable score.
    async fn analyze(
        &mut self,
        position: &Position,
        depth: u8,
    ) -> Result<Option<EngineEvaluation>, EngineError> {
        self.request_analysis(position, depth).await?;
        let mut pending = PendingEvaluation::new(position.clone(), depth);
        loop {
            let event = self.next_event().await.ok_or(EngineError::Closed)?;
            if let Some(result) = pending.handle(event) {
                return Ok(result);
            }
        }
    }
}
