use engine::EngineEvaluation;

/// Events reported for one analysis run, in the order they happen.
///
/// Exactly one of `Completed`, `Cancelled` or `Failed` ends the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(String),
    Evaluation {
        index: usize,
        evaluation: EngineEvaluation,
        from_cache: bool,
    },
    /// Every slot in supplied order; `None` where the engine gave no score
    Completed(Vec<Option<EngineEvaluation>>),
    Cancelled,
    /// The engine went away; the run was aborted
    Failed(String),
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Completed(_) | RunEvent::Cancelled | RunEvent::Failed(_)
        )
    }
}
