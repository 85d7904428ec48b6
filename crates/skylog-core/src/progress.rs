/// Long-running phases reported to a progress sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Analyze,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Ingest => write!(f, "Reading headers"),
            Stage::Analyze => write!(f, "Analyzing"),
        }
    }
}

/// Receives progress updates. All methods default to no-ops, and may be
/// called from any thread.
pub trait ProgressReporter: Send + Sync {
    /// A stage has started. `total_items` is the number of work items, if known.
    fn begin_stage(&self, _stage: Stage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    fn finish_stage(&self) {}
}

/// Discards every update.
pub struct NoOpReporter;

impl ProgressReporter for NoOpReporter {}
