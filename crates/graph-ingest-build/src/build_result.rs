use std::{sync::Arc, time::Duration};

/// The stable checkpoints a [`crate::GraphBuilder`] fires progress callbacks
/// at (§4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCheckpoint {
    ExtractDone,
    DedupeDone,
    LinkDone,
    ValidateDone,
    PersistDone,
}

/// A caller-supplied progress hook. A panic inside the callback is caught and
/// logged rather than propagated, so a misbehaving callback can never abort
/// an otherwise-successful build (§4.13).
pub type ProgressCallback = Arc<dyn Fn(BuildCheckpoint) + Send + Sync>;

pub(crate) fn fire(callback: &Option<ProgressCallback>, checkpoint: BuildCheckpoint) {
    let Some(callback) = callback else {
        return;
    };
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(checkpoint))).is_err() {
        tracing::warn!(?checkpoint, "progress callback panicked; ignoring");
    }
}

/// The outcome of one `GraphBuilder::build_from_text` call (§3 `BuildResult`).
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub success: bool,
    pub entities_added: usize,
    pub relations_added: usize,
    pub entities_linked: usize,
    pub entities_deduplicated: usize,
    pub relations_deduplicated: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub duration: Duration,
}

/// The outcome of one `DocumentBuilder::build_from_document` call, aggregated
/// across every chunk's `BuildResult` (§3 `DocumentBuildResult`).
#[derive(Debug, Clone, Default)]
pub struct DocumentBuildResult {
    pub success: bool,
    pub chunks_processed: usize,
    pub chunks_succeeded: usize,
    pub entities_added: usize,
    pub relations_added: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub duration: Duration,
}
