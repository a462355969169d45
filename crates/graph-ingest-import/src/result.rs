use std::time::Duration;

use graph_ingest_tabular::QualityReport;

use crate::optimizer::PerformanceMetrics;

/// The outcome of one `StructuredPipeline::import_from_*` call (§3
/// `ImportResult`). Only `ConfigurationError`/fatal storage errors leave this
/// layer as an `Err` (§7) — everything else is folded into this record.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub success: bool,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub entities_added: usize,
    pub relations_added: usize,
    pub entities_linked: usize,
    pub entities_deduplicated: usize,
    pub relations_deduplicated: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
    pub quality_report: Option<QualityReport>,
    pub performance_metrics: Option<PerformanceMetrics>,
}

impl ImportResult {
    /// Stamps the elapsed duration. `success` is set explicitly by the
    /// pipeline's control flow, not derived here: a completed import is a
    /// success even with per-row failures recorded (skip_errors), per §7 —
    /// only cancellation or an unpropagated abort produce `success = false`.
    pub(crate) fn finish(&mut self, duration: Duration) {
        self.duration_seconds = duration.as_secs_f64();
    }
}
