//! Structured (tabular) pipeline orchestration (§4.15): concrete readers for
//! CSV/JSON/Excel/SPSS sources, the batching/fusion/persistence loop, and the
//! adaptive performance accounting in §4.16. Schema mapping, reshaping,
//! quality validation and aggregation themselves live in `graph-ingest-tabular`;
//! this crate is the thing that drives them against a real source and a real
//! `GraphStore`.

mod error;
mod optimizer;
mod pipeline;
mod readers;
mod result;

pub use self::{
    error::{ConfigurationError, FatalStorageError, ReaderError},
    optimizer::{BatchSizeOptimizer, MemoryTracker, PerformanceMetrics, MAX_BATCH, MIN_BATCH},
    pipeline::{CancellationSignal, ImportProgressCallback, StructuredPipeline, StructuredPipelineConfig},
    readers::{CsvRowReader, ExcelRowReader, JsonRowReader, RowReader, SheetSelector, SpssRowReader},
    result::ImportResult,
};
