//! Knowledge-graph construction pipeline: text ingestion (`graph-ingest-text`,
//! `graph-ingest-build`) and tabular ingestion (`graph-ingest-tabular`,
//! `graph-ingest-import`) converge on a shared data model
//! (`graph-ingest-types`) and fusion layer (`graph-ingest-fusion`) before
//! landing in a `GraphStore` (`graph-ingest-store`). This crate re-exports
//! the public surface of all of them as a single entrypoint.
//!
//! Three sibling crates each define their own `ConfigurationError` for their
//! own layer of the pipeline (text-build, tabular, and structured-import
//! configuration are distinct failure domains); this crate re-exports all
//! three under layer-prefixed names rather than picking one.

pub mod logging;

pub use graph_ingest_build::{
    BuildCheckpoint, BuildResult, BuildTextRequest, ConfigurationError as BuildConfigurationError,
    DocumentBuildResult, DocumentBuilder, DocumentBuilderConfig, DocumentParser, EmbeddingProvider,
    EmptyDocumentError, EntityExtractor, ExtractionError, GraphBuilder, GraphBuilderConfig, ParsedDocument,
    ProgressCallback, RelationExtractor,
};
pub use graph_ingest_fusion::{
    DedupConfig, DedupStats, EntityDeduplicator, EntityLinker, ExactCanonicalName, JaroWinklerSimilarity,
    LinkQueryError, LinkResult, LinkerConfig, NameSimilarity, RelationDeduplicator, RelationRejection,
    RelationValidator,
};
pub use graph_ingest_import::{
    BatchSizeOptimizer, CancellationSignal, ConfigurationError as ImportConfigurationError, CsvRowReader,
    ExcelRowReader, FatalStorageError, ImportProgressCallback, ImportResult, JsonRowReader, MemoryTracker,
    PerformanceMetrics, ReaderError, RowReader, SheetSelector, SpssRowReader, StructuredPipeline,
    StructuredPipelineConfig, MAX_BATCH, MIN_BATCH,
};
pub use graph_ingest_store::{
    BackendError, CompressedProperties, Direction, DuplicateIdError, GraphStats, GraphStore,
    InMemoryGraphStore, InsertionError, NotFoundError, NotInitializedError, PropertyOptimizer,
    PropertyOptimizerConfig, QueryError, StoreWriteError, StoredProperties, UnsupportedQueryError,
    DEFAULT_COMPRESSION_THRESHOLD,
};
pub use graph_ingest_tabular::{
    build_summary_entity, detect_wide_format, generate_normalized_mapping, infer_column_scalar_type,
    infer_schema, melt, merge_with_partial_schema, pivot, suggest_melt_config, AggregationAccumulator,
    AggregationConfig, AggregationFunction, ComputeFunction, ConfigurationError as TabularConfigurationError,
    DataQualityValidator, DataTable, EntityMapping, InferredSchema, MeltSuggestion, OutlierMethod,
    PropertyTransformation, QualityConfig, QualityReport, QualityViolationError, RangeRule, RelationMapping,
    ReshapeKind, ReshapeResult, Row, RowOutput, SchemaMapping, Severity, TransformationError, Violation,
    DEFAULT_WIDE_THRESHOLD, EXACT_SAMPLE_THRESHOLD,
};
pub use graph_ingest_text::{Chunk, ChunkerConfig, ChunkerConfigError, TextChunker};
pub use graph_ingest_types::{
    canonical_name_key, Entity, EntityTypeSchema, GraphSchema, PropertyMap, PropertyValue, Provenance,
    Relation, RelationTypeSchema, ScalarType,
};
