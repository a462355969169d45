//! Tabular-source support shared by the structured pipeline: declarative
//! schema mapping (§4.8), wide/long reshaping (§4.9), schema inference
//! (§4.10), data-quality validation (§4.11), and streaming aggregation
//! (§4.12). Orchestration over a concrete reader (CSV/JSON/Excel/SPSS) lives
//! one layer up, in `graph-ingest-import`.

mod aggregation;
mod error;
mod inference;
mod quality;
mod reshape;
mod schema_mapping;
mod table;

pub use self::{
    aggregation::{
        build_summary_entity, AggregationAccumulator, AggregationConfig, AggregationFunction,
        EXACT_SAMPLE_THRESHOLD,
    },
    error::{ConfigurationError, QualityViolationError, TransformationError},
    inference::{infer_column_scalar_type, infer_schema, merge_with_partial_schema, InferredSchema},
    quality::{DataQualityValidator, OutlierMethod, QualityConfig, QualityReport, RangeRule, Severity, Violation},
    reshape::{
        detect_wide_format, generate_normalized_mapping, melt, pivot, suggest_melt_config, MeltSuggestion,
        ReshapeKind, ReshapeResult, DEFAULT_WIDE_THRESHOLD,
    },
    schema_mapping::{
        ComputeFunction, EntityMapping, PropertyTransformation, RelationMapping, RowOutput, SchemaMapping,
    },
    table::{DataTable, Row},
};
