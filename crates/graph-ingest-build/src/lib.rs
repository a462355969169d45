//! Text and document graph-construction orchestration (§4.13, §4.14):
//! extract, deduplicate, link, validate, and persist, with external
//! collaborators (entity/relation extractors, an embedding provider, a
//! document parser) supplied through the traits in this crate (§6).

mod build_result;
mod document_builder;
mod error;
mod graph_builder;
mod traits;

pub use self::{
    build_result::{BuildCheckpoint, BuildResult, DocumentBuildResult, ProgressCallback},
    document_builder::{DocumentBuilder, DocumentBuilderConfig},
    error::{ConfigurationError, EmptyDocumentError, ExtractionError},
    graph_builder::{BuildTextRequest, GraphBuilder, GraphBuilderConfig},
    traits::{DocumentParser, EmbeddingProvider, EntityExtractor, ParsedDocument, RelationExtractor},
};
