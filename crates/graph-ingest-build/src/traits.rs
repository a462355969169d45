use std::path::Path;

use async_trait::async_trait;
use error_stack::Result;
use graph_ingest_types::{Entity, Relation};

use crate::error::ExtractionError;

/// External collaborator that turns raw text into candidate entities (§6).
/// Implementations may be called concurrently across chunks and must be safe
/// for reuse across calls.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract_entities(
        &self,
        text: &str,
        entity_types: Option<&[String]>,
    ) -> Result<Vec<Entity>, ExtractionError>;
}

/// External collaborator that turns text plus a resolved entity set into
/// candidate relations, with endpoint ids drawn from that entity set (§6).
#[async_trait]
pub trait RelationExtractor: Send + Sync {
    async fn extract_relations(
        &self,
        text: &str,
        entities: &[Entity],
        relation_types: Option<&[String]>,
    ) -> Result<Vec<Relation>, ExtractionError>;
}

/// External collaborator producing fixed-length embeddings for a batch of
/// texts. `D` (the embedding length) must be identical across a single
/// import (§6) — the caller, not this trait, is responsible for noticing a
/// mismatch (the reference `GraphStore` rejects it at write time).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn get_embeddings(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, ExtractionError>;
}

/// The plain-text result of parsing a document (§6 DocumentParser contract).
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub content: String,
}

/// External collaborator that extracts plain text from a binary document
/// format. Callers fall back to a plain-text read of `path` if this fails
/// (§6, §4.14) — the trait itself only reports success or failure.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<ParsedDocument, ExtractionError>;
}
