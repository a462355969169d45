use std::{collections::BTreeMap, path::Path, sync::Arc, time::Instant};

use error_stack::{Report, Result};
use graph_ingest_text::{ChunkerConfig, TextChunker};
use graph_ingest_types::PropertyValue;

use crate::{
    build_result::DocumentBuildResult,
    error::EmptyDocumentError,
    graph_builder::{BuildTextRequest, GraphBuilder},
    traits::DocumentParser,
};

/// Configures a [`DocumentBuilder`] (§4.14).
#[derive(Clone)]
pub struct DocumentBuilderConfig {
    /// When set and the parsed content exceeds `chunker.chunk_size`, the
    /// document is split before each chunk is run through the builder.
    pub chunker: Option<ChunkerConfig>,
    pub parallel_chunks: bool,
}

impl Default for DocumentBuilderConfig {
    fn default() -> Self {
        Self {
            chunker: Some(ChunkerConfig::default()),
            parallel_chunks: false,
        }
    }
}

/// Builds a graph from a document on disk: parse, optionally chunk, then run
/// each chunk through a [`GraphBuilder`] (§4.14).
pub struct DocumentBuilder {
    builder: GraphBuilder,
    parser: Option<Arc<dyn DocumentParser>>,
    config: DocumentBuilderConfig,
}

impl DocumentBuilder {
    #[must_use]
    pub fn new(builder: GraphBuilder, config: DocumentBuilderConfig) -> Self {
        Self {
            builder,
            parser: None,
            config,
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Parse, chunk, and build a graph from the document at `path`.
    ///
    /// If a configured [`DocumentParser`] fails, falls back to reading `path`
    /// as plain text (§4.14). Content that is empty or whitespace-only after
    /// both attempts is a typed `EmptyDocumentError`, raised before any
    /// extraction work starts. `metadata` is the caller-supplied metadata
    /// merged into every chunk's metadata alongside `document`/`chunk_index`/
    /// `document_type` (§4.14); the reserved keys win on collision, since
    /// they are this pipeline's own bookkeeping and must stay accurate.
    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn build_from_document(
        &self,
        path: &Path,
        metadata: graph_ingest_types::PropertyMap,
    ) -> Result<DocumentBuildResult, EmptyDocumentError> {
        let start = Instant::now();

        let content = self.read_content(path).await?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(Report::new(EmptyDocumentError)
                .attach_printable(format!("{} produced no usable content", path.display())));
        }

        let document_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("unknown")
            .to_owned();
        let document_name = path.display().to_string();

        let chunks = match &self.config.chunker {
            Some(chunker_config) if content.chars().count() > chunker_config.chunk_size => {
                let chunker = TextChunker::new(chunker_config.clone())
                    .map_err(|report| {
                        report
                            .change_context(EmptyDocumentError)
                            .attach_printable("chunker configuration was invalid")
                    })?;
                chunker
                    .chunk(&content, &BTreeMap::new())
                    .into_iter()
                    .map(|chunk| chunk.text)
                    .collect()
            }
            _ => vec![content],
        };

        let mut result = DocumentBuildResult {
            chunks_processed: chunks.len(),
            ..DocumentBuildResult::default()
        };

        let mut requests = Vec::with_capacity(chunks.len());
        for (index, text) in chunks.into_iter().enumerate() {
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("document".to_owned(), PropertyValue::from(document_name.clone()));
            chunk_metadata.insert("chunk_index".to_owned(), PropertyValue::from(index as i64));
            chunk_metadata.insert("document_type".to_owned(), PropertyValue::from(document_type.clone()));
            let mut request = BuildTextRequest::new(text, document_name.clone());
            request.metadata = chunk_metadata;
            requests.push(request);
        }

        let chunk_results = if self.config.parallel_chunks {
            let futures = requests
                .into_iter()
                .map(|request| self.builder.build_from_text(request));
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.builder.build_from_text(request).await);
            }
            results
        };

        for chunk_result in chunk_results {
            if chunk_result.success {
                result.chunks_succeeded += 1;
            }
            result.entities_added += chunk_result.entities_added;
            result.relations_added += chunk_result.relations_added;
            result.warnings.extend(chunk_result.warnings);
            result.errors.extend(chunk_result.errors);
        }

        result.success = result.chunks_succeeded > 0;
        result.duration = start.elapsed();
        Ok(result)
    }

    async fn read_content(&self, path: &Path) -> Result<String, EmptyDocumentError> {
        if let Some(parser) = &self.parser {
            match parser.parse(path).await {
                Ok(parsed) if !parsed.content.trim().is_empty() => return Ok(parsed.content),
                Ok(_) => {}
                Err(report) => {
                    tracing::warn!(error = ?report, "document parser failed, falling back to plain text read");
                }
            }
        }
        std::fs::read_to_string(path)
            .map_err(|error| {
                Report::new(EmptyDocumentError)
                    .attach_printable(format!("failed to read {}: {error}", path.display()))
            })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use error_stack::Result as EsResult;
    use graph_ingest_store::{GraphStore, InMemoryGraphStore};
    use graph_ingest_types::{Entity, Relation};

    use super::*;
    use crate::{
        graph_builder::GraphBuilderConfig,
        traits::{EntityExtractor, ParsedDocument, RelationExtractor},
    };

    struct StaticEntityExtractor(Vec<Entity>);

    #[async_trait]
    impl EntityExtractor for StaticEntityExtractor {
        async fn extract_entities(
            &self,
            _text: &str,
            _entity_types: Option<&[String]>,
        ) -> EsResult<Vec<Entity>, crate::error::ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct NoRelations;

    #[async_trait]
    impl RelationExtractor for NoRelations {
        async fn extract_relations(
            &self,
            _text: &str,
            _entities: &[Entity],
            _relation_types: Option<&[String]>,
        ) -> EsResult<Vec<Relation>, crate::error::ExtractionError> {
            Ok(Vec::new())
        }
    }

    struct FailingParser;

    #[async_trait]
    impl DocumentParser for FailingParser {
        async fn parse(&self, _path: &Path) -> EsResult<ParsedDocument, crate::error::ExtractionError> {
            Err(error_stack::Report::new(crate::error::ExtractionError)
                .attach_printable("parser unavailable in test"))
        }
    }

    fn person(id: &str, name: &str) -> Entity {
        let mut props = graph_ingest_types::PropertyMap::new();
        props.insert("name".to_owned(), PropertyValue::from(name));
        Entity::new(id, "Person").with_properties(props)
    }

    fn builder() -> GraphBuilder {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        GraphBuilder::new(
            store,
            Arc::new(StaticEntityExtractor(vec![person("1", "Alice")])),
            Arc::new(NoRelations),
            GraphBuilderConfig {
                enable_linking: false,
                ..GraphBuilderConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn falls_back_to_plain_text_when_parser_fails() {
        let dir = std::env::temp_dir().join(format!("graph-ingest-build-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("doc.txt");
        std::fs::write(&path, "Alice is a person.").unwrap();

        let document_builder = DocumentBuilder::new(builder(), DocumentBuilderConfig::default())
            .with_parser(Arc::new(FailingParser));
        let result = document_builder.build_from_document(&path, graph_ingest_types::PropertyMap::new()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.chunks_processed, 1);
        assert_eq!(result.entities_added, 1);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn caller_metadata_is_merged_into_every_chunk() {
        let dir = std::env::temp_dir().join(format!("graph-ingest-build-test-metadata-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("doc.txt");
        std::fs::write(&path, "Alice is a person.").unwrap();

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let document_builder = DocumentBuilder::new(
            GraphBuilder::new(
                Arc::clone(&store),
                Arc::new(StaticEntityExtractor(vec![person("1", "Alice")])),
                Arc::new(NoRelations),
                GraphBuilderConfig {
                    enable_linking: false,
                    ..GraphBuilderConfig::default()
                },
            ),
            DocumentBuilderConfig::default(),
        );

        let mut caller_metadata = graph_ingest_types::PropertyMap::new();
        caller_metadata.insert("ingest_batch".to_owned(), PropertyValue::from("nightly-42"));

        let result = document_builder
            .build_from_document(&path, caller_metadata)
            .await
            .unwrap();
        assert!(result.success);

        let entity = store.get_entity("1").await.unwrap().unwrap();
        let provenance = entity.provenance.last().expect("entity should carry provenance");
        assert_eq!(
            provenance.metadata.get("ingest_batch"),
            Some(&PropertyValue::from("nightly-42"))
        );
        assert_eq!(provenance.metadata.get("chunk_index"), Some(&PropertyValue::from(0_i64)));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn empty_document_is_a_typed_error() {
        let dir = std::env::temp_dir().join(format!("graph-ingest-build-test-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.txt");
        std::fs::write(&path, "   \n  ").unwrap();

        let document_builder = DocumentBuilder::new(builder(), DocumentBuilderConfig::default());
        let result = document_builder.build_from_document(&path, graph_ingest_types::PropertyMap::new()).await;
        assert!(result.is_err());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn oversized_document_is_split_into_multiple_chunks() {
        let dir = std::env::temp_dir().join(format!("graph-ingest-build-test-chunked-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("big.txt");
        let content = "Alice works at Tech Corp. ".repeat(50);
        std::fs::write(&path, &content).unwrap();

        let document_builder = DocumentBuilder::new(
            builder(),
            DocumentBuilderConfig {
                chunker: Some(ChunkerConfig {
                    chunk_size: 200,
                    overlap: 20,
                    ..ChunkerConfig::default()
                }),
                parallel_chunks: false,
            },
        );
        let result = document_builder.build_from_document(&path, graph_ingest_types::PropertyMap::new()).await.unwrap();
        assert!(result.chunks_processed > 1);
        assert!(result.success);
        std::fs::remove_file(&path).ok();
    }
}
