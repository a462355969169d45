use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};

use error_stack::{ensure, Report, Result};
use graph_ingest_fusion::{
    DedupConfig, EntityDeduplicator, EntityLinker, LinkerConfig, RelationDeduplicator, RelationValidator,
};
use graph_ingest_store::GraphStore;
use graph_ingest_types::{Entity, GraphSchema, PropertyMap, PropertyValue, Provenance, Relation};
use time::OffsetDateTime;
use tokio::sync::Semaphore;

use crate::{
    build_result::{fire, BuildCheckpoint, BuildResult, ProgressCallback},
    error::ConfigurationError,
    traits::{EmbeddingProvider, EntityExtractor, RelationExtractor},
};

/// Configures a [`GraphBuilder`] (§4.13).
#[derive(Clone)]
pub struct GraphBuilderConfig {
    pub entity_types: Option<Vec<String>>,
    pub relation_types: Option<Vec<String>>,
    pub enable_dedup: bool,
    pub dedup_name_property: String,
    pub enable_linking: bool,
    pub link_name_property: String,
    pub schema: Option<GraphSchema>,
    pub enable_relation_validation: bool,
    pub max_parallel: usize,
}

impl Default for GraphBuilderConfig {
    fn default() -> Self {
        Self {
            entity_types: None,
            relation_types: None,
            enable_dedup: true,
            dedup_name_property: "name".to_owned(),
            enable_linking: true,
            link_name_property: "name".to_owned(),
            schema: None,
            enable_relation_validation: false,
            max_parallel: 4,
        }
    }
}

/// One text unit to build a graph from (§4.13).
#[derive(Debug, Clone)]
pub struct BuildTextRequest {
    pub text: String,
    pub source: String,
    pub metadata: PropertyMap,
}

impl BuildTextRequest {
    #[must_use]
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            metadata: PropertyMap::new(),
        }
    }
}

/// Orchestrates extract → dedupe → link → validate → persist for one text
/// unit (§4.13). Cheap to clone: every collaborator is held behind an `Arc`,
/// which is what lets `build_batch`'s parallel mode hand an owned copy to
/// each spawned task.
#[derive(Clone)]
pub struct GraphBuilder {
    store: Arc<dyn GraphStore>,
    entity_extractor: Arc<dyn EntityExtractor>,
    relation_extractor: Arc<dyn RelationExtractor>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    progress: Option<ProgressCallback>,
    config: GraphBuilderConfig,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(
        store: Arc<dyn GraphStore>,
        entity_extractor: Arc<dyn EntityExtractor>,
        relation_extractor: Arc<dyn RelationExtractor>,
        config: GraphBuilderConfig,
    ) -> Self {
        Self {
            store,
            entity_extractor,
            relation_extractor,
            embedding_provider: None,
            progress: None,
            config,
        }
    }

    #[must_use]
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    #[must_use]
    pub fn config(&self) -> &GraphBuilderConfig {
        &self.config
    }

    /// Run the full pipeline described in §4.13 for one text unit.
    ///
    /// Returns a result record rather than a fallible `Result`: per the
    /// partial-failure semantics in §7, only configuration errors (handled in
    /// `build_batch`, before any unit starts) leave this layer as an
    /// uncaught error. Every other failure — a failed extractor call, a
    /// rejected relation, an individual write failure — is recorded in the
    /// returned `BuildResult` and the unit still completes.
    #[tracing::instrument(level = "info", skip_all, fields(source = %request.source))]
    pub async fn build_from_text(&self, request: BuildTextRequest) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::default();

        let candidates = match self
            .entity_extractor
            .extract_entities(&request.text, self.config.entity_types.as_deref())
            .await
        {
            Ok(entities) => entities,
            Err(report) => {
                result.errors.push(format!("entity extraction failed: {report:?}"));
                result.duration = start.elapsed();
                return result;
            }
        };

        if candidates.is_empty() {
            result.success = true;
            result.warnings.push("no entities extracted".to_owned());
            result.duration = start.elapsed();
            return result;
        }
        fire(&self.progress, BuildCheckpoint::ExtractDone);

        let candidates = if self.config.enable_dedup {
            let dedup = EntityDeduplicator::new(DedupConfig {
                name_property: self.config.dedup_name_property.clone(),
                ..DedupConfig::default()
            });
            let (merged, stats) = dedup.deduplicate(candidates);
            result.entities_deduplicated = stats.deduplicated();
            merged
        } else {
            candidates
        };
        fire(&self.progress, BuildCheckpoint::DedupeDone);

        let (new_entities, merges, relation_pool) = if self.config.enable_linking {
            let linker = EntityLinker::new(
                self.store.as_ref(),
                LinkerConfig {
                    name_property: self.config.link_name_property.clone(),
                    ..LinkerConfig::default()
                },
            );
            let link_results = match linker.link_all(candidates).await {
                Ok(results) => results,
                Err(report) => {
                    result.errors.push(format!("entity linking failed: {report:?}"));
                    result.duration = start.elapsed();
                    return result;
                }
            };
            let mut new_entities = Vec::new();
            let mut merges: Vec<(String, PropertyMap)> = Vec::new();
            let mut relation_pool = Vec::new();
            for link_result in link_results {
                if link_result.linked {
                    let existing = link_result.existing.expect("linked implies existing");
                    merges.push((existing.id.clone(), link_result.candidate.properties));
                    relation_pool.push(existing);
                    result.entities_linked += 1;
                } else {
                    relation_pool.push(link_result.candidate.clone());
                    new_entities.push(link_result.candidate);
                }
            }
            (new_entities, merges, relation_pool)
        } else {
            (candidates.clone(), Vec::new(), candidates)
        };
        fire(&self.progress, BuildCheckpoint::LinkDone);

        let unique_ids: HashSet<&str> = relation_pool.iter().map(|e| e.id.as_str()).collect();
        let mut relations = Vec::new();
        if unique_ids.len() < 2 {
            result
                .warnings
                .push("not enough entities for relations".to_owned());
        } else {
            match self
                .relation_extractor
                .extract_relations(&request.text, &relation_pool, self.config.relation_types.as_deref())
                .await
            {
                Ok(extracted) => relations = extracted,
                Err(report) => {
                    result.errors.push(format!("relation extraction failed: {report:?}"));
                    result.duration = start.elapsed();
                    return result;
                }
            }
        }

        if self.config.enable_dedup {
            let before = relations.len();
            relations = RelationDeduplicator::new().deduplicate(relations);
            result.relations_deduplicated = before - relations.len();
        }

        if self.config.enable_relation_validation {
            let entity_type_of: HashMap<String, String> = relation_pool
                .iter()
                .map(|e| (e.id.clone(), e.entity_type.clone()))
                .collect();
            let validator = RelationValidator::new(self.config.schema.as_ref());
            let (accepted, rejected) =
                validator.validate(relations, |id| entity_type_of.get(id).cloned());
            for rejection in rejected {
                result
                    .warnings
                    .push(format!("relation rejected: {}", rejection.reason));
            }
            relations = accepted;
        }
        fire(&self.progress, BuildCheckpoint::ValidateDone);

        let mut new_entities = new_entities;
        if let Some(provider) = &self.embedding_provider {
            let texts: Vec<String> = new_entities
                .iter()
                .filter_map(|e| e.name_value(&self.config.dedup_name_property))
                .collect();
            if !texts.is_empty() {
                match provider.get_embeddings(&texts, None).await {
                    Ok(embeddings) => {
                        for (entity, embedding) in new_entities.iter_mut().zip(embeddings) {
                            entity.embedding = Some(embedding);
                        }
                    }
                    Err(report) => result
                        .warnings
                        .push(format!("embedding computation failed: {report:?}")),
                }
            }
        }

        let provenance =
            Provenance::new(request.source.clone(), OffsetDateTime::now_utc()).with_metadata(request.metadata);
        for entity in &mut new_entities {
            entity.provenance.push(provenance.clone());
        }
        for relation in &mut relations {
            relation.provenance.push(provenance.clone());
        }

        for (existing_id, properties) in merges {
            if let Err(report) = self.store.merge_entity_properties(&existing_id, properties).await {
                result
                    .errors
                    .push(format!("failed to merge properties onto {existing_id}: {report:?}"));
            }
        }
        for entity in new_entities {
            match self.store.add_entity(entity).await {
                Ok(_) => result.entities_added += 1,
                Err(report) => result.errors.push(format!("failed to persist entity: {report:?}")),
            }
        }
        for relation in relations {
            match self.store.add_relation(relation).await {
                Ok(_) => result.relations_added += 1,
                Err(report) => result.errors.push(format!("failed to persist relation: {report:?}")),
            }
        }
        fire(&self.progress, BuildCheckpoint::PersistDone);

        result.success = true;
        result.duration = start.elapsed();
        result
    }

    /// Run `build_from_text` over every `(text, source)` pair, either in
    /// order or bounded-concurrently (§4.13). `texts` and `sources` must be
    /// the same length; a mismatch is a `ConfigurationError` raised before
    /// any unit starts.
    pub async fn build_batch(
        &self,
        texts: Vec<String>,
        sources: Vec<String>,
        parallel: bool,
        max_parallel: usize,
    ) -> Result<Vec<BuildResult>, ConfigurationError> {
        ensure!(
            texts.len() == sources.len(),
            Report::new(ConfigurationError)
                .attach_printable("texts and sources must have the same length")
        );

        if !parallel {
            let mut results = Vec::with_capacity(texts.len());
            for (text, source) in texts.into_iter().zip(sources) {
                results.push(self.build_from_text(BuildTextRequest::new(text, source)).await);
            }
            return Ok(results);
        }

        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let mut handles = Vec::with_capacity(texts.len());
        for (text, source) in texts.into_iter().zip(sources) {
            let builder = self.clone();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                builder.build_from_text(BuildTextRequest::new(text, source)).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|join_error| {
                let mut failed = BuildResult::default();
                failed
                    .errors
                    .push(format!("build task panicked: {join_error}"));
                failed
            }));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use error_stack::Result as EsResult;
    use graph_ingest_store::InMemoryGraphStore;

    use super::*;
    use crate::traits::{EntityExtractor, RelationExtractor};

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

    struct StaticRelationExtractor(Vec<Relation>);

    #[async_trait]
    impl RelationExtractor for StaticRelationExtractor {
        async fn extract_relations(
            &self,
            _text: &str,
            _entities: &[Entity],
            _relation_types: Option<&[String]>,
        ) -> EsResult<Vec<Relation>, crate::error::ExtractionError> {
            Ok(self.0.clone())
        }
    }

    fn person(id: &str, name: &str) -> Entity {
        let mut props = PropertyMap::new();
        props.insert("name".to_owned(), PropertyValue::from(name));
        Entity::new(id, "Person").with_properties(props)
    }

    #[tokio::test]
    async fn duplicate_entities_across_build_merge_into_one() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let entities = vec![person("1", "Alice"), person("2", "Alice"), person("3", "Tech Corp")];
        let relations = vec![Relation::new("r1", "WORKS_FOR", "1", "3")];
        let builder = GraphBuilder::new(
            Arc::clone(&store),
            Arc::new(StaticEntityExtractor(entities)),
            Arc::new(StaticRelationExtractor(relations)),
            GraphBuilderConfig::default(),
        );

        let result = builder
            .build_from_text(BuildTextRequest::new(
                "Alice works at Tech Corp. Alice works at Tech Corp.",
                "doc-1",
            ))
            .await;

        assert!(result.success);
        assert_eq!(result.entities_added, 2);
        assert_eq!(result.relations_added, 1);
        assert_eq!(result.entities_deduplicated, 1);
    }

    #[tokio::test]
    async fn empty_extraction_is_a_success_with_a_warning() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let builder = GraphBuilder::new(
            Arc::clone(&store),
            Arc::new(StaticEntityExtractor(Vec::new())),
            Arc::new(StaticRelationExtractor(Vec::new())),
            GraphBuilderConfig::default(),
        );
        let result = builder.build_from_text(BuildTextRequest::new("", "doc-1")).await;
        assert!(result.success);
        assert_eq!(result.entities_added, 0);
        assert!(!result.warnings.is_empty());
    }

    #[tokio::test]
    async fn single_entity_skips_relation_extraction() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let builder = GraphBuilder::new(
            Arc::clone(&store),
            Arc::new(StaticEntityExtractor(vec![person("1", "Alice")])),
            Arc::new(StaticRelationExtractor(vec![Relation::new("r1", "KNOWS", "1", "2")])),
            GraphBuilderConfig {
                enable_linking: false,
                ..GraphBuilderConfig::default()
            },
        );
        let result = builder.build_from_text(BuildTextRequest::new("Alice.", "doc-1")).await;
        assert!(result.success);
        assert_eq!(result.entities_added, 1);
        assert_eq!(result.relations_added, 0);
        assert!(result.warnings.iter().any(|w| w.contains("not enough entities")));
    }

    #[tokio::test]
    async fn build_batch_rejects_mismatched_lengths() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let builder = GraphBuilder::new(
            Arc::clone(&store),
            Arc::new(StaticEntityExtractor(Vec::new())),
            Arc::new(StaticRelationExtractor(Vec::new())),
            GraphBuilderConfig::default(),
        );
        let result = builder
            .build_batch(vec!["a".to_owned()], vec!["s1".to_owned(), "s2".to_owned()], false, 1)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn progress_callback_observes_every_checkpoint_in_order() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let entities = vec![person("1", "Alice"), person("2", "Tech Corp")];
        let relations = vec![Relation::new("r1", "WORKS_FOR", "1", "2")];
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let builder = GraphBuilder::new(
            Arc::clone(&store),
            Arc::new(StaticEntityExtractor(entities)),
            Arc::new(StaticRelationExtractor(relations)),
            GraphBuilderConfig::default(),
        )
        .with_progress_callback(Arc::new(move |checkpoint| recorder.lock().unwrap().push(checkpoint)));

        let result = builder
            .build_from_text(BuildTextRequest::new("Alice works at Tech Corp.", "doc-1"))
            .await;

        assert!(result.success);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                BuildCheckpoint::ExtractDone,
                BuildCheckpoint::DedupeDone,
                BuildCheckpoint::LinkDone,
                BuildCheckpoint::ValidateDone,
                BuildCheckpoint::PersistDone,
            ]
        );
    }

    #[tokio::test]
    async fn build_batch_parallel_runs_all_units() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let builder = GraphBuilder::new(
            Arc::clone(&store),
            Arc::new(StaticEntityExtractor(vec![person("1", "Alice")])),
            Arc::new(StaticRelationExtractor(Vec::new())),
            GraphBuilderConfig {
                enable_linking: false,
                enable_dedup: false,
                ..GraphBuilderConfig::default()
            },
        );
        let results = builder
            .build_batch(
                vec!["a".to_owned(), "b".to_owned()],
                vec!["s1".to_owned(), "s2".to_owned()],
                true,
                2,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }
}
