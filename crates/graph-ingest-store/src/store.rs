use async_trait::async_trait;
use error_stack::Result;
use graph_ingest_types::{Entity, Relation};

use crate::error::{BackendError, DuplicateIdError, NotFoundError, NotInitializedError};

/// Which direction to traverse when looking up neighbours of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

/// Coarse-grained counters returned by [`GraphStore::get_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relation_count: usize,
}

/// The storage interface the graph construction pipeline writes through.
///
/// This is the one seam in the whole crate graph where a production backend
/// (Postgres, an embedded store, a remote service) is expected to plug in; the
/// pipeline itself only ever depends on `dyn GraphStore` / `impl GraphStore`.
/// No cross-operation transactionality is assumed here — callers that need
/// batch atomicity (the `StructuredPipeline`) provide it themselves by
/// serialising writes through a single writer task, see `graph-ingest-import`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Acquire backend resources. Idempotent: calling `initialise` on an
    /// already-initialised store is a no-op success.
    async fn initialise(&self) -> Result<(), BackendError>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> Result<(), BackendError>;

    async fn add_entity(&self, entity: Entity) -> Result<String, StoreWriteError>;

    async fn add_entities(&self, entities: Vec<Entity>) -> Result<Vec<String>, StoreWriteError> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            ids.push(self.add_entity(entity).await?);
        }
        Ok(ids)
    }

    async fn add_relation(&self, relation: Relation) -> Result<String, StoreWriteError>;

    async fn add_relations(
        &self,
        relations: Vec<Relation>,
    ) -> Result<Vec<String>, StoreWriteError> {
        let mut ids = Vec::with_capacity(relations.len());
        for relation in relations {
            ids.push(self.add_relation(relation).await?);
        }
        Ok(ids)
    }

    /// Merge `properties` onto an existing entity (additive: later values win
    /// on key collision). Used by `EntityLinker` to update a matched existing
    /// entity instead of inserting a duplicate.
    async fn merge_entity_properties(
        &self,
        id: &str,
        properties: graph_ingest_types::PropertyMap,
    ) -> Result<(), NotFoundError>;

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, BackendError>;

    async fn get_relation(&self, id: &str) -> Result<Option<Relation>, BackendError>;

    async fn get_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, BackendError>;

    /// May fail with an error wrapping [`crate::error::UnsupportedQueryError`]
    /// if no index exists for `key`.
    async fn get_entities_by_property(
        &self,
        key: &str,
        value: &graph_ingest_types::PropertyValue,
    ) -> Result<Vec<Entity>, BackendError>;

    async fn get_neighbors(
        &self,
        id: &str,
        relation_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Entity>, BackendError>;

    async fn get_relations_by_entity(
        &self,
        source_id: &str,
        target_id: Option<&str>,
    ) -> Result<Vec<Relation>, BackendError>;

    async fn get_stats(&self) -> Result<GraphStats, BackendError>;
}

/// The error a `GraphStore` implementation can surface from an insertion.
/// `Duplicate` and `NotInitialized` are the two conditions the pipeline must
/// branch on (§4.1); everything else is an opaque backend failure.
#[derive(Debug)]
pub enum StoreWriteError {
    Duplicate(DuplicateIdError),
    NotInitialized(NotInitializedError),
    Backend(BackendError),
}

impl std::fmt::Display for StoreWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate(e) => e.fmt(f),
            Self::NotInitialized(e) => e.fmt(f),
            Self::Backend(e) => e.fmt(f),
        }
    }
}

impl error_stack::Context for StoreWriteError {}
