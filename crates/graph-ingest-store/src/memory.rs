use std::{
    collections::HashMap,
    sync::{Mutex, RwLock},
};

use async_trait::async_trait;
use error_stack::{Report, Result, ResultExt};
use graph_ingest_types::{Entity, PropertyMap, PropertyValue, Relation};

use crate::{
    error::{BackendError, DuplicateIdError, NotFoundError},
    property_optimizer::{PropertyOptimizer, PropertyOptimizerConfig, StoredProperties},
    store::{Direction, GraphStats, GraphStore, StoreWriteError},
};

/// An entity as it actually sits in the backend: identity and embedding in
/// the clear, properties behind whatever `PropertyOptimizer::encode` decided
/// (materialised or compressed per §4.2). Every read path must go back
/// through `PropertyOptimizer::decode` before handing an `Entity` to a caller.
struct StoredEntity {
    id: String,
    entity_type: String,
    properties: StoredProperties,
    embedding: Option<Vec<f32>>,
    provenance: Vec<graph_ingest_types::Provenance>,
}

/// Reference [`GraphStore`] implementation, grounded in the teacher's own
/// in-memory test double (`graph::store::test_graph`). Not a production
/// backend — it holds everything in process memory with no persistence — but
/// a complete, correct implementation of the trait, used throughout this
/// workspace's test suites and as a runnable example for implementers.
///
/// Read-your-writes only: a reader observes every write this handle has
/// completed before the read started, but makes no isolation guarantee
/// across concurrent writers mid-batch (§9 Open Questions).
pub struct InMemoryGraphStore {
    initialised: std::sync::atomic::AtomicBool,
    entities: RwLock<HashMap<String, StoredEntity>>,
    relations: RwLock<HashMap<String, Relation>>,
    optimizer: Mutex<PropertyOptimizer>,
    embedding_dimension: Mutex<Option<usize>>,
}

fn materialize(stored: &StoredEntity) -> Entity {
    Entity {
        id: stored.id.clone(),
        entity_type: stored.entity_type.clone(),
        properties: PropertyOptimizer::decode(&stored.properties),
        embedding: stored.embedding.clone(),
        provenance: stored.provenance.clone(),
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new(PropertyOptimizerConfig::default())
    }
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new(optimizer_config: PropertyOptimizerConfig) -> Self {
        Self {
            initialised: std::sync::atomic::AtomicBool::new(false),
            entities: RwLock::new(HashMap::new()),
            relations: RwLock::new(HashMap::new()),
            optimizer: Mutex::new(PropertyOptimizer::new(optimizer_config)),
            embedding_dimension: Mutex::new(None),
        }
    }

    /// Declare `key` as indexed and rebuild from current contents. Exposed
    /// directly (rather than only through `PropertyOptimizerConfig`) because
    /// §4.2 requires indexes to be addable after entities already exist.
    pub fn add_property_index(&self, key: impl Into<String>) {
        let entities: Vec<Entity> = self.entities.read().unwrap().values().map(materialize).collect();
        self.optimizer.lock().unwrap().add_index(key, &entities);
    }

    fn check_embedding_dimension(&self, entity: &Entity) -> Result<(), BackendError> {
        let Some(embedding) = &entity.embedding else {
            return Ok(());
        };
        let mut dim = self.embedding_dimension.lock().unwrap();
        match *dim {
            Some(expected) if expected != embedding.len() => {
                return Err(Report::new(BackendError).attach_printable(format!(
                    "embedding dimension mismatch: expected {expected}, got {}",
                    embedding.len()
                )));
            }
            Some(_) => {}
            None => *dim = Some(embedding.len()),
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn initialise(&self) -> Result<(), BackendError> {
        self.initialised
            .store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.initialised
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn add_entity(&self, entity: Entity) -> Result<String, StoreWriteError> {
        self.check_embedding_dimension(&entity)
            .change_context(StoreWriteError::Backend(BackendError))?;
        let mut entities = self.entities.write().unwrap();
        if entities.contains_key(&entity.id) {
            return Err(Report::new(StoreWriteError::Duplicate(DuplicateIdError)));
        }
        let id = entity.id.clone();
        let mut optimizer = self.optimizer.lock().unwrap();
        let stored_properties = optimizer.encode(&entity.properties);
        optimizer.observe_write(&entity);
        drop(optimizer);
        entities.insert(
            id.clone(),
            StoredEntity {
                id: entity.id,
                entity_type: entity.entity_type,
                properties: stored_properties,
                embedding: entity.embedding,
                provenance: entity.provenance,
            },
        );
        Ok(id)
    }

    async fn add_relation(&self, relation: Relation) -> Result<String, StoreWriteError> {
        let mut relations = self.relations.write().unwrap();
        if relations.contains_key(&relation.id) {
            return Err(Report::new(StoreWriteError::Duplicate(DuplicateIdError)));
        }
        let id = relation.id.clone();
        relations.insert(id.clone(), relation);
        Ok(id)
    }

    async fn merge_entity_properties(
        &self,
        id: &str,
        properties: PropertyMap,
    ) -> Result<(), NotFoundError> {
        let mut entities = self.entities.write().unwrap();
        let stored = entities.get_mut(id).ok_or_else(|| Report::new(NotFoundError))?;
        let mut decoded = PropertyOptimizer::decode(&stored.properties);
        for (key, value) in properties {
            decoded.insert(key, value);
        }
        let mut optimizer = self.optimizer.lock().unwrap();
        stored.properties = optimizer.encode(&decoded);
        let snapshot = Entity {
            id: stored.id.clone(),
            entity_type: stored.entity_type.clone(),
            properties: decoded,
            embedding: stored.embedding.clone(),
            provenance: stored.provenance.clone(),
        };
        optimizer.observe_write(&snapshot);
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, BackendError> {
        Ok(self.entities.read().unwrap().get(id).map(materialize))
    }

    async fn get_relation(&self, id: &str) -> Result<Option<Relation>, BackendError> {
        Ok(self.relations.read().unwrap().get(id).cloned())
    }

    async fn get_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, BackendError> {
        Ok(self
            .entities
            .read()
            .unwrap()
            .values()
            .filter(|e| e.entity_type == entity_type)
            .map(materialize)
            .collect())
    }

    async fn get_entities_by_property(
        &self,
        key: &str,
        value: &PropertyValue,
    ) -> Result<Vec<Entity>, BackendError> {
        let optimizer = self.optimizer.lock().unwrap();
        if let Some(ids) = optimizer.lookup(key, value) {
            let entities = self.entities.read().unwrap();
            return Ok(ids.iter().filter_map(|id| entities.get(id).map(materialize)).collect());
        }
        drop(optimizer);
        // Unindexed: O(N) linear scan, as permitted (but not preferred) by §4.2.
        Ok(self
            .entities
            .read()
            .unwrap()
            .values()
            .map(materialize)
            .filter(|e| e.properties.get(key) == Some(value))
            .collect())
    }

    async fn get_neighbors(
        &self,
        id: &str,
        relation_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Entity>, BackendError> {
        let relations = self.relations.read().unwrap();
        let entities = self.entities.read().unwrap();
        let mut neighbor_ids: Vec<String> = Vec::new();
        for relation in relations.values() {
            if let Some(wanted) = relation_type {
                if relation.relation_type != wanted {
                    continue;
                }
            }
            let outgoing = relation.source_id == id;
            let incoming = relation.target_id == id;
            match direction {
                Direction::Outgoing if outgoing => neighbor_ids.push(relation.target_id.clone()),
                Direction::Incoming if incoming => neighbor_ids.push(relation.source_id.clone()),
                Direction::Both if outgoing => neighbor_ids.push(relation.target_id.clone()),
                Direction::Both if incoming => neighbor_ids.push(relation.source_id.clone()),
                _ => {}
            }
        }
        Ok(neighbor_ids
            .into_iter()
            .filter_map(|nid| entities.get(&nid).map(materialize))
            .collect())
    }

    async fn get_relations_by_entity(
        &self,
        source_id: &str,
        target_id: Option<&str>,
    ) -> Result<Vec<Relation>, BackendError> {
        Ok(self
            .relations
            .read()
            .unwrap()
            .values()
            .filter(|r| {
                (r.source_id == source_id || r.target_id == source_id)
                    && target_id.map_or(true, |t| r.source_id == t || r.target_id == t)
            })
            .cloned()
            .collect())
    }

    async fn get_stats(&self) -> Result<GraphStats, BackendError> {
        Ok(GraphStats {
            entity_count: self.entities.read().unwrap().len(),
            relation_count: self.relations.read().unwrap().len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use graph_ingest_types::{Entity, Relation};

    use super::*;

    #[tokio::test]
    async fn add_then_get_entity_round_trips() {
        let store = InMemoryGraphStore::default();
        store.initialise().await.unwrap();
        let entity = Entity::new("e1", "Person");
        store.add_entity(entity.clone()).await.unwrap();
        assert_eq!(store.get_entity("e1").await.unwrap(), Some(entity));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = InMemoryGraphStore::default();
        store.add_entity(Entity::new("e1", "Person")).await.unwrap();
        let err = store.add_entity(Entity::new("e1", "Person")).await;
        assert!(matches!(
            err.unwrap_err().current_context(),
            StoreWriteError::Duplicate(_)
        ));
    }

    #[tokio::test]
    async fn neighbors_respect_direction() {
        let store = InMemoryGraphStore::default();
        store.add_entity(Entity::new("a", "Person")).await.unwrap();
        store.add_entity(Entity::new("b", "Person")).await.unwrap();
        store
            .add_relation(Relation::new("r1", "KNOWS", "a", "b"))
            .await
            .unwrap();
        let outgoing = store
            .get_neighbors("a", None, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].id, "b");
        let incoming = store
            .get_neighbors("a", None, Direction::Incoming)
            .await
            .unwrap();
        assert!(incoming.is_empty());
    }

    #[tokio::test]
    async fn mismatched_embedding_dimension_is_rejected() {
        let store = InMemoryGraphStore::default();
        let mut e1 = Entity::new("a", "Person");
        e1.embedding = Some(vec![0.0, 1.0]);
        store.add_entity(e1).await.unwrap();
        let mut e2 = Entity::new("b", "Person");
        e2.embedding = Some(vec![0.0, 1.0, 2.0]);
        assert!(store.add_entity(e2).await.is_err());
    }

    #[tokio::test]
    async fn sparse_storage_drops_null_properties_through_the_store() {
        let store = InMemoryGraphStore::new(PropertyOptimizerConfig {
            sparse_storage: true,
            ..PropertyOptimizerConfig::default()
        });
        let entity = Entity::new("a", "Person").with_properties(
            [
                ("name".to_owned(), PropertyValue::from("Alice")),
                ("nickname".to_owned(), PropertyValue::Null),
            ]
            .into_iter()
            .collect(),
        );
        store.add_entity(entity).await.unwrap();
        let stored = store.get_entity("a").await.unwrap().unwrap();
        assert!(!stored.properties.contains_key("nickname"));
        assert_eq!(stored.properties.get("name"), Some(&PropertyValue::from("Alice")));
    }

    #[tokio::test]
    async fn compressed_properties_round_trip_through_the_store() {
        let store = InMemoryGraphStore::new(PropertyOptimizerConfig {
            compression: true,
            compression_threshold: 1,
            ..PropertyOptimizerConfig::default()
        });
        let properties: PropertyMap = [
            ("a".to_owned(), PropertyValue::from(1_i64)),
            ("b".to_owned(), PropertyValue::from(2_i64)),
        ]
        .into_iter()
        .collect();
        store
            .add_entity(Entity::new("e1", "Thing").with_properties(properties.clone()))
            .await
            .unwrap();
        let stored = store.get_entity("e1").await.unwrap().unwrap();
        assert_eq!(stored.properties, properties);

        store
            .merge_entity_properties(
                "e1",
                [("c".to_owned(), PropertyValue::from(3_i64))].into_iter().collect(),
            )
            .await
            .unwrap();
        let merged = store.get_entity("e1").await.unwrap().unwrap();
        assert_eq!(merged.properties.get("c"), Some(&PropertyValue::from(3_i64)));
        assert_eq!(merged.properties.get("a"), Some(&PropertyValue::from(1_i64)));
    }
}
