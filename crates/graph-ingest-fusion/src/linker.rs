use std::fmt;

use error_stack::{Context, Result};
use graph_ingest_store::{BackendError, GraphStore};
use graph_ingest_types::{canonical_name_key, Entity};

use crate::similarity::{ExactCanonicalName, NameSimilarity};

pub struct LinkerConfig {
    pub name_property: String,
    pub similarity: Box<dyn NameSimilarity>,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            name_property: "name".to_owned(),
            similarity: Box::new(ExactCanonicalName),
        }
    }
}

/// The outcome of matching one candidate entity against the store (§4.5).
pub struct LinkResult {
    pub linked: bool,
    pub existing: Option<Entity>,
    pub candidate: Entity,
}

#[derive(Debug)]
pub struct LinkQueryError;

impl fmt::Display for LinkQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("entity linker could not query the store")
    }
}

impl Context for LinkQueryError {}

/// Matches new entities against the existing graph, so that fusion never
/// inserts a duplicate of something the store already has (§4.5).
///
/// Results are advisory: the actual write path still goes through
/// `GraphStore::add_entity`/`merge_entity_properties`, which re-checks by id
/// at write time, because the store may have been written to concurrently
/// since this lookup (§5).
pub struct EntityLinker<'s> {
    store: &'s dyn GraphStore,
    config: LinkerConfig,
}

impl<'s> EntityLinker<'s> {
    #[must_use]
    pub fn new(store: &'s dyn GraphStore, config: LinkerConfig) -> Self {
        Self { store, config }
    }

    /// Link every candidate, querying the store once per distinct entity type
    /// present in `candidates`.
    pub async fn link_all(&self, candidates: Vec<Entity>) -> Result<Vec<LinkResult>, LinkQueryError> {
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            results.push(self.link_one(candidate).await?);
        }
        Ok(results)
    }

    async fn link_one(&self, candidate: Entity) -> Result<LinkResult, LinkQueryError> {
        let Some(candidate_name) = candidate.name_value(&self.config.name_property) else {
            return Ok(LinkResult {
                linked: false,
                existing: None,
                candidate,
            });
        };
        let candidate_key = canonical_name_key(&candidate_name);

        let existing_of_type: Vec<Entity> = self
            .store
            .get_entities_by_type(&candidate.entity_type)
            .await
            .map_err(convert_backend_error)?;

        let mut matches: Vec<Entity> = existing_of_type
            .into_iter()
            .filter(|existing| {
                existing
                    .name_value(&self.config.name_property)
                    .map(|n| canonical_name_key(&n))
                    .is_some_and(|existing_key| self.config.similarity.matches(&existing_key, &candidate_key))
            })
            .collect();

        // Tie-break: highest property count, then lowest id lexicographically.
        matches.sort_by(|a, b| {
            b.properties
                .len()
                .cmp(&a.properties.len())
                .then_with(|| a.id.cmp(&b.id))
        });

        match matches.into_iter().next() {
            Some(existing) => Ok(LinkResult {
                linked: true,
                existing: Some(existing),
                candidate,
            }),
            None => Ok(LinkResult {
                linked: false,
                existing: None,
                candidate,
            }),
        }
    }
}

fn convert_backend_error(report: error_stack::Report<BackendError>) -> error_stack::Report<LinkQueryError> {
    report.change_context(LinkQueryError)
}

#[cfg(test)]
mod tests {
    use graph_ingest_store::InMemoryGraphStore;
    use graph_ingest_types::PropertyValue;

    use super::*;

    fn person(id: &str, name: &str, extra_props: usize) -> Entity {
        let mut props = graph_ingest_types::PropertyMap::new();
        props.insert("name".to_owned(), PropertyValue::from(name));
        for i in 0..extra_props {
            props.insert(format!("prop{i}"), PropertyValue::from(i as i64));
        }
        Entity::new(id, "Person").with_properties(props)
    }

    #[tokio::test]
    async fn links_to_existing_entity_with_same_name() {
        let store = InMemoryGraphStore::default();
        store.add_entity(person("existing-1", "Alice", 0)).await.unwrap();

        let linker = EntityLinker::new(&store, LinkerConfig::default());
        let results = linker.link_all(vec![person("candidate", "Alice", 0)]).await.unwrap();

        assert!(results[0].linked);
        assert_eq!(results[0].existing.as_ref().unwrap().id, "existing-1");
    }

    #[tokio::test]
    async fn prefers_match_with_more_properties_then_lowest_id() {
        let store = InMemoryGraphStore::default();
        store.add_entity(person("b", "Alice", 1)).await.unwrap();
        store.add_entity(person("a", "Alice", 2)).await.unwrap();
        store.add_entity(person("c", "Alice", 2)).await.unwrap();

        let linker = EntityLinker::new(&store, LinkerConfig::default());
        let results = linker.link_all(vec![person("candidate", "Alice", 0)]).await.unwrap();

        assert_eq!(results[0].existing.as_ref().unwrap().id, "a");
    }

    #[tokio::test]
    async fn no_match_is_not_linked() {
        let store = InMemoryGraphStore::default();
        let linker = EntityLinker::new(&store, LinkerConfig::default());
        let results = linker.link_all(vec![person("candidate", "Alice", 0)]).await.unwrap();
        assert!(!results[0].linked);
    }
}
