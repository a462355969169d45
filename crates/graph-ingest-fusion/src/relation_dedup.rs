use std::collections::HashMap;

use graph_ingest_types::Relation;

/// Collapses duplicate relations within a batch (§4.6). Canonicalisation key
/// is `(relation_type, source_id, target_id)`; on collision, properties merge
/// with later values winning and provenance concatenates, mirroring
/// `EntityDeduplicator`'s merge policy exactly.
#[derive(Debug, Default)]
pub struct RelationDeduplicator;

impl RelationDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[tracing::instrument(level = "debug", skip_all, fields(input = candidates.len()))]
    pub fn deduplicate(&self, candidates: Vec<Relation>) -> Vec<Relation> {
        let mut order: Vec<(String, String, String)> = Vec::new();
        let mut by_key: HashMap<(String, String, String), Relation> = HashMap::new();

        for candidate in candidates {
            let key = (
                candidate.relation_type.clone(),
                candidate.source_id.clone(),
                candidate.target_id.clone(),
            );
            match by_key.get_mut(&key) {
                Some(existing) => existing.merge_from(&candidate),
                None => {
                    order.push(key.clone());
                    by_key.insert(key, candidate);
                }
            }
        }

        order.into_iter().filter_map(|key| by_key.remove(&key)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(id: &str, source: &str, target: &str) -> Relation {
        Relation::new(id, "WORKS_FOR", source, target)
    }

    #[test]
    fn duplicate_endpoint_triples_collapse() {
        let dedup = RelationDeduplicator::new();
        let out = dedup.deduplicate(vec![rel("r1", "a", "b"), rel("r2", "a", "b")]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn distinct_endpoints_are_kept() {
        let dedup = RelationDeduplicator::new();
        let out = dedup.deduplicate(vec![rel("r1", "a", "b"), rel("r2", "a", "c")]);
        assert_eq!(out.len(), 2);
    }
}
