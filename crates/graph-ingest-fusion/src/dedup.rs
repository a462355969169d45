use graph_ingest_types::{canonical_name_key, Entity};

use crate::similarity::{ExactCanonicalName, NameSimilarity};

/// Configures [`EntityDeduplicator`] (§4.4).
pub struct DedupConfig {
    /// The property key whose value is normalised into a canonical name key.
    pub name_property: String,
    pub similarity: Box<dyn NameSimilarity>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            name_property: "name".to_owned(),
            similarity: Box::new(ExactCanonicalName),
        }
    }
}

/// Merges near-duplicate entities within a single extraction batch (§4.4).
///
/// Canonicalisation key is `(entity_type, canonical_name)`; entities lacking
/// the configured name property pass through untouched, since they have
/// nothing to canonicalise on.
pub struct EntityDeduplicator {
    config: DedupConfig,
}

/// How many input candidates were folded into each surviving entity, plus
/// the overall count removed — `build_from_text`/`StructuredPipeline` surface
/// `deduplicated` as `input_count - output.len()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input_count: usize,
    pub output_count: usize,
}

impl DedupStats {
    #[must_use]
    pub const fn deduplicated(&self) -> usize {
        self.input_count - self.output_count
    }
}

impl EntityDeduplicator {
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Deduplicate `candidates`, preserving the order of first appearance.
    #[tracing::instrument(level = "debug", skip_all, fields(input = candidates.len()))]
    pub fn deduplicate(&self, candidates: Vec<Entity>) -> (Vec<Entity>, DedupStats) {
        let input_count = candidates.len();
        let mut merged: Vec<Entity> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let Some(candidate_name) = candidate.name_value(&self.config.name_property) else {
                merged.push(candidate);
                continue;
            };
            let candidate_key = canonical_name_key(&candidate_name);

            let existing = merged.iter_mut().find(|existing| {
                existing.entity_type == candidate.entity_type
                    && existing
                        .name_value(&self.config.name_property)
                        .map(|n| canonical_name_key(&n))
                        .is_some_and(|existing_key| {
                            self.config.similarity.matches(&existing_key, &candidate_key)
                        })
            });

            match existing {
                Some(existing) => existing.merge_from(&candidate),
                None => merged.push(candidate),
            }
        }

        let stats = DedupStats {
            input_count,
            output_count: merged.len(),
        };
        (merged, stats)
    }
}
