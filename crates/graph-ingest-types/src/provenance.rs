use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::property::PropertyMap;

/// Origin metadata attached to a persisted entity or relation.
///
/// A record may accumulate more than one [`Provenance`] entry over its lifetime
/// (e.g. when deduplication merges two candidates that came from different
/// chunks); entries are concatenated, never overwritten, so the full history of
/// contributing sources survives a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub metadata: PropertyMap,
}

impl Provenance {
    #[must_use]
    pub fn new(source_id: impl Into<String>, recorded_at: OffsetDateTime) -> Self {
        Self {
            source_id: source_id.into(),
            recorded_at,
            metadata: PropertyMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: PropertyMap) -> Self {
        self.metadata = metadata;
        self
    }
}
