use serde::{Deserialize, Serialize};

use crate::{property::PropertyMap, provenance::Provenance};

/// A typed graph node.
///
/// `id` is caller- or extractor-assigned and must be unique within a single
/// store — see the `graph-ingest-store` crate for the storage contract itself;
/// this type only carries the shape of the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: String,
    pub properties: PropertyMap,
    pub embedding: Option<Vec<f32>>,
    pub provenance: Vec<Provenance>,
}

impl Entity {
    #[must_use]
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            properties: PropertyMap::new(),
            embedding: None,
            provenance: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance.push(provenance);
        self
    }

    /// The value of the configured name property, if present and string-like.
    #[must_use]
    pub fn name_value(&self, name_property: &str) -> Option<String> {
        self.properties.get(name_property)?.display_string()
    }

    /// Merge `other`'s properties into `self`, later values winning on key
    /// collision, and concatenate provenance. Used by deduplication, linking,
    /// and relation-merge paths alike so merge semantics stay in one place.
    pub fn merge_from(&mut self, other: &Entity) {
        for (key, value) in &other.properties {
            self.properties.insert(key.clone(), value.clone());
        }
        self.provenance.extend(other.provenance.iter().cloned());
        if self.embedding.is_none() {
            self.embedding = other.embedding.clone();
        }
    }
}
