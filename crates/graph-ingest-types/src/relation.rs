use serde::{Deserialize, Serialize};

use crate::{property::PropertyMap, provenance::Provenance};

/// A typed, directed graph edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub relation_type: String,
    pub source_id: String,
    pub target_id: String,
    pub properties: PropertyMap,
    pub provenance: Vec<Provenance>,
}

impl Relation {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        relation_type: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            relation_type: relation_type.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            properties: PropertyMap::new(),
            provenance: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    pub fn merge_from(&mut self, other: &Relation) {
        for (key, value) in &other.properties {
            self.properties.insert(key.clone(), value.clone());
        }
        self.provenance.extend(other.provenance.iter().cloned());
    }
}
