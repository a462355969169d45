use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The scalar type declared for a schema property. Distinct from
/// [`PropertyValue`](crate::PropertyValue) because a schema describes a *type*,
/// not a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    String,
    List,
    Dict,
}

/// Declares, for one relation type, which `(source_type, target_type)` pairs
/// are permitted and which property keys are required vs. merely allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationTypeSchema {
    pub allowed_endpoint_pairs: BTreeSet<(String, String)>,
    pub required_properties: BTreeMap<String, ScalarType>,
    pub optional_properties: BTreeMap<String, ScalarType>,
}

/// Declares, for one entity type, which property keys are required vs. allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityTypeSchema {
    pub required_properties: BTreeMap<String, ScalarType>,
    pub optional_properties: BTreeMap<String, ScalarType>,
}

/// An optional declared graph schema. When absent, schema-dependent validation
/// (`RelationValidator`, schema-aware parts of `SchemaMapping`) is skipped
/// entirely rather than failing closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    pub entity_types: BTreeMap<String, EntityTypeSchema>,
    pub relation_types: BTreeMap<String, RelationTypeSchema>,
}

impl GraphSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_entity_type(&mut self, entity_type: impl Into<String>, schema: EntityTypeSchema) {
        self.entity_types.insert(entity_type.into(), schema);
    }

    pub fn declare_relation_type(
        &mut self,
        relation_type: impl Into<String>,
        schema: RelationTypeSchema,
    ) {
        self.relation_types.insert(relation_type.into(), schema);
    }

    /// Whether `(source_type, relation_type, target_type)` is a permitted triple.
    #[must_use]
    pub fn allows_triple(&self, source_type: &str, relation_type: &str, target_type: &str) -> bool {
        self.relation_types
            .get(relation_type)
            .is_some_and(|schema| {
                schema
                    .allowed_endpoint_pairs
                    .contains(&(source_type.to_owned(), target_type.to_owned()))
            })
    }

    #[must_use]
    pub fn required_relation_properties(&self, relation_type: &str) -> BTreeSet<String> {
        self.relation_types
            .get(relation_type)
            .map(|schema| schema.required_properties.keys().cloned().collect())
            .unwrap_or_default()
    }
}
