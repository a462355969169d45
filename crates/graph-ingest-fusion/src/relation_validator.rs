use graph_ingest_types::{GraphSchema, Relation};

/// One relation that was rejected by [`RelationValidator`], with the reason.
#[derive(Debug, Clone)]
pub struct RelationRejection {
    pub relation: Relation,
    pub reason: String,
}

/// Enforces schema-declared type constraints on relations (§4.7). With no
/// schema, every relation passes through unchanged — schema validation is
/// opt-in, never fail-closed by default (§9 Schema optionality).
pub struct RelationValidator<'s> {
    schema: Option<&'s GraphSchema>,
}

impl<'s> RelationValidator<'s> {
    #[must_use]
    pub fn new(schema: Option<&'s GraphSchema>) -> Self {
        Self { schema }
    }

    /// Partition `relations` into the ones that satisfy the schema and the
    /// ones rejected, each carrying the endpoint's declared type.
    pub fn validate(
        &self,
        relations: Vec<Relation>,
        entity_type_of: impl Fn(&str) -> Option<String>,
    ) -> (Vec<Relation>, Vec<RelationRejection>) {
        let Some(schema) = self.schema else {
            return (relations, Vec::new());
        };

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for relation in relations {
            let source_type = entity_type_of(&relation.source_id);
            let target_type = entity_type_of(&relation.target_id);

            let (Some(source_type), Some(target_type)) = (source_type, target_type) else {
                rejected.push(RelationRejection {
                    reason: "endpoint entity type could not be resolved".to_owned(),
                    relation,
                });
                continue;
            };

            if !schema.allows_triple(&source_type, &relation.relation_type, &target_type) {
                rejected.push(RelationRejection {
                    reason: format!(
                        "({source_type}, {}, {target_type}) is not a permitted relation triple",
                        relation.relation_type
                    ),
                    relation,
                });
                continue;
            }

            let required = schema.required_relation_properties(&relation.relation_type);
            let missing: Vec<&String> = required
                .iter()
                .filter(|key| !relation.properties.contains_key(*key))
                .collect();
            if !missing.is_empty() {
                rejected.push(RelationRejection {
                    reason: format!("missing required properties: {missing:?}"),
                    relation,
                });
                continue;
            }

            accepted.push(relation);
        }

        (accepted, rejected)
    }
}
