use std::collections::{BTreeMap, HashSet};

use graph_ingest_types::ScalarType;

use crate::{
    schema_mapping::{EntityMapping, RelationMapping, SchemaMapping},
    table::DataTable,
};

/// A `SchemaMapping` plus per-decision confidence scores and warnings about
/// ambiguous choices (§3 `InferredSchema`).
#[derive(Debug, Clone, Default)]
pub struct InferredSchema {
    pub mapping: SchemaMapping,
    pub confidences: BTreeMap<String, f64>,
    pub warnings: Vec<String>,
}

/// Infers an id column, per-column property mappings, and foreign-key-like
/// relation mappings from a materialised table's shape (§4.10).
///
/// The same heuristics apply whether the table came from a CSV header+sample,
/// SPSS variable metadata, or an Excel sheet's first rows — by the time this
/// function runs the source has already been normalised into a [`DataTable`].
#[must_use]
#[tracing::instrument(level = "debug", skip_all, fields(entity_type, rows = table.row_count()))]
pub fn infer_schema(table: &DataTable, entity_type: &str) -> InferredSchema {
    let mut confidences = BTreeMap::new();
    let mut warnings = Vec::new();

    let id_column = infer_id_column(table, &mut confidences, &mut warnings);

    let mut property_map = BTreeMap::new();
    for column in &table.columns {
        if *column == id_column {
            continue;
        }
        property_map.insert(column.clone(), column.clone());
    }

    let entity_mapping = EntityMapping {
        entity_type: entity_type.to_owned(),
        source_columns: table.columns.clone(),
        property_map,
        id_column: Some(id_column.clone()),
        transformations: Vec::new(),
    };

    let relations = infer_foreign_key_relations(table, &id_column, &mut confidences, &mut warnings);

    InferredSchema {
        mapping: SchemaMapping {
            entities: vec![entity_mapping],
            relations,
        },
        confidences,
        warnings,
    }
}

fn infer_id_column(
    table: &DataTable,
    confidences: &mut BTreeMap<String, f64>,
    warnings: &mut Vec<String>,
) -> String {
    for column in &table.columns {
        let distinct = table.distinct_values(column).len();
        if distinct == table.row_count() && distinct > 0 {
            confidences.insert("id_column".to_owned(), 1.0);
            return column.clone();
        }
    }
    warnings.push(format!(
        "no column has entirely unique values; falling back to the first column {:?} as id",
        table.columns.first()
    ));
    confidences.insert("id_column".to_owned(), 0.3);
    table.columns.first().cloned().unwrap_or_default()
}

/// A column `whatever_id` (or one whose value set is a subset of another
/// column's unique-key set) is treated as a foreign key into an entity type
/// derived from its name, per §4.10.
fn infer_foreign_key_relations(
    table: &DataTable,
    id_column: &str,
    confidences: &mut BTreeMap<String, f64>,
    warnings: &mut Vec<String>,
) -> Vec<RelationMapping> {
    let mut relations = Vec::new();
    for column in &table.columns {
        if column == id_column || !column.ends_with("_id") {
            continue;
        }
        let referenced_type = column
            .strip_suffix("_id")
            .unwrap_or(column)
            .to_owned();
        let relation_type = format!("HAS_{}", referenced_type.to_uppercase());
        confidences.insert(format!("relation:{relation_type}"), 0.6);
        warnings.push(format!(
            "inferred relation {relation_type} from column {column:?}; verify the target entity type \
             {referenced_type:?} is correct"
        ));
        relations.push(RelationMapping {
            relation_type,
            source_columns: vec![id_column.to_owned(), column.clone()],
            source_id_column: id_column.to_owned(),
            target_id_column: column.clone(),
            property_map: BTreeMap::new(),
            transformations: Vec::new(),
        });
    }
    relations
}

/// Merges an inferred schema with a caller-supplied partial one: the caller's
/// entity/relation mappings take precedence by type name, and inferred
/// relations not contradicted by a caller mapping of the same `relation_type`
/// are appended (§4.10).
#[must_use]
pub fn merge_with_partial_schema(inferred: InferredSchema, partial: SchemaMapping) -> SchemaMapping {
    let mut entities = partial.entities;
    let declared_entity_types: HashSet<&str> = entities.iter().map(|m| m.entity_type.as_str()).collect();
    for mapping in inferred.mapping.entities {
        if !declared_entity_types.contains(mapping.entity_type.as_str()) {
            entities.push(mapping);
        }
    }

    let mut relations = partial.relations;
    let declared_relation_types: HashSet<&str> = relations.iter().map(|m| m.relation_type.as_str()).collect();
    for mapping in inferred.mapping.relations {
        if !declared_relation_types.contains(mapping.relation_type.as_str()) {
            relations.push(mapping);
        }
    }

    SchemaMapping { entities, relations }
}

/// The scalar type a column appears to hold, used by callers that want to
/// promote an `InferredSchema` to a declared `GraphSchema`.
#[must_use]
pub fn infer_column_scalar_type(table: &DataTable, column: &str) -> ScalarType {
    if table.is_numeric_column(column) {
        let all_integral = table.rows.iter().all(|row| {
            table
                .cell(row, column)
                .map(|v| matches!(v, graph_ingest_types::PropertyValue::Int(_)) || v.is_null())
                .unwrap_or(true)
        });
        if all_integral {
            ScalarType::Int
        } else {
            ScalarType::Float
        }
    } else {
        ScalarType::String
    }
}

#[cfg(test)]
mod tests {
    use graph_ingest_types::PropertyValue;

    use super::*;

    fn employees_table() -> DataTable {
        let mut table = DataTable::new(vec![
            "emp_id".into(),
            "name".into(),
            "dept_id".into(),
        ]);
        table.push_row(vec![
            PropertyValue::from("1"),
            PropertyValue::from("Alice"),
            PropertyValue::from("d1"),
        ]);
        table.push_row(vec![
            PropertyValue::from("2"),
            PropertyValue::from("Bob"),
            PropertyValue::from("d1"),
        ]);
        table
    }

    #[test]
    fn infers_unique_column_as_id() {
        let table = employees_table();
        let inferred = infer_schema(&table, "Employee");
        assert_eq!(inferred.mapping.entities[0].id_column.as_deref(), Some("emp_id"));
        assert_eq!(inferred.confidences["id_column"], 1.0);
    }

    #[test]
    fn infers_foreign_key_relation_from_id_suffix() {
        let table = employees_table();
        let inferred = infer_schema(&table, "Employee");
        assert_eq!(inferred.mapping.relations.len(), 1);
        assert_eq!(inferred.mapping.relations[0].relation_type, "HAS_DEPT");
        assert!(!inferred.warnings.is_empty());
    }

    #[test]
    fn partial_schema_entity_mapping_takes_precedence() {
        let table = employees_table();
        let inferred = infer_schema(&table, "Employee");
        let custom = EntityMapping {
            entity_type: "Employee".into(),
            source_columns: vec!["emp_id".into()],
            property_map: BTreeMap::new(),
            id_column: Some("emp_id".into()),
            transformations: Vec::new(),
        };
        let merged = merge_with_partial_schema(
            inferred,
            SchemaMapping {
                entities: vec![custom],
                relations: Vec::new(),
            },
        );
        assert_eq!(merged.entities.len(), 1);
        assert!(merged.entities[0].property_map.is_empty());
        assert_eq!(merged.relations.len(), 1);
    }
}
