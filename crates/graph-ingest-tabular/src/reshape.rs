use std::collections::BTreeMap;

use error_stack::{ensure, Report, Result};
use graph_ingest_types::PropertyValue;

use crate::{
    error::ConfigurationError,
    schema_mapping::{EntityMapping, PropertyTransformation, RelationMapping, SchemaMapping},
    table::DataTable,
};

/// Threshold above which `detect_wide_format` reports a table as wide, absent
/// caller override.
pub const DEFAULT_WIDE_THRESHOLD: usize = 10;

/// Describes the transformation a [`melt`] or [`pivot`] call applied, carried
/// on [`ReshapeResult`] so callers can audit what happened to their data (§3
/// `ReshapeResult`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReshapeKind {
    Melt,
    Pivot,
}

/// The outcome of a wide↔long reshape: both shapes plus a description of the
/// operation, per §3's `ReshapeResult`.
#[derive(Debug, Clone)]
pub struct ReshapeResult {
    pub original: DataTable,
    pub reshaped: DataTable,
    pub kind: ReshapeKind,
    pub description: String,
}

/// `melt(df, id_vars, value_vars, var_name, value_name)` (§4.9): emit one row
/// per `(id_vars tuple, value_var)`, carrying the variable's column name and
/// its value.
#[tracing::instrument(level = "debug", skip_all, fields(rows = table.row_count()))]
pub fn melt(
    table: &DataTable,
    id_vars: &[String],
    value_vars: &[String],
    var_name: &str,
    value_name: &str,
) -> Result<ReshapeResult, ConfigurationError> {
    ensure!(
        !id_vars.is_empty(),
        Report::new(ConfigurationError).attach_printable("melt requires at least one id_var")
    );
    for column in id_vars.iter().chain(value_vars) {
        ensure!(
            table.column_index(column).is_some(),
            Report::new(ConfigurationError)
                .attach_printable(format!("melt references unknown column {column:?}"))
        );
    }

    let mut columns = id_vars.to_vec();
    columns.push(var_name.to_owned());
    columns.push(value_name.to_owned());
    let mut reshaped = DataTable::new(columns);

    for row in &table.rows {
        for value_var in value_vars {
            let mut new_row: Vec<PropertyValue> = id_vars
                .iter()
                .map(|id_var| table.cell(row, id_var).cloned().unwrap_or(PropertyValue::Null))
                .collect();
            new_row.push(PropertyValue::from(value_var.as_str()));
            new_row.push(
                table
                    .cell(row, value_var)
                    .cloned()
                    .unwrap_or(PropertyValue::Null),
            );
            reshaped.push_row(new_row);
        }
    }

    Ok(ReshapeResult {
        original: table.clone(),
        reshaped,
        kind: ReshapeKind::Melt,
        description: format!(
            "melted {} value column(s) against {} id column(s) into {} long rows",
            value_vars.len(),
            id_vars.len(),
            table.row_count() * value_vars.len()
        ),
    })
}

/// `pivot(df, index, columns, values)` (§4.9): the inverse of [`melt`]. Fails
/// if any `(index, columns)` pair repeats, since the target cell would be
/// ambiguous.
pub fn pivot(
    table: &DataTable,
    index: &str,
    columns: &str,
    values: &str,
) -> Result<ReshapeResult, ConfigurationError> {
    for column in [index, columns, values] {
        ensure!(
            table.column_index(column).is_some(),
            Report::new(ConfigurationError)
                .attach_printable(format!("pivot references unknown column {column:?}"))
        );
    }

    let mut column_names: Vec<String> = Vec::new();
    let mut by_index: Vec<(PropertyValue, BTreeMap<String, PropertyValue>)> = Vec::new();

    for row in &table.rows {
        let index_value = table
            .cell(row, index)
            .cloned()
            .unwrap_or(PropertyValue::Null);
        let column_value = table
            .cell(row, columns)
            .and_then(PropertyValue::display_string)
            .unwrap_or_default();
        let cell_value = table
            .cell(row, values)
            .cloned()
            .unwrap_or(PropertyValue::Null);

        if !column_names.contains(&column_value) {
            column_names.push(column_value.clone());
        }

        let entry = by_index.iter_mut().find(|(idx, _)| *idx == index_value);
        let bucket = match entry {
            Some((_, bucket)) => bucket,
            None => {
                by_index.push((index_value, BTreeMap::new()));
                &mut by_index.last_mut().expect("just pushed").1
            }
        };
        ensure!(
            !bucket.contains_key(&column_value),
            Report::new(ConfigurationError).attach_printable(format!(
                "pivot found a duplicate (index, columns) pair for column {column_value:?}"
            ))
        );
        bucket.insert(column_value, cell_value);
    }

    let mut out_columns = vec![index.to_owned()];
    out_columns.extend(column_names.iter().cloned());
    let mut reshaped = DataTable::new(out_columns);
    for (index_value, mut bucket) in by_index {
        let mut new_row = vec![index_value];
        for column_name in &column_names {
            new_row.push(bucket.remove(column_name).unwrap_or(PropertyValue::Null));
        }
        reshaped.push_row(new_row);
    }

    Ok(ReshapeResult {
        original: table.clone(),
        reshaped,
        kind: ReshapeKind::Pivot,
        description: format!("pivoted column {columns:?} into {} new columns", column_names.len()),
    })
}

/// True when the non-id column count exceeds `threshold_columns` (§4.9).
#[must_use]
pub fn detect_wide_format(table: &DataTable, id_vars: &[String], threshold_columns: usize) -> bool {
    let non_id_count = table
        .columns
        .iter()
        .filter(|c| !id_vars.contains(c))
        .count();
    non_id_count > threshold_columns
}

/// A heuristic `melt` configuration proposal, with a confidence in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct MeltSuggestion {
    pub id_vars: Vec<String>,
    pub value_vars: Vec<String>,
    pub confidence: f64,
}

/// Suggests `id_vars`/`value_vars` for a `melt` call: the leftmost low-
/// cardinality column(s) become `id_vars`, the remaining numeric columns
/// become `value_vars` (§4.9).
#[must_use]
pub fn suggest_melt_config(table: &DataTable) -> MeltSuggestion {
    let row_count = table.row_count().max(1);
    let mut id_vars = Vec::new();
    let mut value_vars = Vec::new();

    for column in &table.columns {
        let distinct = table.distinct_values(column).len();
        let low_cardinality = distinct > 0 && (distinct as f64) < (row_count as f64) * 0.5;
        if id_vars.is_empty() || (low_cardinality && value_vars.is_empty()) {
            id_vars.push(column.clone());
        } else if table.is_numeric_column(column) {
            value_vars.push(column.clone());
        }
    }

    let numeric_count = table.columns.iter().filter(|c| table.is_numeric_column(c)).count();
    let confidence = if table.columns.is_empty() {
        0.0
    } else {
        (value_vars.len() as f64 / numeric_count.max(1) as f64).clamp(0.0, 1.0)
    };

    MeltSuggestion {
        id_vars,
        value_vars,
        confidence,
    }
}

/// Builds a `SchemaMapping` that emits one entity per distinct `id_column`
/// value, one entity per distinct variable-column value, and one relation per
/// `(id, variable)` pair carrying the numeric value on the relation (§4.9).
///
/// Intended to run against a table already melted by [`melt`], where
/// `variable_column` is the `var_name` and `value_column` is the `value_name`
/// melt produced.
#[must_use]
pub fn generate_normalized_mapping(
    id_column: &str,
    entity_type: &str,
    variable_type: &str,
    relation_type: &str,
    variable_column: &str,
    value_column: &str,
) -> SchemaMapping {
    let subject_mapping = EntityMapping {
        entity_type: entity_type.to_owned(),
        source_columns: vec![id_column.to_owned()],
        property_map: BTreeMap::new(),
        id_column: Some(id_column.to_owned()),
        transformations: Vec::new(),
    };
    let variable_mapping = EntityMapping {
        entity_type: variable_type.to_owned(),
        source_columns: vec![variable_column.to_owned()],
        property_map: BTreeMap::new(),
        id_column: Some(variable_column.to_owned()),
        transformations: Vec::new(),
    };
    let relation_mapping = RelationMapping {
        relation_type: relation_type.to_owned(),
        source_columns: vec![
            id_column.to_owned(),
            variable_column.to_owned(),
            value_column.to_owned(),
        ],
        source_id_column: id_column.to_owned(),
        target_id_column: variable_column.to_owned(),
        property_map: [(value_column.to_owned(), "value".to_owned())]
            .into_iter()
            .collect(),
        transformations: vec![PropertyTransformation::TypeCast {
            source_column: value_column.to_owned(),
            property: "value".to_owned(),
            target: graph_ingest_types::ScalarType::Float,
        }],
    };

    SchemaMapping {
        entities: vec![subject_mapping, variable_mapping],
        relations: vec![relation_mapping],
    }
}
