use std::collections::BTreeMap;

use error_stack::{ensure, Report, Result};
use graph_ingest_types::{Entity, PropertyMap, PropertyValue, Relation, ScalarType};

use crate::{
    error::{ConfigurationError, TransformationError},
    table::{DataTable, Row},
};

/// A pure, named function over a fixed set of input columns (§4.8 COMPUTE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeFunction {
    ConcatSpace,
    Sum,
    Avg,
    Min,
    Max,
}

impl ComputeFunction {
    fn apply(self, inputs: &[&PropertyValue]) -> PropertyValue {
        match self {
            Self::ConcatSpace => PropertyValue::String(
                inputs
                    .iter()
                    .filter_map(|v| v.display_string())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Self::Sum => PropertyValue::Float(inputs.iter().filter_map(|v| v.as_f64()).sum()),
            Self::Avg => {
                let values: Vec<f64> = inputs.iter().filter_map(|v| v.as_f64()).collect();
                let avg = if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                };
                PropertyValue::Float(avg)
            }
            Self::Min => PropertyValue::Float(
                inputs
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .fold(f64::INFINITY, f64::min),
            ),
            Self::Max => PropertyValue::Float(
                inputs
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .fold(f64::NEG_INFINITY, f64::max),
            ),
        }
    }
}

/// One step in an `EntityMapping`/`RelationMapping`'s transformation pipeline
/// (§4.8). Steps run in declaration order against the property map built so
/// far from `property_map` and the row's raw cells.
#[derive(Debug, Clone)]
pub enum PropertyTransformation {
    Rename {
        source_column: String,
        property: String,
    },
    TypeCast {
        source_column: String,
        property: String,
        target: ScalarType,
    },
    Constant {
        property: String,
        value: PropertyValue,
    },
    Compute {
        property: String,
        function: ComputeFunction,
        inputs: Vec<String>,
    },
    Skip {
        property: String,
    },
}

impl PropertyTransformation {
    /// Source columns this step reads from, for `SchemaMapping::validate`.
    fn referenced_columns(&self) -> Vec<&str> {
        match self {
            Self::Rename { source_column, .. } | Self::TypeCast { source_column, .. } => {
                vec![source_column.as_str()]
            }
            Self::Compute { inputs, .. } => inputs.iter().map(String::as_str).collect(),
            Self::Constant { .. } | Self::Skip { .. } => Vec::new(),
        }
    }
}

/// Coerces `raw` into `target`'s scalar shape, per the cast rules in §4.8.
fn cast_scalar(raw: &PropertyValue, target: ScalarType) -> Result<PropertyValue, TransformationError> {
    match target {
        ScalarType::Bool => cast_bool(raw),
        ScalarType::Int => raw
            .as_f64()
            .map(|f| PropertyValue::Int(f as i64))
            .ok_or_else(|| {
                Report::new(TransformationError)
                    .attach_printable(format!("cannot cast {raw:?} to an integer"))
            }),
        ScalarType::Float => raw.as_f64().map(PropertyValue::Float).ok_or_else(|| {
            Report::new(TransformationError).attach_printable(format!("cannot cast {raw:?} to a float"))
        }),
        ScalarType::String => Ok(PropertyValue::String(
            raw.display_string().unwrap_or_default(),
        )),
        ScalarType::List => cast_list(raw),
        ScalarType::Dict => cast_dict(raw),
    }
}

fn cast_bool(raw: &PropertyValue) -> Result<PropertyValue, TransformationError> {
    match raw {
        PropertyValue::Bool(b) => Ok(PropertyValue::Bool(*b)),
        PropertyValue::Int(0) => Ok(PropertyValue::Bool(false)),
        PropertyValue::Int(1) => Ok(PropertyValue::Bool(true)),
        PropertyValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(PropertyValue::Bool(true)),
            "false" | "0" | "no" => Ok(PropertyValue::Bool(false)),
            _ => Err(Report::new(TransformationError)
                .attach_printable(format!("cannot cast {s:?} to a boolean"))),
        },
        other => Err(Report::new(TransformationError)
            .attach_printable(format!("cannot cast {other:?} to a boolean"))),
    }
}

fn cast_list(raw: &PropertyValue) -> Result<PropertyValue, TransformationError> {
    match raw {
        PropertyValue::List(_) => Ok(raw.clone()),
        PropertyValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|_| {
                    Report::new(TransformationError)
                        .attach_printable(format!("{trimmed:?} is not valid JSON array syntax"))
                })?;
                let PropertyValue::List(items) = PropertyValue::from_json(parsed) else {
                    return Err(Report::new(TransformationError)
                        .attach_printable(format!("{trimmed:?} did not parse to a JSON array")));
                };
                Ok(PropertyValue::List(items))
            } else if trimmed.contains(',') {
                Ok(PropertyValue::List(
                    trimmed
                        .split(',')
                        .map(|part| PropertyValue::String(part.trim().to_owned()))
                        .collect(),
                ))
            } else {
                Ok(PropertyValue::List(vec![PropertyValue::String(
                    trimmed.to_owned(),
                )]))
            }
        }
        other => Ok(PropertyValue::List(vec![other.clone()])),
    }
}

fn cast_dict(raw: &PropertyValue) -> Result<PropertyValue, TransformationError> {
    match raw {
        PropertyValue::Dict(_) => Ok(raw.clone()),
        PropertyValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('{') {
                let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|_| {
                    Report::new(TransformationError)
                        .attach_printable(format!("{trimmed:?} is not valid JSON object syntax"))
                })?;
                let PropertyValue::Dict(map) = PropertyValue::from_json(parsed) else {
                    return Err(Report::new(TransformationError)
                        .attach_printable(format!("{trimmed:?} did not parse to a JSON object")));
                };
                Ok(PropertyValue::Dict(map))
            } else {
                let mut map = BTreeMap::new();
                map.insert("value".to_owned(), raw.clone());
                Ok(PropertyValue::Dict(map))
            }
        }
        other => {
            let mut map = BTreeMap::new();
            map.insert("value".to_owned(), other.clone());
            Ok(PropertyValue::Dict(map))
        }
    }
}

/// Applies `property_map` then `transformations`, in that order, against one
/// row. Shared by `EntityMapping::apply` and `RelationMapping::apply`.
fn build_properties(
    table: &DataTable,
    row: &Row,
    property_map: &BTreeMap<String, String>,
    transformations: &[PropertyTransformation],
) -> Result<PropertyMap, TransformationError> {
    let mut properties = PropertyMap::new();

    for (source_column, property) in property_map {
        if let Some(value) = table.cell(row, source_column) {
            properties.insert(property.clone(), value.clone());
        }
    }

    for step in transformations {
        match step {
            PropertyTransformation::Rename {
                source_column,
                property,
            } => {
                let value = table.cell(row, source_column).ok_or_else(|| {
                    Report::new(TransformationError)
                        .attach_printable(format!("column {source_column:?} is missing from the row"))
                })?;
                properties.insert(property.clone(), value.clone());
            }
            PropertyTransformation::TypeCast {
                source_column,
                property,
                target,
            } => {
                let raw = table.cell(row, source_column).ok_or_else(|| {
                    Report::new(TransformationError)
                        .attach_printable(format!("column {source_column:?} is missing from the row"))
                })?;
                properties.insert(property.clone(), cast_scalar(raw, *target)?);
            }
            PropertyTransformation::Constant { property, value } => {
                properties.insert(property.clone(), value.clone());
            }
            PropertyTransformation::Compute {
                property,
                function,
                inputs,
            } => {
                let mut resolved = Vec::with_capacity(inputs.len());
                for input in inputs {
                    let value = table.cell(row, input).ok_or_else(|| {
                        Report::new(TransformationError)
                            .attach_printable(format!("compute input column {input:?} is missing"))
                    })?;
                    resolved.push(value);
                }
                properties.insert(property.clone(), function.apply(&resolved));
            }
            PropertyTransformation::Skip { property } => {
                properties.remove(property);
            }
        }
    }

    Ok(properties)
}

/// Declarative row → `Entity` conversion (§4.8).
#[derive(Debug, Clone)]
pub struct EntityMapping {
    pub entity_type: String,
    pub source_columns: Vec<String>,
    pub property_map: BTreeMap<String, String>,
    pub id_column: Option<String>,
    pub transformations: Vec<PropertyTransformation>,
}

impl EntityMapping {
    fn apply(&self, table: &DataTable, row: &Row, row_index: usize) -> Result<Entity, TransformationError> {
        let id = match &self.id_column {
            Some(column) => table
                .cell(row, column)
                .and_then(PropertyValue::display_string)
                .ok_or_else(|| {
                    Report::new(TransformationError)
                        .attach_printable(format!("id column {column:?} is missing or empty"))
                })?,
            None => row_index.to_string(),
        };
        let properties = build_properties(table, row, &self.property_map, &self.transformations)?;
        Ok(Entity::new(id, self.entity_type.clone()).with_properties(properties))
    }
}

/// Declarative row → `Relation` conversion (§4.8).
#[derive(Debug, Clone)]
pub struct RelationMapping {
    pub relation_type: String,
    pub source_columns: Vec<String>,
    pub source_id_column: String,
    pub target_id_column: String,
    pub property_map: BTreeMap<String, String>,
    pub transformations: Vec<PropertyTransformation>,
}

impl RelationMapping {
    fn apply(&self, table: &DataTable, row: &Row, row_index: usize) -> Result<Relation, TransformationError> {
        let source_id = self.resolve_endpoint(table, row, &self.source_id_column)?;
        let target_id = self.resolve_endpoint(table, row, &self.target_id_column)?;
        let properties = build_properties(table, row, &self.property_map, &self.transformations)?;
        Ok(Relation::new(
            format!("{}:{row_index}", self.relation_type),
            self.relation_type.clone(),
            source_id,
            target_id,
        )
        .with_properties(properties))
    }

    fn resolve_endpoint(
        &self,
        table: &DataTable,
        row: &Row,
        column: &str,
    ) -> Result<String, TransformationError> {
        let value = table
            .cell(row, column)
            .and_then(PropertyValue::display_string)
            .filter(|s| !s.is_empty());
        value.ok_or_else(|| {
            Report::new(TransformationError)
                .attach_printable(format!("relation endpoint column {column:?} is missing or empty"))
        })
    }
}

/// What one row produced when run through a [`SchemaMapping`].
#[derive(Debug, Clone, Default)]
pub struct RowOutput {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// An ordered set of `EntityMapping`s and `RelationMapping`s, evaluated
/// independently against every row (§4.8, §3 SchemaMapping).
#[derive(Debug, Clone, Default)]
pub struct SchemaMapping {
    pub entities: Vec<EntityMapping>,
    pub relations: Vec<RelationMapping>,
}

impl SchemaMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates entity/relation type uniqueness and that every column a
    /// mapping or its transformations reference appears in that mapping's
    /// declared `source_columns`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut entity_types = std::collections::HashSet::new();
        for mapping in &self.entities {
            ensure!(
                entity_types.insert(mapping.entity_type.clone()),
                Report::new(ConfigurationError).attach_printable(format!(
                    "entity_type {:?} is declared more than once",
                    mapping.entity_type
                ))
            );
            for step in &mapping.transformations {
                for column in step.referenced_columns() {
                    ensure!(
                        mapping.source_columns.iter().any(|c| c == column),
                        Report::new(ConfigurationError).attach_printable(format!(
                            "transformation on entity_type {:?} references column {column:?} \
                             which is not in source_columns",
                            mapping.entity_type
                        ))
                    );
                }
            }
        }

        let mut relation_types = std::collections::HashSet::new();
        for mapping in &self.relations {
            ensure!(
                relation_types.insert(mapping.relation_type.clone()),
                Report::new(ConfigurationError).attach_printable(format!(
                    "relation_type {:?} is declared more than once",
                    mapping.relation_type
                ))
            );
            ensure!(
                mapping
                    .source_columns
                    .iter()
                    .any(|c| c == &mapping.source_id_column),
                Report::new(ConfigurationError).attach_printable(format!(
                    "relation_type {:?}'s source_id_column {:?} is not in source_columns",
                    mapping.relation_type, mapping.source_id_column
                ))
            );
            ensure!(
                mapping
                    .source_columns
                    .iter()
                    .any(|c| c == &mapping.target_id_column),
                Report::new(ConfigurationError).attach_printable(format!(
                    "relation_type {:?}'s target_id_column {:?} is not in source_columns",
                    mapping.relation_type, mapping.target_id_column
                ))
            );
            for step in &mapping.transformations {
                for column in step.referenced_columns() {
                    ensure!(
                        mapping.source_columns.iter().any(|c| c == column),
                        Report::new(ConfigurationError).attach_printable(format!(
                            "transformation on relation_type {:?} references column {column:?} \
                             which is not in source_columns",
                            mapping.relation_type
                        ))
                    );
                }
            }
        }

        Ok(())
    }

    /// Evaluate every `EntityMapping` and `RelationMapping` against one row,
    /// each independently — overlapping `source_columns` between mappings is
    /// legal and never suppresses either mapping (§4.8, §9 Open Question).
    pub fn apply_row(
        &self,
        table: &DataTable,
        row: &Row,
        row_index: usize,
    ) -> Result<RowOutput, TransformationError> {
        let mut output = RowOutput::default();
        for mapping in &self.entities {
            output.entities.push(mapping.apply(table, row, row_index)?);
        }
        for mapping in &self.relations {
            output.relations.push(mapping.apply(table, row, row_index)?);
        }
        Ok(output)
    }
}
