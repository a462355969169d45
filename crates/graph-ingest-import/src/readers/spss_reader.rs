use std::{collections::BTreeMap, path::Path};

use error_stack::{Result, ResultExt};
use graph_ingest_tabular::Row;
use graph_ingest_types::PropertyValue;
use readstat::{ReadStatData, ReadStatPath, ReadStatVarType};

use super::RowReader;
use crate::error::ReaderError;

/// Reserved property keys the pipeline attaches SPSS metadata under (§6,
/// §4.15.1): a variable's display label, and — for variables with a
/// value-label set — the label for the specific value observed on that row.
pub const VARIABLE_LABELS_KEY: &str = "_spss_variable_labels";
pub const VALUE_LABELS_KEY: &str = "_spss_value_labels";

/// Streams cases from a `.sav`/`.zsav` file via `readstat`, which reads the
/// whole case table into memory up front (the crate wraps ReadStat's
/// C callback API, which does not expose a cheaper cursor) but preserves
/// variable and value labels so they can be attached to entity properties
/// under the reserved keys above rather than discarded (§6).
pub struct SpssRowReader {
    columns: Vec<String>,
    variable_labels: PropertyValue,
    value_labels_by_column: BTreeMap<String, PropertyValue>,
    rows: std::vec::IntoIter<Row>,
}

impl SpssRowReader {
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let read_path = ReadStatPath::new(path.to_path_buf(), None, None, false, false)
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to open spss file at {}", path.display()))?;

        let mut data = ReadStatData::new();
        let metadata = data
            .get_metadata(&read_path, false)
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to read spss metadata at {}", path.display()))?;

        let columns: Vec<String> = metadata.vars.values().map(|var| var.var_name.clone()).collect();

        let mut variable_label_map = graph_ingest_types::PropertyMap::new();
        let mut value_labels_by_column = BTreeMap::new();
        for var in metadata.vars.values() {
            if let Some(label) = &var.var_label {
                variable_label_map.insert(var.var_name.clone(), PropertyValue::from(label.clone()));
            }
            if let Some(value_labels) = &var.var_value_labels {
                let mut column_labels = graph_ingest_types::PropertyMap::new();
                for (raw_value, label) in value_labels {
                    column_labels.insert(raw_value.clone(), PropertyValue::from(label.clone()));
                }
                value_labels_by_column.insert(
                    var.var_name.clone(),
                    PropertyValue::Dict(column_labels.into_iter().collect()),
                );
            }
        }

        data.get_data(&read_path, Some(metadata), None, None)
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to read spss cases at {}", path.display()))?;

        let mut rows = Vec::with_capacity(data.cases.len());
        for case in &data.cases {
            let row: Row = columns
                .iter()
                .map(|column| {
                    case.get(column)
                        .map(spss_value_to_property)
                        .unwrap_or(PropertyValue::Null)
                })
                .collect();
            rows.push(row);
        }

        Ok(Self {
            columns,
            variable_labels: PropertyValue::Dict(variable_label_map.into_iter().collect()),
            value_labels_by_column,
            rows: rows.into_iter(),
        })
    }
}

fn spss_value_to_property(value: &readstat::ReadStatVar) -> PropertyValue {
    match value.var_type() {
        ReadStatVarType::String => PropertyValue::String(value.to_string()),
        ReadStatVarType::Double | ReadStatVarType::Float => {
            value.to_string().parse::<f64>().map(PropertyValue::Float).unwrap_or(PropertyValue::Null)
        }
        ReadStatVarType::Int8 | ReadStatVarType::Int16 | ReadStatVarType::Int32 => {
            value.to_string().parse::<i64>().map(PropertyValue::Int).unwrap_or(PropertyValue::Null)
        }
        _ => PropertyValue::Null,
    }
}

impl RowReader for SpssRowReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_row(&mut self) -> Result<Option<Row>, ReaderError> {
        Ok(self.rows.next())
    }

    fn variable_labels(&self) -> Option<&PropertyValue> {
        Some(&self.variable_labels)
    }

    fn value_labels_for(&self, column: &str) -> Option<&PropertyValue> {
        self.value_labels_by_column.get(column)
    }
}
