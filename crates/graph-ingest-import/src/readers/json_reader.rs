use std::{collections::BTreeSet, fs::File, io::BufReader, path::Path};

use error_stack::{ensure, Report, Result, ResultExt};
use graph_ingest_tabular::Row;
use graph_ingest_types::PropertyValue;

use super::RowReader;
use crate::error::ReaderError;

/// Reads a JSON array of objects, at the document root or nested at
/// `array_key` of a root object (§4.15.1, §6 "Tabular readers"). The column
/// list is the union of every object's keys, sorted for determinism; a row
/// missing a key reads as `PropertyValue::Null` for that column rather than
/// shifting later columns, matching the CSV/Excel readers' fixed-width shape.
///
/// The whole document is parsed up front — row objects are then handed out
/// one at a time — rather than streamed element-by-element, since
/// `serde_json`'s `StreamDeserializer` only supports whitespace-separated root
/// values, not elements of a single JSON array.
pub struct JsonRowReader {
    columns: Vec<String>,
    rows: std::vec::IntoIter<serde_json::Map<String, serde_json::Value>>,
}

impl JsonRowReader {
    pub fn open(path: &Path, array_key: Option<&str>) -> Result<Self, ReaderError> {
        let file = File::open(path)
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to open json at {}", path.display()))?;
        let document: serde_json::Value = serde_json::from_reader(BufReader::new(file))
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to parse json at {}", path.display()))?;

        let array = match array_key {
            Some(key) => document
                .get(key)
                .and_then(serde_json::Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    Report::new(ReaderError)
                        .attach_printable(format!("no array found at key {key:?} in {}", path.display()))
                })?,
            None => document.as_array().cloned().ok_or_else(|| {
                Report::new(ReaderError)
                    .attach_printable(format!("root of {} is not a json array", path.display()))
            })?,
        };

        let mut columns_set = BTreeSet::new();
        let mut objects = Vec::with_capacity(array.len());
        for item in array {
            let serde_json::Value::Object(object) = item else {
                return Err(Report::new(ReaderError)
                    .attach_printable("every element of the json array must be an object"));
            };
            columns_set.extend(object.keys().cloned());
            objects.push(object);
        }

        ensure!(
            !objects.is_empty(),
            Report::new(ReaderError).attach_printable("json array contained no rows")
        );

        Ok(Self {
            columns: columns_set.into_iter().collect(),
            rows: objects.into_iter(),
        })
    }
}

impl RowReader for JsonRowReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_row(&mut self) -> Result<Option<Row>, ReaderError> {
        let Some(object) = self.rows.next() else {
            return Ok(None);
        };
        Ok(Some(
            self.columns
                .iter()
                .map(|column| {
                    object
                        .get(column)
                        .cloned()
                        .map(PropertyValue::from_json)
                        .unwrap_or(PropertyValue::Null)
                })
                .collect(),
        ))
    }
}
