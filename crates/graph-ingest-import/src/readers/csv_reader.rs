use std::{fs::File, path::Path};

use error_stack::{Result, ResultExt};
use graph_ingest_tabular::Row;
use graph_ingest_types::PropertyValue;

use super::RowReader;
use crate::error::ReaderError;

/// Streams a CSV file one record at a time via `csv::Reader::read_record`,
/// never materialising the whole file — rows are handed to the schema mapping
/// as soon as they are parsed (§4.15.1). `Trim::None` is used so user
/// whitespace decisions in cell values survive untouched; RFC-4180 quoting is
/// handled by the `csv` crate as usual.
pub struct CsvRowReader {
    reader: csv::Reader<File>,
    columns: Vec<String>,
    record: csv::StringRecord,
}

impl CsvRowReader {
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::None)
            .from_path(path)
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to open csv at {}", path.display()))?;
        let columns = reader
            .headers()
            .change_context(ReaderError)
            .attach_printable_lazy(|| format!("failed to read csv header at {}", path.display()))?
            .iter()
            .map(str::to_owned)
            .collect();
        Ok(Self {
            reader,
            columns,
            record: csv::StringRecord::new(),
        })
    }
}

impl RowReader for CsvRowReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_row(&mut self) -> Result<Option<Row>, ReaderError> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .change_context(ReaderError)
            .attach_printable("failed to read csv record")?;
        if !more {
            return Ok(None);
        }
        Ok(Some(self.record.iter().map(PropertyValue::from).collect()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_csv(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("graph-ingest-import-csv-test-{}.csv", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_header_and_rows_in_order() {
        let path = write_csv("id,name,age\n1,Alice,30\n2,Bob,25\n");
        let mut reader = CsvRowReader::open(&path).unwrap();
        assert_eq!(reader.columns(), &["id".to_owned(), "name".to_owned(), "age".to_owned()]);
        let first = reader.read_row().unwrap().unwrap();
        assert_eq!(first[1], PropertyValue::from("Alice"));
        let second = reader.read_row().unwrap().unwrap();
        assert_eq!(second[1], PropertyValue::from("Bob"));
        assert!(reader.read_row().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }
}
