//! Concrete tabular readers the `StructuredPipeline` opens directly (§4.15.1).
//! Each reader exposes the same narrow surface — a fixed column list plus a
//! pull-one-row-at-a-time cursor — so the pipeline's batching loop never has
//! to know which backing format it is reading from.

mod csv_reader;
mod excel_reader;
mod json_reader;
mod spss_reader;

pub use self::{
    csv_reader::CsvRowReader,
    excel_reader::{ExcelRowReader, SheetSelector},
    json_reader::JsonRowReader,
    spss_reader::{SpssRowReader, VALUE_LABELS_KEY, VARIABLE_LABELS_KEY},
};

use error_stack::Result;
use graph_ingest_tabular::Row;
use graph_ingest_types::PropertyValue;

use crate::error::ReaderError;

/// A source of rows, all sharing one fixed column list. Implemented by every
/// concrete reader in this module; the pipeline only ever depends on this
/// trait, never on a specific format.
pub trait RowReader {
    fn columns(&self) -> &[String];

    /// Pull the next row, or `Ok(None)` once the source is exhausted.
    fn read_row(&mut self) -> Result<Option<Row>, ReaderError>;

    /// Per-variable display labels this source carries, if any (§4.15.1).
    /// Only SPSS sources currently supply these; every other reader keeps
    /// the default.
    fn variable_labels(&self) -> Option<&PropertyValue> {
        None
    }

    /// The value-label set for `column`, if the source attaches one
    /// (§4.15.1). Only SPSS sources currently supply these.
    fn value_labels_for(&self, _column: &str) -> Option<&PropertyValue> {
        None
    }
}
