use graph_ingest_types::PropertyValue;

/// A single row, positional with [`DataTable::columns`].
pub type Row = Vec<PropertyValue>;

/// An in-memory tabular batch: the materialised form shared by
/// `SchemaMapping`, `DataReshaping`, and `SchemaInference`. Streamed sources
/// (CSV, JSON, SPSS) are consumed row-by-row upstream in `graph-ingest-import`
/// and only materialised into a `DataTable` when a caller needs the wide/long
/// reshaping or inference operations below, per §9's streaming/batch duality
/// note: "the batch form is the streaming form materialised".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl DataTable {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn cell<'a>(&'a self, row: &'a Row, column: &str) -> Option<&'a PropertyValue> {
        self.column_index(column).and_then(|i| row.get(i))
    }

    pub fn push_row(&mut self, row: Row) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Distinct non-null values observed in `column`, used by reshape
    /// heuristics (`detect_wide_format`, `suggest_melt_config`) to judge
    /// cardinality without a full groupby.
    #[must_use]
    pub fn distinct_values(&self, column: &str) -> Vec<PropertyValue> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        let mut seen: Vec<PropertyValue> = Vec::new();
        for row in &self.rows {
            if let Some(value) = row.get(idx) {
                if !value.is_null() && !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
        }
        seen
    }

    #[must_use]
    pub fn is_numeric_column(&self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        let mut saw_any = false;
        for row in &self.rows {
            if let Some(value) = row.get(idx) {
                if value.is_null() {
                    continue;
                }
                if value.as_f64().is_none() {
                    return false;
                }
                saw_any = true;
            }
        }
        saw_any
    }
}
