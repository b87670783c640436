use crate::Row;

/// Tabular result of a single statement.
///
/// `columns` holds the names the engine reported for the result set, which
/// may be empty. Some listings (Hive's `SHOW COMPACTIONS` among them) report
/// their headers as the first entry of `rows` instead; consumers that rely on
/// that convention read the header row themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        QueryResult { columns, rows }
    }

    /// A result without column metadata.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        QueryResult {
            columns: Vec::new(),
            rows,
        }
    }

    pub fn empty() -> Self {
        QueryResult::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl FromIterator<Row> for QueryResult {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        QueryResult::from_rows(iter.into_iter().collect())
    }
}
