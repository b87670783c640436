//! Parsing of the compaction status listing.
//!
//! The listing arrives as a plain tabular result whose first row holds the
//! column headers and whose remaining rows describe one compaction each.
//! Every poll produces a fresh snapshot; records are never cached.

use std::collections::BTreeMap;
use std::fmt;

use acidcheck_query::QueryResult;
use serde::Serialize;

/// Column holding the (lower-cased) table name.
pub const TABLE_COLUMN: &str = "table";
/// Column holding the compaction kind label (`MAJOR` / `MINOR`).
pub const TYPE_COLUMN: &str = "type";
/// Column holding the lifecycle state (`initiated`, `working`, `succeeded`, `failed`, ...).
pub const STATE_COLUMN: &str = "state";
/// Column holding the start time as epoch milliseconds.
pub const START_TIME_COLUMN: &str = "start time";

pub const STATE_SUCCEEDED: &str = "succeeded";
pub const STATE_FAILED: &str = "failed";

// ──────────────────────────────────────────────
// StatusRecord
// ──────────────────────────────────────────────

/// One row of the status listing, keyed by lower-cased column name.
///
/// A missing cell is a missing key, never an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusRecord(BTreeMap<String, String>);

impl StatusRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn table(&self) -> Option<&str> {
        self.get(TABLE_COLUMN)
    }

    pub fn kind_label(&self) -> Option<&str> {
        self.get(TYPE_COLUMN)
    }

    pub fn state(&self) -> Option<&str> {
        self.get(STATE_COLUMN)
    }

    /// Start time as epoch milliseconds, if present and numeric.
    pub fn start_time_millis(&self) -> Option<i64> {
        self.get(START_TIME_COLUMN)?.parse().ok()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StatusRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        StatusRecord(
            iter.into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

/// Turn a status listing into records, in listing order.
///
/// - An empty listing, or one holding only the header row, yields no records.
/// - Headers are lower-cased; a null header drops its column entirely.
/// - Null cells, and cells past the end of a short row, are left out of
///   the record.
pub fn parse_status_listing(listing: &QueryResult) -> Vec<StatusRecord> {
    let Some((header, data)) = listing.rows().split_first() else {
        return Vec::new();
    };

    let columns: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter_map(|(i, cell)| cell.to_text().map(|name| (i, name.to_lowercase())))
        .collect();

    data.iter()
        .map(|row| {
            let cells = columns
                .iter()
                .filter_map(|(i, name)| {
                    let value = row.get(*i)?.to_text()?;
                    Some((name.clone(), value))
                })
                .collect();
            StatusRecord(cells)
        })
        .collect()
}
