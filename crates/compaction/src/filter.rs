//! Selection of the compactions a trigger is waiting for.

use time::OffsetDateTime;

use crate::status::StatusRecord;
use crate::CompactionKind;

/// Which status records belong to a compaction of one table and kind.
///
/// With a not-before instant set, only records that started at or after
/// that instant (truncated to whole seconds) are selected. The time filter
/// is best-effort: a record whose start time is missing or not a number is
/// rejected while the filter is active, and kept when it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionQuery {
    table: String,
    kind: CompactionKind,
    not_before: Option<OffsetDateTime>,
}

impl CompactionQuery {
    pub fn new(table: &str, kind: CompactionKind) -> Self {
        CompactionQuery {
            table: table.to_lowercase(),
            kind,
            not_before: None,
        }
    }

    /// Only select compactions that started at or after `instant`.
    pub fn started_not_before(mut self, instant: OffsetDateTime) -> Self {
        self.not_before = Some(instant);
        self
    }

    /// The same table and kind, with the time filter dropped.
    pub fn any_start_time(&self) -> Self {
        CompactionQuery {
            not_before: None,
            ..self.clone()
        }
    }

    /// Lower-cased target table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> CompactionKind {
        self.kind
    }

    pub fn not_before(&self) -> Option<OffsetDateTime> {
        self.not_before
    }

    /// Lower bound on `start time`, in epoch milliseconds.
    fn not_before_millis(&self) -> Option<i64> {
        self.not_before
            .map(|instant| instant.unix_timestamp().saturating_mul(1000))
    }

    pub fn matches(&self, record: &StatusRecord) -> bool {
        let same_table = record
            .table()
            .is_some_and(|table| table.to_lowercase() == self.table);
        let same_kind = record.kind_label() == Some(self.kind.label());
        if !same_table || !same_kind {
            return false;
        }

        match self.not_before_millis() {
            Some(lower_bound) => record
                .start_time_millis()
                .is_some_and(|started| started >= lower_bound),
            None => true,
        }
    }

    /// Matching records, in listing order.
    pub fn select(&self, records: &[StatusRecord]) -> Vec<StatusRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}
