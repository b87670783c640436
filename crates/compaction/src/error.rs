use std::time::Duration;

use acidcheck_query::QueryError;

use crate::status::StatusRecord;
use crate::CompactionKind;

/// Errors surfaced by the compaction monitor.
///
/// Only `Query` is transient: the retry scheduler records it and re-issues
/// the trigger. Every other variant aborts the wait immediately.
#[derive(Debug, thiserror::Error)]
pub enum CompactionError {
    /// More than one compaction of the same kind matched the table. The
    /// monitor assumes automatic compaction is disabled for the table, so
    /// this is a consistency violation rather than something to wait out.
    #[error(
        "expected at most one {kind} compaction of {table}, found {}: {}",
        .records.len(),
        join_records(.records)
    )]
    MultipleCompactions {
        table: String,
        kind: CompactionKind,
        records: Vec<StatusRecord>,
    },

    /// The retry policy ran out before any attempt succeeded.
    #[error("could not compact {table} in {attempts} attempts ({elapsed:?}): {last_cause}")]
    RetriesExhausted {
        table: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last_cause: Box<AttemptFailure>,
    },

    /// The thread waiting for the compaction was interrupted.
    #[error("waiting for compaction of {table} was interrupted")]
    Interrupted { table: String },

    /// A retry policy that would never terminate.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// Issuing the trigger or reading the status listing failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Why a single trigger-and-wait attempt did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure {
    /// The metastore reported the compaction as failed.
    #[error("compaction has failed: {0}")]
    Failed(StatusRecord),

    /// The compaction did not finish within the attempt timeout.
    #[error("waiting for compaction has timed out after {waited:?}{}", last_state(.last))]
    TimedOut {
        last: Option<StatusRecord>,
        waited: Duration,
    },

    /// Triggering or polling raised a query error.
    #[error(transparent)]
    Query(QueryError),
}

fn join_records(records: &[StatusRecord]) -> String {
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn last_state(last: &Option<StatusRecord>) -> String {
    match last {
        Some(record) => format!(", last state: {}", record),
        None => ", compaction never started".to_string(),
    }
}
