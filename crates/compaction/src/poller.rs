//! Polling a single compaction to a terminal outcome.
//!
//! ```text
//!   NotStarted ──▶ Running ──▶ Succeeded
//!       │             │   └──▶ Failed
//!       └─────────────┴──────▶ TimedOut   (attempt timeout exceeded)
//! ```
//!
//! `NotStarted` and `Running` are loop states only; [`CompletionPoller::wait`]
//! returns one of the terminal [`PollOutcome`]s or a fatal error.

use std::time::Duration;

use crate::clock::Clock;
use crate::error::CompactionError;
use crate::filter::CompactionQuery;
use crate::service::StatusListing;
use crate::status::{parse_status_listing, StatusRecord, STATE_FAILED, STATE_SUCCEEDED};

/// What one look at the status listing revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No matching compaction is listed yet.
    NotStarted,
    /// A matching compaction is listed in a non-terminal state.
    Running(StatusRecord),
    Succeeded(StatusRecord),
    Failed(StatusRecord),
}

/// Terminal result of waiting for one compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded(StatusRecord),
    /// The metastore reported the compaction as failed. Recoverable by
    /// triggering again.
    Failed(StatusRecord),
    /// The attempt timeout elapsed first. Recoverable by triggering again.
    TimedOut {
        last: Option<StatusRecord>,
        waited: Duration,
    },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded(_))
    }
}

/// Polls a [`StatusListing`] until the queried compaction reaches a
/// terminal state or `timeout` elapses.
pub struct CompletionPoller<'a, S: ?Sized, C: ?Sized> {
    listing: &'a S,
    clock: &'a C,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a, S, C> CompletionPoller<'a, S, C>
where
    S: StatusListing + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(listing: &'a S, clock: &'a C, poll_interval: Duration, timeout: Duration) -> Self {
        CompletionPoller {
            listing,
            clock,
            poll_interval,
            timeout,
        }
    }

    /// Take one fresh snapshot of the listing and classify it.
    ///
    /// Fails with [`CompactionError::MultipleCompactions`] when more than one
    /// record matches `query`.
    pub fn observe(&self, query: &CompactionQuery) -> Result<PollState, CompactionError> {
        let listing = self.listing.list_compactions()?;
        let records = parse_status_listing(&listing);
        let mut matching = query.select(&records);

        if matching.len() > 1 {
            return Err(CompactionError::MultipleCompactions {
                table: query.table().to_string(),
                kind: query.kind(),
                records: matching,
            });
        }

        let Some(record) = matching.pop() else {
            tracing::debug!(
                table = query.table(),
                kind = %query.kind(),
                existing = ?query.any_start_time().select(&records),
                "Compaction has not started yet"
            );
            return Ok(PollState::NotStarted);
        };

        let state = match record.state() {
            Some(STATE_SUCCEEDED) => PollState::Succeeded(record),
            Some(STATE_FAILED) => PollState::Failed(record),
            _ => PollState::Running(record),
        };
        Ok(state)
    }

    /// Poll until a terminal outcome.
    ///
    /// The listing is checked immediately, then once per poll interval.
    /// The elapsed time is compared against the timeout before each
    /// re-poll, whether or not the compaction has shown up yet.
    pub fn wait(&self, query: &CompactionQuery) -> Result<PollOutcome, CompactionError> {
        let started = self.clock.instant();

        loop {
            let last = match self.observe(query)? {
                PollState::Succeeded(record) => return Ok(PollOutcome::Succeeded(record)),
                PollState::Failed(record) => {
                    tracing::info!(table = query.table(), %record, "Compaction has failed");
                    return Ok(PollOutcome::Failed(record));
                }
                PollState::NotStarted => None,
                PollState::Running(record) => {
                    tracing::debug!(table = query.table(), %record, "Compaction is running");
                    Some(record)
                }
            };

            let waited = self.clock.instant().saturating_duration_since(started);
            if waited > self.timeout {
                tracing::info!(
                    table = query.table(),
                    ?waited,
                    last = ?last,
                    "Waiting for compaction has timed out"
                );
                return Ok(PollOutcome::TimedOut { last, waited });
            }

            self.clock
                .sleep(self.poll_interval)
                .map_err(|_| CompactionError::Interrupted {
                    table: query.table().to_string(),
                })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use acidcheck_query::{row, QueryError, QueryResult};

    use super::*;
    use crate::testing::{ManualClock, ScriptedStatusListing};
    use crate::CompactionKind;

    const HEADER: [&str; 4] = ["table", "type", "state", "start time"];

    fn listing(rows: &[[&str; 4]]) -> QueryResult {
        let mut all = vec![row![HEADER[0], HEADER[1], HEADER[2], HEADER[3]]];
        all.extend(rows.iter().map(|r| row![r[0], r[1], r[2], r[3]]));
        QueryResult::from_rows(all)
    }

    fn poller<'a>(
        listing: &'a ScriptedStatusListing,
        clock: &'a ManualClock,
    ) -> CompletionPoller<'a, ScriptedStatusListing, ManualClock> {
        CompletionPoller::new(listing, clock, Duration::from_secs(1), Duration::from_secs(10))
    }

    #[test]
    fn single_succeeded_record_finishes_on_first_check() {
        let script = ScriptedStatusListing::new([Ok(listing(&[["t1", "MINOR", "succeeded", "1000"]]))]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Minor);

        let outcome = poller(&script, &clock).wait(&query).unwrap();

        match outcome {
            PollOutcome::Succeeded(record) => assert_eq!(record.state(), Some("succeeded")),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(script.calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn not_started_then_running_then_succeeded() {
        let script = ScriptedStatusListing::new([
            Ok(listing(&[])),
            Ok(listing(&[["t1", "MAJOR", "initiated", "1000"]])),
            Ok(listing(&[["t1", "MAJOR", "working", "1000"]])),
            Ok(listing(&[["t1", "MAJOR", "succeeded", "1000"]])),
        ]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Major);

        let outcome = poller(&script, &clock).wait(&query).unwrap();

        assert!(outcome.is_success());
        assert_eq!(script.calls(), 4);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 3]);
    }

    #[test]
    fn observe_classifies_each_state() {
        let script = ScriptedStatusListing::new([
            Ok(listing(&[["t2", "MAJOR", "working", "1"]])),
            Ok(listing(&[["t1", "MAJOR", "ready for cleaning", "1"]])),
            Ok(listing(&[["t1", "MAJOR", "failed", "1"]])),
        ]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Major);
        let p = poller(&script, &clock);

        assert_eq!(p.observe(&query).unwrap(), PollState::NotStarted);
        assert!(matches!(p.observe(&query).unwrap(), PollState::Running(_)));
        assert!(matches!(p.observe(&query).unwrap(), PollState::Failed(_)));
    }

    #[test]
    fn failed_record_is_an_outcome_not_an_error() {
        let script = ScriptedStatusListing::new([Ok(listing(&[["t1", "MINOR", "failed", "1"]]))]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Minor);

        let outcome = poller(&script, &clock).wait(&query).unwrap();

        assert!(matches!(outcome, PollOutcome::Failed(r) if r.table() == Some("t1")));
    }

    #[test]
    fn running_forever_times_out() {
        let script = ScriptedStatusListing::new([Ok(listing(&[["t1", "MAJOR", "working", "1"]]))]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Major);

        let outcome = poller(&script, &clock).wait(&query).unwrap();

        match outcome {
            PollOutcome::TimedOut { last, waited } => {
                assert_eq!(last.and_then(|r| r.state().map(str::to_string)).as_deref(), Some("working"));
                assert_eq!(waited, Duration::from_secs(11));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // checks at 0s..=11s
        assert_eq!(script.calls(), 12);
    }

    #[test]
    fn never_started_also_times_out() {
        let script = ScriptedStatusListing::new([Ok(listing(&[]))]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Major);

        let outcome = poller(&script, &clock).wait(&query).unwrap();

        assert!(matches!(outcome, PollOutcome::TimedOut { last: None, .. }));
    }

    #[test]
    fn two_matches_abort_without_sleeping() {
        let script = ScriptedStatusListing::new([Ok(listing(&[
            ["t1", "MAJOR", "working", "1000"],
            ["T1", "MAJOR", "initiated", "2000"],
        ]))]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Major);

        let err = poller(&script, &clock).wait(&query).unwrap_err();

        match err {
            CompactionError::MultipleCompactions { table, records, .. } => {
                assert_eq!(table, "t1");
                assert_eq!(records.len(), 2);
            }
            other => panic!("expected MultipleCompactions, got {:?}", other),
        }
        assert_eq!(script.calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn listing_errors_propagate_as_query_errors() {
        let script = ScriptedStatusListing::new([Err(QueryError::Connection("gone".to_string()))]);
        let clock = ManualClock::new();
        let query = CompactionQuery::new("t1", CompactionKind::Major);

        let err = poller(&script, &clock).wait(&query).unwrap_err();

        assert!(matches!(err, CompactionError::Query(QueryError::Connection(_))));
    }

    #[test]
    fn interrupted_sleep_aborts_the_wait() {
        let script = ScriptedStatusListing::new([Ok(listing(&[]))]);
        let clock = ManualClock::new();
        clock.interrupt();
        let query = CompactionQuery::new("t1", CompactionKind::Major);

        let err = poller(&script, &clock).wait(&query).unwrap_err();

        assert!(matches!(err, CompactionError::Interrupted { table } if table == "t1"));
    }
}
