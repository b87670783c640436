//! Retrying the whole trigger-and-wait sequence.
//!
//! A compaction trigger can silently fail to register and the status listing
//! is only eventually consistent, so waiting once is not reliable. The
//! scheduler re-runs the complete attempt (trigger, then poll) until it
//! succeeds or the policy is exhausted.

use std::time::Duration;

use crate::clock::Clock;
use crate::error::{AttemptFailure, CompactionError};
use crate::poller::PollOutcome;
use crate::status::StatusRecord;

// ──────────────────────────────────────────────
// RetryPolicy
// ──────────────────────────────────────────────

/// Bounds on how long and how often an attempt is repeated.
///
/// At least one of the two bounds is always set, so every policy terminates.
/// The first attempt always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_duration: Option<Duration>,
    max_attempts: Option<u32>,
    delay: Duration,
}

impl RetryPolicy {
    /// Retry until `max_duration` has elapsed, with no attempt limit.
    pub fn with_max_duration(max_duration: Duration) -> Self {
        RetryPolicy {
            max_duration: Some(max_duration),
            max_attempts: None,
            delay: Duration::ZERO,
        }
    }

    /// Retry at most `max_attempts` times in total, with no time limit.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        RetryPolicy {
            max_duration: None,
            max_attempts: Some(max_attempts),
            delay: Duration::ZERO,
        }
    }

    /// Build a policy from optional bounds, refusing one without any.
    pub fn new(
        max_duration: Option<Duration>,
        max_attempts: Option<u32>,
    ) -> Result<Self, CompactionError> {
        if max_duration.is_none() && max_attempts.is_none() {
            return Err(CompactionError::InvalidPolicy(
                "either a maximum duration or a maximum attempt count is required".to_string(),
            ));
        }
        Ok(RetryPolicy {
            max_duration,
            max_attempts,
            delay: Duration::ZERO,
        })
    }

    pub fn and_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn and_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Pause between a failed attempt and the next one.
    pub fn and_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether another attempt is allowed after `attempts` failed ones.
    pub fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        let attempts_exhausted = self.max_attempts.is_some_and(|max| attempts >= max);
        let duration_exhausted = self.max_duration.is_some_and(|max| elapsed >= max);
        attempts_exhausted || duration_exhausted
    }

    /// Time left before the duration bound, if there is one.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.max_duration.map(|max| max.saturating_sub(elapsed))
    }
}

// ──────────────────────────────────────────────
// RetryScheduler
// ──────────────────────────────────────────────

/// Summary of a successful trigger-and-wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub attempts: u32,
    pub elapsed: Duration,
    /// Listing record of the compaction that succeeded.
    pub record: StatusRecord,
}

pub struct RetryScheduler<'a, C: ?Sized> {
    policy: RetryPolicy,
    clock: &'a C,
}

impl<'a, C: Clock + ?Sized> RetryScheduler<'a, C> {
    pub fn new(policy: RetryPolicy, clock: &'a C) -> Self {
        RetryScheduler { policy, clock }
    }

    /// Run `attempt` until it yields [`PollOutcome::Succeeded`].
    ///
    /// `attempt` receives the 1-based attempt number. Failed and timed-out
    /// outcomes and query errors are logged and retried; any other error
    /// is returned as is. Once the policy is exhausted the last cause is
    /// returned inside [`CompactionError::RetriesExhausted`].
    pub fn run<F>(&self, table: &str, mut attempt: F) -> Result<RetryReport, CompactionError>
    where
        F: FnMut(u32) -> Result<PollOutcome, CompactionError>,
    {
        let started = self.clock.instant();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);

            let failure = match attempt(attempts) {
                Ok(PollOutcome::Succeeded(record)) => {
                    let elapsed = self.elapsed_since(started);
                    tracing::info!(table, attempts, ?elapsed, "Compaction finished");
                    return Ok(RetryReport {
                        attempts,
                        elapsed,
                        record,
                    });
                }
                Ok(PollOutcome::Failed(record)) => AttemptFailure::Failed(record),
                Ok(PollOutcome::TimedOut { last, waited }) => {
                    AttemptFailure::TimedOut { last, waited }
                }
                Err(CompactionError::Query(err)) => AttemptFailure::Query(err),
                Err(fatal) => return Err(fatal),
            };

            let elapsed = self.elapsed_since(started);
            tracing::warn!(
                table,
                attempt = attempts,
                ?elapsed,
                cause = %failure,
                "Compaction attempt did not succeed"
            );

            if self.policy.is_exhausted(attempts, elapsed) {
                return Err(exhausted(table, attempts, elapsed, failure));
            }

            if !self.policy.delay.is_zero() {
                // The pause never runs past the deadline.
                let pause = self
                    .policy
                    .remaining(elapsed)
                    .map_or(self.policy.delay, |left| left.min(self.policy.delay));
                self.clock
                    .sleep(pause)
                    .map_err(|_| CompactionError::Interrupted {
                        table: table.to_string(),
                    })?;

                let elapsed = self.elapsed_since(started);
                if self.policy.is_exhausted(attempts, elapsed) {
                    return Err(exhausted(table, attempts, elapsed, failure));
                }
            }
        }
    }

    fn elapsed_since(&self, started: std::time::Instant) -> Duration {
        self.clock.instant().saturating_duration_since(started)
    }
}

fn exhausted(
    table: &str,
    attempts: u32,
    elapsed: Duration,
    failure: AttemptFailure,
) -> CompactionError {
    CompactionError::RetriesExhausted {
        table: table.to_string(),
        attempts,
        elapsed,
        last_cause: Box::new(failure),
    }
}

#[cfg(test)]
mod tests {
    use acidcheck_query::QueryError;

    use super::*;
    use crate::testing::ManualClock;
    use crate::CompactionKind;

    fn succeeded() -> StatusRecord {
        [("table", "t1"), ("state", "succeeded")].into_iter().collect()
    }

    fn failed() -> StatusRecord {
        [("table", "t1"), ("state", "failed")].into_iter().collect()
    }

    #[test]
    fn policy_without_bounds_is_rejected() {
        assert!(matches!(
            RetryPolicy::new(None, None),
            Err(CompactionError::InvalidPolicy(_))
        ));
        assert!(RetryPolicy::new(None, Some(3)).is_ok());
    }

    #[test]
    fn exhaustion_by_either_bound() {
        let policy = RetryPolicy::with_max_duration(Duration::from_secs(60)).and_max_attempts(3);
        assert!(!policy.is_exhausted(1, Duration::from_secs(10)));
        assert!(policy.is_exhausted(3, Duration::from_secs(10)));
        assert!(policy.is_exhausted(1, Duration::from_secs(60)));
    }

    #[test]
    fn success_on_first_attempt() {
        let clock = ManualClock::new();
        let scheduler = RetryScheduler::new(RetryPolicy::with_max_attempts(5), &clock);

        let report = scheduler
            .run("t1", |_| Ok(PollOutcome::Succeeded(succeeded())))
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.elapsed, Duration::ZERO);
    }

    #[test]
    fn failures_and_query_errors_are_retried() {
        let clock = ManualClock::new();
        let scheduler = RetryScheduler::new(RetryPolicy::with_max_attempts(5), &clock);

        let report = scheduler
            .run("t1", |attempt| match attempt {
                1 => Ok(PollOutcome::Failed(failed())),
                2 => Err(QueryError::Connection("metastore restarting".to_string()).into()),
                3 => Ok(PollOutcome::TimedOut {
                    last: None,
                    waited: Duration::from_secs(120),
                }),
                _ => Ok(PollOutcome::Succeeded(succeeded())),
            })
            .unwrap();

        assert_eq!(report.attempts, 4);
    }

    #[test]
    fn attempt_limit_reports_last_cause() {
        let clock = ManualClock::new();
        let scheduler = RetryScheduler::new(RetryPolicy::with_max_attempts(3), &clock);
        let mut calls = 0;

        let err = scheduler
            .run("t1", |_| {
                calls += 1;
                Ok(PollOutcome::Failed(failed()))
            })
            .unwrap_err();

        match err {
            CompactionError::RetriesExhausted {
                table,
                attempts,
                last_cause,
                ..
            } => {
                assert_eq!(table, "t1");
                assert_eq!(attempts, 3);
                assert!(matches!(*last_cause, AttemptFailure::Failed(_)));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn duration_bound_stops_retrying() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::with_max_duration(Duration::from_secs(10));
        let scheduler = RetryScheduler::new(policy, &clock);
        let mut calls = 0;

        let err = scheduler
            .run("t1", |_| {
                calls += 1;
                clock.advance(Duration::from_secs(3));
                Ok(PollOutcome::Failed(failed()))
            })
            .unwrap_err();

        // 3s, 6s, 9s, 12s
        assert!(matches!(err, CompactionError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(calls, 4);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let clock = ManualClock::new();
        let scheduler = RetryScheduler::new(RetryPolicy::with_max_attempts(10), &clock);
        let mut calls = 0;

        let err = scheduler
            .run("t1", |_| {
                calls += 1;
                Err(CompactionError::MultipleCompactions {
                    table: "t1".to_string(),
                    kind: CompactionKind::Major,
                    records: vec![failed(), failed()],
                })
            })
            .unwrap_err();

        assert!(matches!(err, CompactionError::MultipleCompactions { .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn delay_is_slept_between_attempts() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::with_max_attempts(3).and_delay(Duration::from_secs(5));
        let scheduler = RetryScheduler::new(policy, &clock);

        let _ = scheduler.run("t1", |_| Ok(PollOutcome::Failed(failed())));

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn delay_longer_than_the_deadline_does_not_retrigger() {
        let clock = ManualClock::new();
        let policy =
            RetryPolicy::with_max_duration(Duration::from_secs(10)).and_delay(Duration::from_secs(30));
        let scheduler = RetryScheduler::new(policy, &clock);
        let mut calls = 0;

        let err = scheduler
            .run("t1", |_| {
                calls += 1;
                Ok(PollOutcome::Failed(failed()))
            })
            .unwrap_err();

        match err {
            CompactionError::RetriesExhausted {
                attempts, elapsed, ..
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(elapsed, Duration::from_secs(10));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls, 1);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
    }

    #[test]
    fn delay_is_cut_to_the_time_left() {
        let clock = ManualClock::new();
        let policy =
            RetryPolicy::with_max_duration(Duration::from_secs(10)).and_delay(Duration::from_secs(4));
        let scheduler = RetryScheduler::new(policy, &clock);
        let mut calls = 0;

        let err = scheduler
            .run("t1", |_| {
                calls += 1;
                clock.advance(Duration::from_secs(1));
                Ok(PollOutcome::Failed(failed()))
            })
            .unwrap_err();

        // attempts end at 1s and 6s; the second pause runs into the deadline
        assert!(matches!(err, CompactionError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(calls, 2);
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(4); 2]);
    }

    #[test]
    fn remaining_time_saturates() {
        let policy = RetryPolicy::with_max_duration(Duration::from_secs(10));
        assert_eq!(policy.remaining(Duration::from_secs(4)), Some(Duration::from_secs(6)));
        assert_eq!(policy.remaining(Duration::from_secs(12)), Some(Duration::ZERO));
        assert_eq!(RetryPolicy::with_max_attempts(2).remaining(Duration::ZERO), None);
    }
}
