//! Deterministic stand-ins for the clock and the metastore.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream test suites.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use acidcheck_query::{QueryError, QueryResult, Row, Value};
use time::macros::datetime;
use time::OffsetDateTime;

use crate::clock::{Clock, Interrupted};
use crate::service::{CompactionTrigger, StatusListing};
use crate::status::{START_TIME_COLUMN, STATE_COLUMN, TABLE_COLUMN, TYPE_COLUMN};
use crate::{CompactionKind, CompactionTarget};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ──────────────────────────────────────────────
// ManualClock
// ──────────────────────────────────────────────

/// A clock that only moves when slept on or advanced explicitly.
///
/// Clones share the same time, so a simulated metastore and the monitor
/// under test can observe one timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    base_instant: Instant,
    base_utc: OffsetDateTime,
    offset: Duration,
    sleeps: Vec<Duration>,
    interrupted: bool,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Starts at 2023-11-14 22:13:20 UTC.
    pub fn new() -> Self {
        Self::starting_at(datetime!(2023-11-14 22:13:20 UTC))
    }

    pub fn starting_at(base_utc: OffsetDateTime) -> Self {
        ManualClock {
            inner: Arc::new(Mutex::new(ManualState {
                base_instant: Instant::now(),
                base_utc,
                offset: Duration::ZERO,
                sleeps: Vec::new(),
                interrupted: false,
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        lock(&self.inner).offset += by;
    }

    /// Total time passed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        lock(&self.inner).offset
    }

    /// Every successful sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.inner).sleeps.clone()
    }

    /// Make every later sleep fail.
    pub fn interrupt(&self) {
        lock(&self.inner).interrupted = true;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        let state = lock(&self.inner);
        state.base_utc + state.offset
    }

    fn instant(&self) -> Instant {
        let state = lock(&self.inner);
        state.base_instant + state.offset
    }

    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let mut state = lock(&self.inner);
        if state.interrupted {
            return Err(Interrupted);
        }
        state.offset += duration;
        state.sleeps.push(duration);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// ScriptedStatusListing
// ──────────────────────────────────────────────

/// Replays a fixed sequence of listing responses.
///
/// Each call consumes one response; the last one repeats forever.
#[derive(Debug)]
pub struct ScriptedStatusListing {
    responses: Mutex<VecDeque<Result<QueryResult, QueryError>>>,
    calls: AtomicUsize,
}

impl ScriptedStatusListing {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<QueryResult, QueryError>>,
    {
        ScriptedStatusListing {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StatusListing for ScriptedStatusListing {
    fn list_compactions(&self) -> Result<QueryResult, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = lock(&self.responses);
        if responses.len() > 1 {
            if let Some(next) = responses.pop_front() {
                return next;
            }
        }
        responses.front().cloned().unwrap_or_else(|| Ok(QueryResult::empty()))
    }
}

// ──────────────────────────────────────────────
// SimulatedMetastore
// ──────────────────────────────────────────────

/// An in-memory metastore that accepts compaction triggers and reports
/// them through a `SHOW COMPACTIONS`-shaped listing.
///
/// Every trigger enqueues a new compaction stamped with the clock's current
/// time. Its listed state follows a plan, one entry per listing call:
/// `None` means the compaction is not visible yet and the last entry
/// repeats. Plans can differ per trigger to model retries.
#[derive(Debug)]
pub struct SimulatedMetastore {
    clock: ManualClock,
    inner: Mutex<MetastoreState>,
}

#[derive(Debug, Default)]
struct MetastoreState {
    plans: Vec<Vec<Option<String>>>,
    preexisting: Vec<[String; 4]>,
    compactions: Vec<SimulatedCompaction>,
    statements: Vec<String>,
    fail_next_trigger: Option<QueryError>,
    fail_next_listing: Option<QueryError>,
    listings: usize,
}

#[derive(Debug)]
struct SimulatedCompaction {
    table: String,
    kind: CompactionKind,
    start_millis: i64,
    plan: Vec<Option<String>>,
    listed: usize,
}

impl SimulatedMetastore {
    /// A metastore where every compaction succeeds on its first listing.
    pub fn new(clock: ManualClock) -> Self {
        SimulatedMetastore {
            clock,
            inner: Mutex::new(MetastoreState {
                plans: vec![vec![Some("succeeded".to_string())]],
                ..MetastoreState::default()
            }),
        }
    }

    /// Use the same state plan for every triggered compaction.
    pub fn with_plan(self, plan: &[Option<&str>]) -> Self {
        self.with_attempt_plans(&[plan])
    }

    /// Plan per trigger: the n-th trigger follows `plans[n]`, and triggers
    /// past the end reuse the last plan.
    pub fn with_attempt_plans(self, plans: &[&[Option<&str>]]) -> Self {
        {
            let mut state = lock(&self.inner);
            state.plans = plans
                .iter()
                .map(|plan| plan.iter().map(|s| s.map(str::to_string)).collect())
                .collect();
        }
        self
    }

    /// A row that is listed from the start, independent of any trigger.
    pub fn with_existing(self, table: &str, kind: CompactionKind, state: &str, start: &str) -> Self {
        lock(&self.inner).preexisting.push([
            table.to_string(),
            kind.label().to_string(),
            state.to_string(),
            start.to_string(),
        ]);
        self
    }

    pub fn fail_next_trigger(&self, error: QueryError) {
        lock(&self.inner).fail_next_trigger = Some(error);
    }

    pub fn fail_next_listing(&self, error: QueryError) {
        lock(&self.inner).fail_next_listing = Some(error);
    }

    /// Statements of all triggers, including failed ones.
    pub fn triggers(&self) -> Vec<String> {
        lock(&self.inner).statements.clone()
    }

    pub fn trigger_count(&self) -> usize {
        lock(&self.inner).statements.len()
    }

    pub fn listing_count(&self) -> usize {
        lock(&self.inner).listings
    }

    fn now_millis(&self) -> i64 {
        (self.clock.now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

impl CompactionTrigger for SimulatedMetastore {
    fn trigger_compaction(
        &self,
        target: &CompactionTarget,
        kind: CompactionKind,
    ) -> Result<(), QueryError> {
        let start_millis = self.now_millis();
        let mut state = lock(&self.inner);
        let statement = target.compact_statement(kind);
        state.statements.push(statement.clone());

        if let Some(error) = state.fail_next_trigger.take() {
            return Err(error);
        }

        let index = state.compactions.len();
        let plan = state
            .plans
            .get(index)
            .or_else(|| state.plans.last())
            .cloned()
            .unwrap_or_default();
        state.compactions.push(SimulatedCompaction {
            table: target.table_name().to_lowercase(),
            kind,
            start_millis,
            plan,
            listed: 0,
        });
        Ok(())
    }
}

impl StatusListing for SimulatedMetastore {
    fn list_compactions(&self) -> Result<QueryResult, QueryError> {
        let mut state = lock(&self.inner);
        state.listings += 1;

        if let Some(error) = state.fail_next_listing.take() {
            return Err(error);
        }

        let mut rows = vec![Row::new(
            [TABLE_COLUMN, TYPE_COLUMN, STATE_COLUMN, START_TIME_COLUMN]
                .into_iter()
                .map(Value::from)
                .collect(),
        )];
        rows.extend(state.preexisting.iter().map(|cells| {
            Row::new(cells.iter().map(|c| Value::from(c.as_str())).collect())
        }));

        for compaction in &mut state.compactions {
            let step = compaction.listed.min(compaction.plan.len().saturating_sub(1));
            compaction.listed += 1;
            let Some(Some(listed_state)) = compaction.plan.get(step) else {
                continue;
            };
            rows.push(Row::new(vec![
                Value::from(compaction.table.as_str()),
                Value::from(compaction.kind.label()),
                Value::from(listed_state.as_str()),
                Value::from(compaction.start_millis.to_string()),
            ]));
        }

        Ok(QueryResult::from_rows(rows))
    }
}
