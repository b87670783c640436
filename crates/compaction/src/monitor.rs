//! Trigger-and-wait orchestration.

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, MonitorConfig};
use crate::error::CompactionError;
use crate::filter::CompactionQuery;
use crate::poller::{CompletionPoller, PollOutcome};
use crate::retry::{RetryReport, RetryScheduler};
use crate::service::{CompactionTrigger, StatusListing};
use crate::status::parse_status_listing;
use crate::{CompactionKind, CompactionTarget};

/// Compacts tables and blocks until the compaction is reported finished.
///
/// `S` both enqueues compactions and lists them, typically a
/// [`HiveCompactions`](crate::HiveCompactions) wrapping a Hive executor.
pub struct CompactionMonitor<S, C = SystemClock> {
    service: S,
    clock: C,
    config: MonitorConfig,
}

impl<S> CompactionMonitor<S, SystemClock>
where
    S: CompactionTrigger + StatusListing,
{
    pub fn new(service: S, config: MonitorConfig) -> Result<Self, ConfigError> {
        Self::with_clock(service, SystemClock::new(), config)
    }
}

impl<S, C> CompactionMonitor<S, C>
where
    S: CompactionTrigger + StatusListing,
    C: Clock,
{
    /// Fails if `config` does not pass [`MonitorConfig::validate`].
    pub fn with_clock(service: S, clock: C, config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(CompactionMonitor {
            service,
            clock,
            config,
        })
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Trigger a `kind` compaction of `target` and wait for it to succeed,
    /// re-triggering after failures and timeouts until the retry policy
    /// derived from the config runs out.
    pub fn compact_and_wait(
        &self,
        kind: CompactionKind,
        target: &CompactionTarget,
    ) -> Result<RetryReport, CompactionError> {
        tracing::info!(%target, %kind, "Running compaction");

        let scheduler = RetryScheduler::new(self.config.retry_policy(), &self.clock);
        let result = scheduler.run(target.table_name(), |attempt| {
            tracing::debug!(%target, %kind, attempt, "Triggering compaction");
            self.try_compact(kind, target)
        });

        match &result {
            Ok(report) => tracing::info!(
                %target,
                %kind,
                attempts = report.attempts,
                elapsed = ?report.elapsed,
                "Finished compaction"
            ),
            Err(err) => tracing::error!(%target, %kind, error = %err, "Could not compact table"),
        }
        result
    }

    /// One attempt: trigger once and poll until a terminal outcome or the
    /// attempt timeout.
    pub fn try_compact(
        &self,
        kind: CompactionKind,
        target: &CompactionTarget,
    ) -> Result<PollOutcome, CompactionError> {
        let not_before = self.clock.now_utc();
        let query = CompactionQuery::new(target.table_name(), kind).started_not_before(not_before);

        self.service.trigger_compaction(target, kind)?;

        let started = query
            .any_start_time()
            .select(&parse_status_listing(&self.service.list_compactions()?));
        tracing::info!(
            table = query.table(),
            %kind,
            compactions = ?started,
            "Started compactions after trigger"
        );

        CompletionPoller::new(
            &self.service,
            &self.clock,
            self.config.poll_interval,
            self.config.attempt_timeout,
        )
        .wait(&query)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{ManualClock, SimulatedMetastore};

    fn config() -> MonitorConfig {
        MonitorConfig {
            timeout: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(10),
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn try_compact_triggers_once_and_waits() {
        let clock = ManualClock::new();
        let metastore = SimulatedMetastore::new(clock.clone())
            .with_plan(&[None, Some("initiated"), Some("succeeded")]);
        let monitor = CompactionMonitor::with_clock(metastore, clock.clone(), config()).unwrap();

        let outcome = monitor
            .try_compact(CompactionKind::Major, &CompactionTarget::table("orders"))
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(monitor.service().trigger_count(), 1);
        // one listing for the started-compactions log, then two polls
        assert_eq!(monitor.service().listing_count(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn earlier_compactions_are_ignored() {
        let clock = ManualClock::new();
        let metastore = SimulatedMetastore::new(clock.clone())
            .with_existing("orders", CompactionKind::Major, "succeeded", "1000")
            .with_plan(&[Some("working"), Some("working"), Some("succeeded")]);
        let monitor = CompactionMonitor::with_clock(metastore, clock.clone(), config()).unwrap();

        let outcome = monitor
            .try_compact(CompactionKind::Major, &CompactionTarget::table("orders"))
            .unwrap();

        match outcome {
            PollOutcome::Succeeded(record) => assert_ne!(record.start_time_millis(), Some(1000)),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn config_built_in_code_is_validated() {
        let clock = ManualClock::new();
        let config = MonitorConfig {
            poll_interval: Duration::ZERO,
            ..config()
        };

        let result =
            CompactionMonitor::with_clock(SimulatedMetastore::new(clock.clone()), clock, config);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
