//! Compaction completion monitor for transactional table product tests.
//!
//! A compaction is triggered with a side-effecting command and its progress
//! can only be observed through an eventually consistent status listing
//! (`SHOW COMPACTIONS`). This crate turns that listing into a two-level
//! state machine:
//!
//! - [`CompletionPoller`] polls the listing until the compaction started
//!   after the trigger succeeds, fails, or the attempt times out.
//! - [`RetryScheduler`] re-issues the whole trigger-and-wait sequence until
//!   it succeeds or the [`RetryPolicy`] is exhausted.
//!
//! [`CompactionMonitor`] wires both to a [`CompactionTrigger`] +
//! [`StatusListing`] service and a [`Clock`].
//!
//! # Precondition
//!
//! At most one compaction of a given kind may be outstanding per table.
//! Tests must disable automatic compaction for the tables they compact;
//! the monitor treats two matching in-flight compactions as a fatal
//! consistency violation instead of arbitrating between them.

pub mod clock;
pub mod config;
mod error;
pub mod filter;
pub mod monitor;
pub mod poller;
pub mod retry;
pub mod service;
pub mod status;
mod target;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, Interrupted, SleepInterrupter, SystemClock};
pub use config::{ConfigError, MonitorConfig};
pub use error::{AttemptFailure, CompactionError};
pub use filter::CompactionQuery;
pub use monitor::CompactionMonitor;
pub use poller::{CompletionPoller, PollOutcome, PollState};
pub use retry::{RetryPolicy, RetryReport, RetryScheduler};
pub use service::{CompactionTrigger, HiveCompactions, StatusListing};
pub use status::{parse_status_listing, StatusRecord};
pub use target::{CompactionKind, CompactionTarget};
