//! Monitor configuration.
//!
//! Durations are written in human form and every key is optional:
//!
//! ```toml
//! timeout = "6m"          # give up re-triggering after this long
//! attempt_timeout = "2m"  # wait this long for one triggered compaction
//! poll_interval = "1s"
//! retry_delay = "0s"
//! max_attempts = 10       # unbounded when omitted
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse monitor config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid monitor config: {0}")]
    Invalid(String),
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// Timing of [`CompactionMonitor`](crate::CompactionMonitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Overall deadline for re-triggering.
    pub timeout: Duration,
    /// How long a single triggered compaction is polled.
    pub attempt_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause between a failed attempt and the next trigger.
    pub retry_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            timeout: Duration::from_secs(6 * 60),
            attempt_timeout: Duration::from_secs(2 * 60),
            poll_interval: Duration::from_secs(1),
            retry_delay: Duration::ZERO,
            max_attempts: None,
        }
    }
}

/// On-disk form. Missing keys fall back to [`MonitorConfig::default`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MonitorConfigFile {
    timeout: Option<DurationString>,
    attempt_timeout: Option<DurationString>,
    poll_interval: Option<DurationString>,
    retry_delay: Option<DurationString>,
    max_attempts: Option<u32>,
}

impl From<MonitorConfigFile> for MonitorConfig {
    fn from(file: MonitorConfigFile) -> Self {
        let defaults = MonitorConfig::default();
        let or_default =
            |value: Option<DurationString>, default: Duration| value.map_or(default, Duration::from);
        MonitorConfig {
            timeout: or_default(file.timeout, defaults.timeout),
            attempt_timeout: or_default(file.attempt_timeout, defaults.attempt_timeout),
            poll_interval: or_default(file.poll_interval, defaults.poll_interval),
            retry_delay: or_default(file.retry_delay, defaults.retry_delay),
            max_attempts: file.max_attempts.or(defaults.max_attempts),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl MonitorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: MonitorConfigFile = toml::from_str(content)?;
        let config = MonitorConfig::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks:
    /// - the poll interval is non-zero,
    /// - one attempt fits within the overall timeout,
    /// - the retry delay is shorter than the overall timeout,
    /// - `max_attempts`, when set, is at least one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.attempt_timeout > self.timeout {
            return Err(ConfigError::Invalid(format!(
                "attempt_timeout ({:?}) exceeds timeout ({:?})",
                self.attempt_timeout, self.timeout
            )));
        }
        if self.retry_delay >= self.timeout {
            return Err(ConfigError::Invalid(format!(
                "retry_delay ({:?}) leaves no time for a retry within timeout ({:?})",
                self.retry_delay, self.timeout
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The outer retry policy: bounded by `timeout` and, if set, by
    /// `max_attempts`.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::with_max_duration(self.timeout).and_delay(self.retry_delay);
        match self.max_attempts {
            Some(max) => policy.and_max_attempts(max),
            None => policy,
        }
    }
}
