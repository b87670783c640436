//! Time and blocking sleep as seen by the poller and the retry scheduler.
//!
//! The monitor captures wall-clock time once per attempt (to filter the
//! status listing by start time) and measures elapsed time with a monotonic
//! clock. Between polls the calling thread blocks; there is no cooperative
//! yielding. A sleep can be interrupted from another thread through a
//! [`SleepInterrupter`], which aborts the whole wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use time::OffsetDateTime;

/// The sleeping thread was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sleep interrupted")]
pub struct Interrupted;

pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now_utc(&self) -> OffsetDateTime;

    /// Current monotonic instant, used only to measure elapsed time.
    fn instant(&self) -> Instant;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_utc(&self) -> OffsetDateTime {
        (**self).now_utc()
    }

    fn instant(&self) -> Instant {
        (**self).instant()
    }

    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        (**self).sleep(duration)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_utc(&self) -> OffsetDateTime {
        (**self).now_utc()
    }

    fn instant(&self) -> Instant {
        (**self).instant()
    }

    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        (**self).sleep(duration)
    }
}

// ──────────────────────────────────────────────
// SystemClock
// ──────────────────────────────────────────────

/// The real clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    interrupt: Option<Arc<InterruptState>>,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { interrupt: None }
    }

    /// A clock whose sleeps can be cut short by the returned handle.
    pub fn interruptible() -> (Self, SleepInterrupter) {
        let state = Arc::new(InterruptState::default());
        (
            SystemClock {
                interrupt: Some(state.clone()),
            },
            SleepInterrupter { state },
        )
    }
}

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        match &self.interrupt {
            None => {
                thread::sleep(duration);
                Ok(())
            }
            Some(state) => state.sleep(duration),
        }
    }
}

// ──────────────────────────────────────────────
// Interruption
// ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct InterruptState {
    interrupted: AtomicBool,
    sleepers: Mutex<Vec<Thread>>,
}

impl InterruptState {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let deadline = Instant::now() + duration;
        let current = thread::current();
        self.lock_sleepers().push(current.clone());

        let result = loop {
            if self.interrupted.load(Ordering::SeqCst) {
                break Err(Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                break Ok(());
            }
            // Spurious wake-ups are fine: the loop re-checks both conditions.
            thread::park_timeout(deadline - now);
        };

        self.lock_sleepers().retain(|t| t.id() != current.id());
        result
    }

    fn lock_sleepers(&self) -> std::sync::MutexGuard<'_, Vec<Thread>> {
        self.sleepers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle that interrupts sleeps of an interruptible [`SystemClock`].
///
/// Interruption is sticky: once interrupted, every current and future sleep
/// on that clock fails with [`Interrupted`].
#[derive(Debug, Clone)]
pub struct SleepInterrupter {
    state: Arc<InterruptState>,
}

impl SleepInterrupter {
    pub fn interrupt(&self) {
        self.state.interrupted.store(true, Ordering::SeqCst);
        for sleeper in self.state.lock_sleepers().iter() {
            sleeper.unpark();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.interrupted.load(Ordering::SeqCst)
    }
}
