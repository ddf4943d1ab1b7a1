//! Monotonic and wall-clock time, abstracted behind a trait.
//!
//! Every component that needs "now" takes a `Arc<dyn Clock>` instead of
//! calling `Utc::now()`/`Instant::now()` directly, so tests can drive
//! staleness, blackout windows, and settlement backoff deterministically.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current monotonic instant, for measuring elapsed durations.
    fn monotonic_now(&self) -> Instant;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

/// Settable clock for deterministic tests.
///
/// `monotonic_now` always returns a real `Instant` (it cannot be faked
/// portably), but callers that need to test elapsed-time logic should
/// measure against `now_utc` instead, which is fully controllable.
pub struct TestClock {
    millis_since_epoch: AtomicI64,
    anchor: Instant,
}

impl TestClock {
    /// Creates a test clock starting at the given wall-clock time.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis_since_epoch: AtomicI64::new(start.timestamp_millis()),
            anchor: Instant::now(),
        }
    }

    /// Advances the wall clock by the given duration.
    pub fn advance(&self, duration: chrono::Duration) {
        self.millis_since_epoch
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }

    /// Sets the wall clock to an absolute time.
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis_since_epoch
            .store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis_since_epoch.load(Ordering::SeqCst))
            .unwrap_or_else(Utc::now)
    }

    fn monotonic_now(&self) -> Instant {
        self.anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = TestClock::new(start);
        assert_eq!(clock.now_utc(), start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now_utc(), start + chrono::Duration::seconds(30));
    }

    #[test]
    fn test_system_clock_monotonic_increases() {
        let clock = SystemClock;
        let a = clock.monotonic_now();
        let b = clock.monotonic_now();
        assert!(b >= a);
    }
}
