//! Wall-clock abstraction
//!
//! Cache ages and quota windows are computed against an injected [`Clock`]
//! so that services can be driven deterministically in tests.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};

use crate::lock::mutex_lock;

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts at the Unix epoch plus one day, far from any real timestamp.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::UNIX_EPOCH + TimeDelta::days(1))
    }

    pub fn advance(&self, delta: TimeDelta) {
        *mutex_lock(&self.now, "clock::manual", "advance") += delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *mutex_lock(&self.now, "clock::manual", "set") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *mutex_lock(&self.now, "clock::manual", "now")
    }
}

/// Convert a millisecond setting into a [`TimeDelta`], saturating on overflow.
pub fn millis(ms: u64) -> TimeDelta {
    i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Convert a second setting into a [`TimeDelta`], saturating on overflow.
pub fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        let start = clock.now();

        clock.advance(TimeDelta::milliseconds(1500));

        assert_eq!(clock.now() - start, TimeDelta::milliseconds(1500));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::at_epoch();
        let target = DateTime::UNIX_EPOCH + TimeDelta::days(30);

        clock.set(target);

        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_duration_helpers() {
        assert_eq!(millis(250), TimeDelta::milliseconds(250));
        assert_eq!(seconds(3600), TimeDelta::hours(1));
    }
}
