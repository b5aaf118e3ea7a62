//! Fixed-interval timer for the staleness sweep
//!
//! Poll style: the host calls [`SweepTimer::is_due`] from its event loop
//! instead of the manager owning a background task.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct SweepTimer {
    /// Sweep interval in milliseconds
    interval_ms: u64,
    /// When the sweep last ran (or when the timer was created)
    last_run: Instant,
}

impl SweepTimer {
    pub fn new(interval_ms: u64) -> Self {
        Self::started_at(interval_ms, Instant::now())
    }

    pub fn started_at(interval_ms: u64, now: Instant) -> Self {
        Self {
            interval_ms,
            last_run: now,
        }
    }

    pub fn is_due(&self) -> bool {
        self.is_due_at(Instant::now())
    }

    /// Returns `true` once at least `interval_ms` has passed since the last run.
    pub fn is_due_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_run) >= Duration::from_millis(self.interval_ms)
    }

    pub fn mark_run(&mut self) {
        self.mark_run_at(Instant::now());
    }

    pub fn mark_run_at(&mut self, now: Instant) {
        self.last_run = now;
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

impl Default for SweepTimer {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_not_due_right_after_creation() {
        let start = Instant::now();
        let timer = SweepTimer::started_at(1000, start);

        assert!(!timer.is_due_at(start));
        assert!(!timer.is_due_at(start + Duration::from_millis(999)));
        assert!(timer.is_due_at(start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_mark_run_restarts_interval() {
        let start = Instant::now();
        let mut timer = SweepTimer::started_at(500, start);

        let later = start + Duration::from_millis(600);
        assert!(timer.is_due_at(later));

        timer.mark_run_at(later);
        assert!(!timer.is_due_at(later + Duration::from_millis(100)));
        assert!(timer.is_due_at(later + Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_interval_is_always_due() {
        let timer = SweepTimer::new(0);
        assert!(timer.is_due());
        assert_eq!(timer.interval_ms(), 0);
    }

    proptest! {
        #[test]
        fn prop_due_exactly_after_interval(interval in 1u64..100_000, elapsed in 0u64..200_000) {
            let start = Instant::now();
            let timer = SweepTimer::started_at(interval, start);

            prop_assert_eq!(
                timer.is_due_at(start + Duration::from_millis(elapsed)),
                elapsed >= interval
            );
        }
    }
}
