//! Poison-tolerant lock helpers
//!
//! Cache and quota maps are plain std mutexes that are never held across an
//! `.await`. A panic while one is held must not take the whole service down,
//! so poisoned guards are recovered and the event is logged.

use std::sync::{Mutex, MutexGuard};

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!(
                "Recovered from poisoned lock in {} during {} (state may be stale)",
                target,
                op
            );
            poisoned.into_inner()
        }
    }
}
