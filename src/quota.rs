//! Per-identity usage quota
//!
//! Requests and characters are counted in a fixed window per identity. The
//! counters live in memory and are written through to the durable store:
//! full analyses flush immediately, real-time checks are batched into one
//! delayed flush per identity. If the store cannot be read the tracker fails
//! open so that a storage outage never blocks writing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, seconds};
use crate::config::QuotaConfig;
use crate::lock::mutex_lock;
use crate::store::DurableStore;

const SOURCE: &str = "quota";

/// Durable key namespace for quota records
pub const QUOTA_KEY_PREFIX: &str = "quota:";

/// Which kind of analysis is being paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaTier {
    /// Explicit whole-document analysis, base limits
    FullAnalysis,
    /// Debounced checks while typing
    RealTime,
}

/// The limit a denied request ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLimit {
    Requests,
    Characters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// `remaining_requests` is `None` when the tracker failed open
    Allowed { remaining_requests: Option<u32> },
    Denied {
        retry_after_secs: u64,
        exceeded: QuotaLimit,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

/// Usage of one identity within the current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    pub identity: String,
    pub window_start: DateTime<Utc>,
    pub request_count: u32,
    pub character_count: u64,
    #[serde(default)]
    pub last_request_at: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    pub fn new(identity: &str, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.to_string(),
            window_start: now,
            request_count: 0,
            character_count: 0,
            last_request_at: None,
        }
    }

    fn window_elapsed(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now.signed_duration_since(self.window_start) >= window
    }

    fn reset(&mut self, now: DateTime<Utc>) {
        self.window_start = now;
        self.request_count = 0;
        self.character_count = 0;
    }
}

pub fn quota_key(identity: &str) -> String {
    format!("{QUOTA_KEY_PREFIX}{identity}")
}

#[derive(Debug)]
struct CachedRecord {
    record: QuotaRecord,
    loaded_at: DateTime<Utc>,
    dirty: bool,
    flush_scheduled: bool,
}

#[derive(Debug, Clone, Copy)]
struct TierLimits {
    requests: u32,
    characters: u64,
}

struct TrackerInner {
    config: QuotaConfig,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, CachedRecord>>,
}

/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct QuotaTracker {
    inner: Arc<TrackerInner>,
}

enum Loaded {
    Record(QuotaRecord),
    Unavailable,
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig, store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                config,
                store,
                clock,
                records: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Check the identity's limits for `tier` and, if allowed, count the request.
    pub async fn check_and_consume(
        &self,
        identity: &str,
        cost_chars: u64,
        tier: QuotaTier,
    ) -> QuotaDecision {
        let inner = &self.inner;
        let now = inner.clock.now();

        if !inner.has_fresh_record(identity, now) {
            match inner.load(identity, now).await {
                Loaded::Record(record) => inner.install(record, now),
                Loaded::Unavailable => {
                    return QuotaDecision::Allowed {
                        remaining_requests: None,
                    };
                }
            }
        }

        let limits = inner.limits(tier);
        let window = seconds(inner.config.window_secs);

        let (decision, schedule) = {
            let mut records = mutex_lock(&inner.records, SOURCE, "check_and_consume");
            let Some(cached) = records.get_mut(identity) else {
                log::error!("Quota record for {} vanished after load", identity);
                return QuotaDecision::Allowed {
                    remaining_requests: None,
                };
            };
            let record = &mut cached.record;

            if record.window_elapsed(now, window) {
                log::debug!("Quota window for {} elapsed, resetting", identity);
                record.reset(now);
                cached.dirty = true;
            }

            let exceeded = if record.request_count.saturating_add(1) > limits.requests {
                Some(QuotaLimit::Requests)
            } else if record.character_count.saturating_add(cost_chars) > limits.characters {
                Some(QuotaLimit::Characters)
            } else {
                None
            };

            if let Some(exceeded) = exceeded {
                let retry_after_secs = retry_after_secs(record.window_start + window, now);
                log::debug!(
                    "Quota denied for {} ({:?}), retry in {}s",
                    identity,
                    exceeded,
                    retry_after_secs
                );
                return QuotaDecision::Denied {
                    retry_after_secs,
                    exceeded,
                };
            }

            record.request_count += 1;
            record.character_count += cost_chars;
            record.last_request_at = Some(now);
            cached.dirty = true;

            let remaining = limits.requests - record.request_count;
            let schedule = tier == QuotaTier::RealTime && !cached.flush_scheduled;
            if schedule {
                cached.flush_scheduled = true;
            }

            (
                QuotaDecision::Allowed {
                    remaining_requests: Some(remaining),
                },
                schedule,
            )
        };

        match tier {
            QuotaTier::FullAnalysis => inner.flush(identity).await,
            QuotaTier::RealTime if schedule => self.schedule_flush(identity).await,
            QuotaTier::RealTime => {}
        }

        decision
    }

    /// Current usage for an identity, with an elapsed window shown as empty.
    pub async fn usage(&self, identity: &str) -> Option<QuotaRecord> {
        let inner = &self.inner;
        let now = inner.clock.now();

        let record = if inner.has_fresh_record(identity, now) {
            let records = mutex_lock(&inner.records, SOURCE, "usage");
            records.get(identity).map(|cached| cached.record.clone())
        } else {
            match inner.load(identity, now).await {
                Loaded::Record(record) => Some(record),
                Loaded::Unavailable => None,
            }
        };

        record.map(|mut record| {
            if record.window_elapsed(now, seconds(inner.config.window_secs)) {
                record.reset(now);
            }
            record
        })
    }

    /// Write every dirty record now.
    pub async fn flush_all(&self) {
        let dirty: Vec<String> = {
            let records = mutex_lock(&self.inner.records, SOURCE, "flush_all");
            records
                .iter()
                .filter(|(_, cached)| cached.dirty)
                .map(|(identity, _)| identity.clone())
                .collect()
        };

        if dirty.is_empty() {
            return;
        }

        log::debug!("Flushing {} quota records", dirty.len());
        futures::future::join_all(dirty.iter().map(|identity| self.inner.flush(identity))).await;
    }

    /// Delete durable records whose window ended more than one window ago.
    pub async fn purge_stale(&self) -> usize {
        let now = self.inner.clock.now();
        let window = seconds(self.inner.config.window_secs);
        let stale = move |_key: &str, value: &str| {
            serde_json::from_str::<QuotaRecord>(value).map_or(true, |record| {
                now.signed_duration_since(record.window_start) >= window + window
            })
        };

        {
            let mut records = mutex_lock(&self.inner.records, SOURCE, "purge_stale");
            records.retain(|_, cached| {
                cached.dirty || now.signed_duration_since(cached.record.window_start) < window
            });
        }

        match self.inner.store.delete_where(QUOTA_KEY_PREFIX, &stale).await {
            Ok(deleted) => deleted,
            Err(e) => {
                log::warn!("Failed to purge stale quota records: {}", e);
                0
            }
        }
    }

    async fn schedule_flush(&self, identity: &str) {
        let delay = Duration::from_millis(self.inner.config.flush_delay_ms);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                let identity = identity.to_string();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.flush(&identity).await;
                });
            }
            Err(_) => {
                log::debug!("No runtime for a delayed quota flush, flushing inline");
                self.inner.flush(identity).await;
            }
        }
    }
}

impl TrackerInner {
    fn limits(&self, tier: QuotaTier) -> TierLimits {
        let (request_multiplier, character_multiplier) = match tier {
            QuotaTier::FullAnalysis => (1.0, 1.0),
            QuotaTier::RealTime => (
                self.config.realtime_request_multiplier,
                self.config.realtime_character_multiplier,
            ),
        };

        TierLimits {
            requests: (f64::from(self.config.max_requests_per_hour) * request_multiplier).floor()
                as u32,
            characters: (self.config.max_characters_per_hour as f64 * character_multiplier)
                .floor() as u64,
        }
    }

    /// Dirty records are authoritative; clean ones only for `memory_ttl`.
    fn has_fresh_record(&self, identity: &str, now: DateTime<Utc>) -> bool {
        let memory_ttl = seconds(self.config.memory_ttl_secs);
        let records = mutex_lock(&self.records, SOURCE, "has_fresh_record");
        records.get(identity).is_some_and(|cached| {
            cached.dirty || now.signed_duration_since(cached.loaded_at) < memory_ttl
        })
    }

    async fn load(&self, identity: &str, now: DateTime<Utc>) -> Loaded {
        match self.store.get(&quota_key(identity)).await {
            Ok(Some(raw)) => match serde_json::from_str::<QuotaRecord>(&raw) {
                Ok(record) => Loaded::Record(record),
                Err(e) => {
                    log::warn!("Discarding undecodable quota record for {}: {}", identity, e);
                    Loaded::Record(QuotaRecord::new(identity, now))
                }
            },
            Ok(None) => Loaded::Record(QuotaRecord::new(identity, now)),
            Err(e) => {
                log::warn!("Quota store unavailable for {}, allowing request: {}", identity, e);
                Loaded::Unavailable
            }
        }
    }

    /// Install a loaded record unless a dirty one appeared in the meantime.
    fn install(&self, record: QuotaRecord, now: DateTime<Utc>) {
        let mut records = mutex_lock(&self.records, SOURCE, "install");
        match records.get_mut(&record.identity) {
            Some(cached) if cached.dirty => {}
            Some(cached) => {
                cached.record = record;
                cached.loaded_at = now;
            }
            None => {
                records.insert(
                    record.identity.clone(),
                    CachedRecord {
                        record,
                        loaded_at: now,
                        dirty: false,
                        flush_scheduled: false,
                    },
                );
            }
        }
    }

    async fn flush(&self, identity: &str) {
        let snapshot = {
            let mut records = mutex_lock(&self.records, SOURCE, "flush");
            match records.get_mut(identity) {
                Some(cached) if cached.dirty => {
                    cached.dirty = false;
                    cached.flush_scheduled = false;
                    Some(cached.record.clone())
                }
                Some(cached) => {
                    cached.flush_scheduled = false;
                    None
                }
                None => None,
            }
        };

        let Some(record) = snapshot else {
            return;
        };

        let written = match serde_json::to_string(&record) {
            Ok(serialized) => self
                .store
                .set(&quota_key(identity), serialized, None)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let mut records = mutex_lock(&self.records, SOURCE, "flush.result");
        let Some(cached) = records.get_mut(identity) else {
            return;
        };
        match written {
            Ok(()) => cached.loaded_at = self.clock.now(),
            Err(e) => {
                log::warn!("Failed to flush quota record for {}: {}", identity, e);
                cached.dirty = true;
            }
        }
    }
}

/// Whole seconds until `reset_at`, never less than one.
fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining_ms = reset_at.signed_duration_since(now).num_milliseconds().max(0) as u64;
    remaining_ms.div_ceil(1000).max(1)
}

#[cfg(test)]
#[path = "quota_tests.rs"]
mod quota_tests;
