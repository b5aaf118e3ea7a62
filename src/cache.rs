//! Dual-tier suggestion cache
//!
//! A bounded in-process LRU sits in front of the durable store. Entries carry
//! their own `cached_at` and TTL so the expiry check does not depend on the
//! store honouring TTLs. The cache is best effort: store failures are logged
//! and turn into misses or skipped writes.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::clock::{Clock, seconds};
use crate::config::CacheConfig;
use crate::hasher::CACHE_KEY_PREFIX;
use crate::lock::mutex_lock;
use crate::store::DurableStore;

const SOURCE: &str = "cache";

/// Cached analysis result as persisted in the durable tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: AnalysisResult,
    pub cached_at: DateTime<Utc>,
    pub ttl_ms: i64,
}

impl CacheEntry {
    pub fn new(result: AnalysisResult, cached_at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            result,
            cached_at,
            ttl_ms: ttl.num_milliseconds(),
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        TimeDelta::try_milliseconds(self.ttl_ms).unwrap_or(TimeDelta::MAX)
    }

    /// An entry is never a hit once `now - cached_at > ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.cached_at) > self.ttl()
    }
}

struct MemoryEntry {
    entry: CacheEntry,
    inserted_at: DateTime<Utc>,
}

pub struct SuggestionCache {
    memory: Mutex<LruCache<String, MemoryEntry>>,
    memory_ttl: TimeDelta,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
}

impl SuggestionCache {
    pub fn new(config: &CacheConfig, store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(config.memory_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            memory_ttl: seconds(config.memory_ttl_secs),
            store,
            clock,
        }
    }

    /// Look up a result by cache key, memory tier first.
    pub async fn get(&self, key: &str) -> Option<AnalysisResult> {
        let now = self.clock.now();

        if let Some(result) = self.get_memory(key, now) {
            log::debug!("Cache memory hit for {}", key);
            return Some(result);
        }

        let entry = self.get_durable(key).await?;
        if entry.is_expired(now) {
            log::debug!("Cache durable entry for {} expired", key);
            return None;
        }

        log::debug!("Cache durable hit for {}", key);
        let result = entry.result.clone();
        self.put_memory(key, entry, now);
        Some(result)
    }

    /// Store a result under `key` for `ttl_hours`.
    ///
    /// An unexpired durable entry that was cached later than this one is kept.
    pub async fn set(&self, key: &str, result: &AnalysisResult, ttl_hours: u64) {
        let now = self.clock.now();
        let entry = CacheEntry::new(result.clone(), now, seconds(ttl_hours.saturating_mul(3600)));

        if let Some(existing) = self.get_durable(key).await {
            if !existing.is_expired(now) && existing.cached_at > entry.cached_at {
                log::debug!("Keeping newer cache entry for {}", key);
                self.put_memory(key, existing, now);
                return;
            }
        }

        let serialized = match serde_json::to_string(&entry) {
            Ok(serialized) => serialized,
            Err(e) => {
                log::warn!("Failed to encode cache entry for {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(key, serialized, None).await {
            log::warn!("Failed to write cache entry for {}: {}", key, e);
        }
        self.put_memory(key, entry, now);
    }

    /// Delete expired durable entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let expired = move |_key: &str, value: &str| {
            serde_json::from_str::<CacheEntry>(value).map_or(true, |entry| entry.is_expired(now))
        };

        match self.store.delete_where(CACHE_KEY_PREFIX, &expired).await {
            Ok(deleted) => {
                log::debug!("Purged {} expired cache entries", deleted);
                deleted
            }
            Err(e) => {
                log::warn!("Failed to purge expired cache entries: {}", e);
                0
            }
        }
    }

    pub fn clear_memory(&self) {
        mutex_lock(&self.memory, SOURCE, "clear_memory").clear();
    }

    pub fn memory_len(&self) -> usize {
        mutex_lock(&self.memory, SOURCE, "memory_len").len()
    }

    fn get_memory(&self, key: &str, now: DateTime<Utc>) -> Option<AnalysisResult> {
        let mut memory = mutex_lock(&self.memory, SOURCE, "get_memory");
        let fresh = memory.get(key).map(|cached| {
            now.signed_duration_since(cached.inserted_at) <= self.memory_ttl
                && !cached.entry.is_expired(now)
        })?;

        if fresh {
            memory.get(key).map(|cached| cached.entry.result.clone())
        } else {
            memory.pop(key);
            None
        }
    }

    fn put_memory(&self, key: &str, entry: CacheEntry, now: DateTime<Utc>) {
        mutex_lock(&self.memory, SOURCE, "put_memory").put(
            key.to_string(),
            MemoryEntry {
                entry,
                inserted_at: now,
            },
        );
    }

    async fn get_durable(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Cache lookup for {} failed: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
