//! In-process durable store
//!
//! Useful as the default store for a single session and as the store behind
//! tests. Expired entries read as absent but stay in the map until a batch
//! delete removes them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::TimeDelta;

use super::{DeletePredicate, DurableStore, StorageError, StoredValue};
use crate::clock::{Clock, SystemClock};
use crate::lock::mutex_lock;

const SOURCE: &str = "store::memory";

#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries physically held, expired ones included.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.now();
        let entries = mutex_lock(&self.entries, SOURCE, "get");
        Ok(entries
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<TimeDelta>,
    ) -> Result<(), StorageError> {
        let stored = StoredValue::new(value, self.clock.now(), ttl);
        mutex_lock(&self.entries, SOURCE, "set").insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete_where(
        &self,
        prefix: &str,
        predicate: DeletePredicate<'_>,
    ) -> Result<usize, StorageError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_where");
        let before = entries.len();
        entries.retain(|key, stored| !(key.starts_with(prefix) && predicate(key, &stored.value)));
        Ok(before - entries.len())
    }
}
