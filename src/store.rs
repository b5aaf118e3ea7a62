//! Durable key-value store
//!
//! The cache and the quota tracker persist through the [`DurableStore`]
//! trait. The store is an external collaborator: callers must tolerate every
//! operation failing with [`StorageError`].

mod file;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Errors raised by a durable store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Backing service could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored value could not be encoded or decoded
    #[error("Storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Predicate over `(key, value)` used for batch deletes.
pub type DeletePredicate<'a> = &'a (dyn Fn(&str, &str) -> bool + Send + Sync);

/// Opaque durable key-value store.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch a value. Entries past their store-level TTL read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or overwrite a value with an optional TTL.
    async fn set(&self, key: &str, value: String, ttl: Option<TimeDelta>)
    -> Result<(), StorageError>;

    /// Delete every entry under `prefix` for which `predicate` holds.
    ///
    /// Returns the number of deleted entries.
    async fn delete_where(
        &self,
        prefix: &str,
        predicate: DeletePredicate<'_>,
    ) -> Result<usize, StorageError>;
}

/// A value as kept by the bundled store implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    pub fn new(value: String, now: DateTime<Utc>, ttl: Option<TimeDelta>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| now.checked_add_signed(ttl)),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
