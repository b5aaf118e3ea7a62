//! JSON file backed store
//!
//! The whole map is kept in memory and rewritten on every mutation through a
//! temporary file and rename. No file locking: if two processes share a file
//! the last writer wins, which is acceptable for cache and quota data.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::TimeDelta;

use super::{DeletePredicate, DurableStore, StorageError, StoredValue};
use crate::clock::{Clock, SystemClock};
use crate::lock::mutex_lock;

const SOURCE: &str = "store::file";
const STORE_DIR: &str = "proseline";
const STORE_FILE: &str = "store.json";

/// Default location of the store file in the user data directory.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(STORE_DIR).join(STORE_FILE))
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is an error.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        log::debug!("Opened store {:?} with {} entries", path, entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            clock,
        })
    }

    /// Open the store at [`default_store_path`] using the system clock.
    pub fn open_default() -> Result<Self, StorageError> {
        let path = default_store_path().ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;
        Self::open(path, Arc::new(SystemClock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, StoredValue>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_string(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
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
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");
        let mut next = entries.clone();
        next.insert(key.to_string(), stored);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    async fn delete_where(
        &self,
        prefix: &str,
        predicate: DeletePredicate<'_>,
    ) -> Result<usize, StorageError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_where");
        let mut next = entries.clone();
        next.retain(|key, stored| !(key.starts_with(prefix) && predicate(key, &stored.value)));
        let deleted = entries.len() - next.len();
        if deleted > 0 {
            // Memory only changes once the file does
            self.persist(&next)?;
            *entries = next;
        }
        Ok(deleted)
    }
}
