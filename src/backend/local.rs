//! In-process Backend
//!
//! HashMap of entries with lazily-checked expiry. Single-process fallback
//! for development; state is never shared between processes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::stream;

use super::{BackendKind, CacheBackend, KeyBatches};
use crate::cache::{CacheEntry, Clock, SystemClock};
use crate::error::{CacheError, Result};

// == Local Backend ==
/// In-process key/value store with per-entry expiry.
pub struct LocalBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl LocalBackend {
    // == Constructor ==
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a backend that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .read()
            .map_err(|_| CacheError::Internal("local cache lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .write()
            .map_err(|_| CacheError::Internal("local cache lock poisoned".to_string()))
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    // == Get ==
    /// Returns the value unless expired; expired entries are removed here.
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        {
            let entries = self.read()?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.write()?;
        // Re-check under the write lock; a concurrent set may have replaced it.
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    // == Set ==
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<()> {
        let entry = CacheEntry::new(value, ttl_seconds, self.clock.now());
        self.write()?.insert(key.to_string(), entry);
        Ok(())
    }

    // == Delete ==
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        let mut entries = self.write()?;
        Ok(keys.iter().filter(|key| entries.remove(*key).is_some()).count())
    }

    // == Scan ==
    /// Full-map filter; one batch holding every matching key.
    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> KeyBatches<'a> {
        Box::pin(stream::once(async move { self.keys_with_prefix(prefix) }))
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    // == Purge Expired ==
    async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }
}
