//! DashMap Cache Store
//!
//! Implements CacheStore in process memory using DashMap for lock-free
//! concurrent access. Used when no external store is configured.

use crate::domain::entities::CacheEntry;
use crate::domain::ports::{CacheStore, CacheStoreError};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory cache store.
///
/// Expiry is passive: an expired entry is dropped when it is read, there is
/// no background sweep.
pub struct DashMapCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl DashMapCacheStore {
    /// Create a new store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DashMapCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for DashMapCacheStore {
    async fn get(&self, key: &str, now_ms: u64) -> Result<Option<CacheEntry>, CacheStoreError> {
        let entry = match self.entries.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        if entry.is_fresh(now_ms) {
            return Ok(Some(entry));
        }

        // Only drop it if nobody replaced it meanwhile
        self.entries.remove_if(key, |_, current| !current.is_fresh(now_ms));
        Ok(None)
    }

    async fn set(&self, key: &str, entry: CacheEntry, _now_ms: u64) -> Result<(), CacheStoreError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheStoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
