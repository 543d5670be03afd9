//! Cache Store Port
//!
//! Key-value collaborator behind the cache-aside layer.

use crate::domain::entities::CacheEntry;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Store for time-boxed cache entries.
///
/// Implementations must never return an entry whose expiration has passed:
/// `get` reports not-found for absent and expired keys alike.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the entry for `key` if it is still fresh at `now_ms`.
    async fn get(&self, key: &str, now_ms: u64) -> Result<Option<CacheEntry>, CacheStoreError>;

    /// Create or overwrite the entry for `key`.
    async fn set(&self, key: &str, entry: CacheEntry, now_ms: u64) -> Result<(), CacheStoreError>;

    /// Drop the entry for `key`, if any.
    async fn remove(&self, key: &str) -> Result<(), CacheStoreError>;
}
