//! Redis Cache Store
//!
//! Implements CacheStore on an external Redis so several gateway instances
//! share one cache. Entries are stored as JSON with a PX expiry matching
//! the entry's own expiration timestamp.

use crate::domain::entities::CacheEntry;
use crate::domain::ports::{CacheStore, CacheStoreError};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

/// Redis-backed cache store.
#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisCacheStore {
    /// Connect to `url`. Keys are namespaced with `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, CacheStoreError> {
        tracing::info!("connecting to Redis cache at {}", url);
        let client = Client::open(url).map_err(backend)?;

        // ConnectionManager reconnects on its own
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("failed to get Redis connection manager: {}", e);
            backend(e)
        })?;

        tracing::info!("connected to Redis cache");
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    pub async fn health_check(&self) -> Result<(), CacheStoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(backend)
    }

    fn namespaced(&self, key: &str) -> String {
        namespaced_key(&self.prefix, key)
    }
}

fn backend(e: redis::RedisError) -> CacheStoreError {
    CacheStoreError::Backend(e.to_string())
}

/// Join prefix and key with exactly one `:`, whether or not the prefix ends in one.
fn namespaced_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches(':');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

fn encode_entry(entry: &CacheEntry) -> Result<String, CacheStoreError> {
    Ok(serde_json::to_string(entry)?)
}

fn decode_entry(raw: &str) -> Result<CacheEntry, CacheStoreError> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str, now_ms: u64) -> Result<Option<CacheEntry>, CacheStoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        // Redis expiry and our clock can disagree by a few ms
        let entry = decode_entry(&raw)?;
        Ok(entry.is_fresh(now_ms).then_some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry, now_ms: u64) -> Result<(), CacheStoreError> {
        let ttl_ms = entry.remaining_ms(now_ms);
        if ttl_ms == 0 {
            return self.remove(key).await;
        }

        let payload = encode_entry(&entry)?;
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(self.namespaced(key))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced_key("gateway", "movies:1"), "gateway:movies:1");
        assert_eq!(namespaced_key("", "movies:1"), "movies:1");
    }

    #[test]
    fn test_namespaced_key_single_separator() {
        assert_eq!(namespaced_key("gw:", "movies:1"), "gw:movies:1");
        assert_eq!(namespaced_key(":", "movies:1"), "movies:1");

        let prefix = crate::config::Config::default().redis_key_prefix;
        assert_eq!(
            namespaced_key(&prefix, "movies:list:popular:desc:1:undefined"),
            "media-gateway:movies:list:popular:desc:1:undefined"
        );
    }

    #[test]
    fn test_entry_payload_roundtrip() {
        let entry = CacheEntry::new(json!({"id": 550, "title": "Fight Club"}), 1_000, 3_600_000);
        let raw = encode_entry(&entry).unwrap();
        assert_eq!(decode_entry(&raw).unwrap(), entry);
    }

    #[test]
    fn test_decode_garbage_is_payload_error() {
        let err = decode_entry("not json").unwrap_err();
        assert!(matches!(err, CacheStoreError::Payload(_)));
    }

    #[tokio::test]
    async fn test_connect_invalid_url_fails() {
        let result = RedisCacheStore::connect("not-a-url", "gateway").await;
        assert!(matches!(result, Err(CacheStoreError::Backend(_))));
    }
}
