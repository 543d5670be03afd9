//! Cache Service - Cache-aside get-or-compute
//!
//! Wraps an expensive async computation with a per-key TTL cache backed by
//! a pluggable [`CacheStore`]. Cache identity is entirely the key string.
//!
//! Store failures never fail a request: a read error counts as a miss and a
//! write error only loses the cache fill. Compute errors propagate unchanged
//! and nothing is stored.

use crate::domain::entities::CacheEntry;
use crate::domain::ports::{CacheStore, Clock};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Per-call cache options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Time to live of the stored value
    pub ttl: Duration,
}

impl CacheOptions {
    pub fn ttl_secs(secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(secs),
        }
    }
}

/// Per-key in-flight registry for single-flight misses.
///
/// The leader owns a watch sender stored in the map; followers subscribe
/// under the lock and wake when the leader's guard drops the sender.
#[derive(Default)]
struct InflightRegistry {
    flights: Mutex<HashMap<String, watch::Sender<()>>>,
}

enum Flight<'a> {
    Leader(FlightGuard<'a>),
    Follower(watch::Receiver<()>),
}

struct FlightGuard<'a> {
    registry: &'a InflightRegistry,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.flights.lock().remove(&self.key);
    }
}

impl InflightRegistry {
    fn join(&self, key: &str) -> Flight<'_> {
        let mut flights = self.flights.lock();
        if let Some(sender) = flights.get(key) {
            return Flight::Follower(sender.subscribe());
        }
        let (sender, _) = watch::channel(());
        flights.insert(key.to_string(), sender);
        Flight::Leader(FlightGuard {
            registry: self,
            key: key.to_string(),
        })
    }

    fn len(&self) -> usize {
        self.flights.lock().len()
    }
}

/// Cache-aside service.
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    inflight: Option<InflightRegistry>,
}

impl CacheService {
    /// Create a service without miss deduplication.
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            inflight: None,
        }
    }

    /// Create a service where concurrent misses on one key share a single
    /// computation.
    pub fn with_single_flight(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            inflight: Some(InflightRegistry::default()),
        }
    }

    pub fn single_flight_enabled(&self) -> bool {
        self.inflight.is_some()
    }

    /// Return the cached value for `key`, or run `compute`, store its result
    /// for `options.ttl` and return it.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        options: CacheOptions,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }

        let _flight = match &self.inflight {
            None => None,
            Some(registry) => loop {
                match registry.join(key) {
                    Flight::Leader(guard) => {
                        // A previous leader may have filled it meanwhile
                        if let Some(hit) = self.lookup(key).await {
                            return Ok(hit);
                        }
                        break Some(guard);
                    }
                    Flight::Follower(mut done) => {
                        tracing::debug!("waiting for in-flight computation of {}", key);
                        // Err once the leader's guard drops the sender
                        let _ = done.changed().await;
                        if let Some(hit) = self.lookup(key).await {
                            return Ok(hit);
                        }
                    }
                }
            },
        };

        let value = compute().await?;
        self.fill(key, &value, options.ttl).await;
        Ok(value)
    }

    /// Drop the cached value for `key`.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            tracing::warn!("cache invalidation failed for {}: {}", key, e);
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now_ms = self.clock.now_ms();
        match self.store.get(key, now_ms).await {
            Ok(Some(entry)) => match serde_json::from_value(entry.value) {
                Ok(value) => {
                    tracing::debug!("cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!("cached value for {} could not be decoded: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                tracing::debug!("cache miss: {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn fill<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("value for {} is not cacheable: {}", key, e);
                return;
            }
        };

        let now_ms = self.clock.now_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let entry = CacheEntry::new(value, now_ms, ttl_ms);

        if let Err(e) = self.store.set(key, entry, now_ms).await {
            tracing::warn!("cache write failed for {}: {}", key, e);
        } else {
            tracing::debug!("cached {} for {}s", key, ttl.as_secs());
        }
    }
}
