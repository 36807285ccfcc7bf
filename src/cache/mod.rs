pub mod keys;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use keys::CacheKey;
pub use memory::InMemoryCache;

use crate::observability::metrics::Metrics;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Low-latency key/value store used purely as an accelerator.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError>;
    async fn del(&self, key: &str) -> Result<bool, CacheError>;

    /// Drops entries whose TTL has passed and returns how many went. Backends
    /// that expire entries on their own keep the default.
    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

/// Typed, best-effort front for a [`Cache`] backend. Failures are logged and
/// counted, then treated as a miss; they never reach business logic.
///
/// `epoch` advances on every invalidation. A read-through fill that straddles
/// an invalidation is deleted again, so a value loaded before a commit can
/// never outlive that commit's invalidation.
#[derive(Clone)]
pub struct CacheLayer {
    backend: Arc<dyn Cache>,
    metrics: Metrics,
    epoch: Arc<AtomicU64>,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn Cache>, metrics: Metrics) -> Self {
        Self {
            backend,
            metrics,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serves `key` from cache, or runs `load` against the store and caches
    /// its result unless an invalidation landed while the fill was in flight.
    pub async fn read_through<T, E, F>(&self, key: &CacheKey, ttl: Duration, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get_json::<T>(key).await {
            return Ok(value);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let value = load()?;
        self.set_json(key, &value, ttl).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(key = %key, "dropping cache fill that raced an invalidation");
            self.delete(key).await;
        }
        Ok(value)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.backend.get(&key.to_string()).await {
            Ok(raw) => raw?,
            Err(err) => {
                self.record_error("get", key, &err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key = %key, error = %err, "discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to encode cache entry");
                return;
            }
        };

        if let Err(err) = self.backend.set(&key.to_string(), raw, ttl).await {
            self.record_error("set", key, &err);
        }
    }

    /// Deletes every listed key. Awaited by write paths before they report
    /// success.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            self.delete(key).await;
        }
    }

    /// Evicts expired entries from the backend. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        match self.backend.purge_expired().await {
            Ok(purged) => purged,
            Err(err) => {
                self.metrics
                    .cache_errors_total
                    .with_label_values(&["purge"])
                    .inc();
                warn!(error = %err, "cache purge failed");
                0
            }
        }
    }

    async fn delete(&self, key: &CacheKey) {
        if let Err(err) = self.backend.del(&key.to_string()).await {
            self.record_error("del", key, &err);
        }
    }

    fn record_error(&self, op: &str, key: &CacheKey, err: &CacheError) {
        self.metrics.cache_errors_total.with_label_values(&[op]).inc();
        warn!(key = %key, op, error = %err, "cache operation failed");
    }
}
