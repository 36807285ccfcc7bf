use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Cache, CacheError};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Default ceiling on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Process-local cache backend with per-entry expiry and a size cap. Expired
/// entries are removed on read, by [`Cache::purge_expired`], and whenever a
/// write finds the map full.
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
    max_entries: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Makes room for one more key: expired entries go first, then the ones
    /// closest to expiry.
    fn make_room(&self, now: Instant) {
        if self.entries.len() < self.max_entries {
            return;
        }
        self.remove_expired(now);

        while self.entries.len() >= self.max_entries {
            let soonest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.expires_at)
                .map(|entry| entry.key().clone());
            match soonest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }

        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        if !self.entries.contains_key(key) {
            self.make_room(now);
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(self.remove_expired(Instant::now()))
    }
}
