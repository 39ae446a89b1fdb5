//! In-memory store implementation.
//!
//! Suitable for tests and single-process deployments. All mutation goes
//! through a single `tokio::sync::RwLock`, so increment-or-create and
//! set-if-absent are atomic with respect to concurrent callers.

use super::{KvStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// A single stored value with an optional expiry.
#[derive(Debug, Clone)]
struct Entry {
    value: i64,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(value: i64, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Utc::now() + ChronoDuration::milliseconds(ttl.as_millis() as i64))
        };
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Utc::now() >= expires,
            None => false,
        }
    }
}

/// An in-memory [`KvStore`] backed by a HashMap.
///
/// Expired entries are dropped lazily on access; [`MemoryStore::cleanup_expired`]
/// can be called to reclaim memory eagerly.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directly inserts a value, replacing any existing entry.
    ///
    /// Intended for seeding state in tests.
    pub async fn insert(&self, key: &str, value: i64, ttl: Duration) {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), Entry::new(value, ttl));
    }

    /// Removes all expired entries.
    pub async fn cleanup_expired(&self) {
        let mut data = self.data.write().await;
        data.retain(|_, entry| !entry.is_expired());
    }

    /// Removes all entries.
    pub async fn clear(&self) {
        let mut data = self.data.write().await;
        data.clear();
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.values().filter(|e| !e.is_expired()).count()
    }

    /// Returns `true` if the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut data = self.data.write().await;
        match data.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.value += 1;
                Ok(entry.value)
            }
            _ => {
                // Absent or expired: create fresh with the TTL.
                data.insert(key.to_string(), Entry::new(1, ttl));
                Ok(1)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, i64>, StoreError> {
        let data = self.data.read().await;
        let mut results = HashMap::new();
        for key in keys {
            if let Some(entry) = data.get(key) {
                if !entry.is_expired() {
                    results.insert(key.clone(), entry.value);
                }
            }
        }
        Ok(results)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        match data.get(key) {
            Some(entry) if !entry.is_expired() => Ok(false),
            _ => {
                data.insert(key.to_string(), Entry::new(value, ttl));
                Ok(true)
            }
        }
    }
}
