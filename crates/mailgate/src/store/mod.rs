//! Shared key-value store abstraction for counter and throttle state.
//!
//! All mutable state shared across concurrent ingestion workers lives
//! behind the [`KvStore`] trait: time-bucketed counters and the throttle
//! marker. The trait exposes exactly the atomic primitives the policies
//! need, so no caller-side read-modify-write (and no in-process locking
//! around the store) is ever required:
//!
//! - increment-or-create-with-TTL for bucket counters
//! - set-if-absent-with-TTL for the throttle marker
//! - a batched read for summing a window of buckets
//!
//! Expired entries are garbage-collected by the backend; nothing in this
//! crate deletes old buckets explicitly.

mod error;
mod memory;

#[cfg(feature = "redis")]
mod redis;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use self::redis::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A shared store of expiring integer values.
///
/// Implementations must be thread-safe (`Send + Sync`). A TTL of
/// `Duration::ZERO` means the entry never expires; otherwise the backend
/// drops the entry once the TTL elapses.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Atomically increments the value at `key`, creating it as `1` with
    /// the given TTL if absent. Returns the value after the increment.
    ///
    /// The TTL applies only on creation; increments on an existing key
    /// do not extend its lifetime.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Gets the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Fetches many keys in one batched read. Absent or expired keys are
    /// omitted from the result.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, i64>, StoreError>;

    /// Atomically sets `key` to `value` with the given TTL, only if the
    /// key is absent. Returns `true` if the value was set.
    async fn set_if_absent(&self, key: &str, value: i64, ttl: Duration)
        -> Result<bool, StoreError>;
}
