//! Sliding-window throughput counter over the shared store.
//!
//! Time is sliced into fixed-resolution buckets; each bucket is one
//! store key holding an occurrence count. Increments land in the bucket
//! containing the given timestamp; throughput is the sum of the
//! `samples` buckets strictly preceding the current one, divided by the
//! window length in seconds. The still-filling current bucket is always
//! excluded so a partially elapsed bucket cannot skew the estimate.
//!
//! Buckets expire on their own after `resolution * (samples + 1)`
//! seconds; nothing deletes them explicitly.

use crate::store::{KvStore, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;

/// A fixed-resolution, time-bucketed counter.
///
/// Hold it behind an `Arc` or give each user its own instance over the
/// same store; identical configuration produces identical bucket keys.
pub struct SlidingWindowCounter {
    store: Arc<dyn KvStore>,
    /// Seconds per bucket. Must be in `1..=3600` and divide the hour
    /// evenly, since truncation restarts at each hour.
    resolution: u32,
    /// Number of trailing buckets forming the window. Must be nonzero.
    samples: u32,
}

impl SlidingWindowCounter {
    /// Creates a counter over `store` with the given bucket resolution
    /// (seconds) and window size (buckets).
    pub fn new(store: Arc<dyn KvStore>, resolution: u32, samples: u32) -> Self {
        Self {
            store,
            resolution,
            samples,
        }
    }

    /// Truncates `at` to the start of its bucket.
    ///
    /// Truncation is calendar-aware over the minute and second
    /// components only; the hour and date pass through unmodified.
    fn bucket_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let into_hour = at.minute() * 60 + at.second();
        let truncated = into_hour - into_hour % self.resolution;
        at.with_minute(truncated / 60)
            .and_then(|t| t.with_second(truncated % 60))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(at)
    }

    /// Returns the store key for the bucket containing `at`.
    ///
    /// Formatted as a second-precision timestamp, stable and
    /// collision-free across the supported timestamp range.
    pub fn bucket_key(&self, at: DateTime<Utc>) -> String {
        self.bucket_start(at).format("%Y-%m-%d-%H:%M:%S").to_string()
    }

    /// The `samples` bucket keys strictly preceding the bucket
    /// containing `at`, most recent first.
    fn window_keys(&self, at: DateTime<Utc>) -> Vec<String> {
        let start = self.bucket_start(at);
        (1..=self.samples)
            .map(|i| {
                let bucket = start - ChronoDuration::seconds((self.resolution * i) as i64);
                bucket.format("%Y-%m-%d-%H:%M:%S").to_string()
            })
            .collect()
    }

    /// TTL applied to a bucket on creation: long enough to stay readable
    /// for every window that can include it, plus one resolution of slack.
    fn bucket_ttl(&self) -> Duration {
        Duration::from_secs((self.resolution as u64) * (self.samples as u64 + 1))
    }

    /// Records one occurrence in the bucket containing `at`.
    ///
    /// Atomic increment-or-create in the store; safe under concurrent
    /// callers. Returns the bucket count after the increment.
    pub async fn increment(&self, at: DateTime<Utc>) -> Result<i64, StoreError> {
        let key = self.bucket_key(at);
        self.store.incr(&key, self.bucket_ttl()).await
    }

    /// Estimated occurrences per second over the window preceding `at`.
    ///
    /// Missing buckets count as zero; an empty window yields `0.0`.
    pub async fn throughput_per_second(&self, at: DateTime<Utc>) -> Result<f64, StoreError> {
        let keys = self.window_keys(at);
        let counts = self.store.get_many(&keys).await?;
        let total: i64 = counts.values().sum();
        Ok(total as f64 / (self.resolution as f64 * self.samples as f64))
    }
}

impl std::fmt::Debug for SlidingWindowCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowCounter")
            .field("resolution", &self.resolution)
            .field("samples", &self.samples)
            .finish()
    }
}
