//! Global throughput throttle with cooldown.
//!
//! A single shared sliding-window counter approximates the overall
//! new-issue arrival rate without per-group counters. While the rate
//! stays below the configured limit, notifications flow. Once it
//! reaches the limit, the policy records a throttle-onset marker in the
//! shared store and denies everything until the marker's cooldown TTL
//! expires; the cooldown prevents flapping during sustained bursts.
//! The marker is never re-armed by later checks, so the cooldown runs
//! from the first onset, and its absence is the only way back to open.

use super::{Fallback, Policy};
use crate::config::RateLimit;
use crate::counter::SlidingWindowCounter;
use crate::group::{EventContext, Group};
use crate::store::{KvStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Store key for the throttle-onset marker. The stored value is the
/// epoch second at which throttling engaged.
const THROTTLED_AT_KEY: &str = "throttled_at";

/// Configuration for [`ThrottlePolicy`].
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Seconds per counter bucket.
    pub resolution: u32,
    /// Number of trailing buckets in the throughput window.
    pub samples: u32,
    /// Maximum admitted throughput, e.g. "5/s".
    pub rate_limit: RateLimit,
    /// How long throttling persists once triggered, in seconds.
    pub cooldown_secs: u64,
    /// Decision to apply when the store is unreachable.
    pub fallback: Fallback,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            resolution: 10,
            samples: 15,
            rate_limit: RateLimit::default(),
            cooldown_secs: 600,
            fallback: Fallback::default(),
        }
    }
}

/// Policy denying notifications while global throughput is at or above
/// the configured rate limit, with a cooldown once triggered.
pub struct ThrottlePolicy {
    counter: SlidingWindowCounter,
    store: Arc<dyn KvStore>,
    limit_per_second: f64,
    cooldown: Duration,
    fallback: Fallback,
    fallbacks: AtomicU64,
}

impl ThrottlePolicy {
    /// Creates a throttle policy over the given shared store.
    pub fn new(config: ThrottleConfig, store: Arc<dyn KvStore>) -> Self {
        Self {
            counter: SlidingWindowCounter::new(store.clone(), config.resolution, config.samples),
            store,
            limit_per_second: config.rate_limit.per_second(),
            cooldown: Duration::from_secs(config.cooldown_secs),
            fallback: config.fallback,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Number of times a store failure was resolved by the fallback
    /// decision instead of a real evaluation.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    async fn check(&self, group: &Group, event: &EventContext) -> Result<bool, StoreError> {
        let now = event.timestamp;

        // New issues feed the throughput signal; repeats are already
        // represented by the bucket they landed in when first seen.
        if group.times_seen == 1 {
            self.counter.increment(now).await?;
        }

        let throughput = self.counter.throughput_per_second(now).await?;
        if throughput >= self.limit_per_second {
            // Record the onset only if no cooldown is already running.
            let engaged = self
                .store
                .set_if_absent(THROTTLED_AT_KEY, now.timestamp(), self.cooldown)
                .await?;
            if engaged {
                info!(
                    throughput,
                    limit_per_second = self.limit_per_second,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Throttle engaged"
                );
            }
            return Ok(false);
        }

        // Below the limit, but a cooldown from an earlier burst may
        // still be running. Marker absence means open.
        Ok(self.store.get(THROTTLED_AT_KEY).await?.is_none())
    }
}

#[async_trait]
impl Policy for ThrottlePolicy {
    fn name(&self) -> &'static str {
        "throttle"
    }

    async fn should_approve(&self, group: &Group, event: &EventContext) -> bool {
        match self.check(group, event).await {
            Ok(approved) => approved,
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    fallback = ?self.fallback,
                    "Throttle store unavailable, applying fallback decision"
                );
                self.fallback.approves()
            }
        }
    }
}

impl std::fmt::Debug for ThrottlePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottlePolicy")
            .field("limit_per_second", &self.limit_per_second)
            .field("cooldown", &self.cooldown)
            .field("fallback", &self.fallback)
            .finish()
    }
}
