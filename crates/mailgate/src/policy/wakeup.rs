//! Re-notification policy for quiet or bursting groups.
//!
//! Approves the very first notification for a group, re-approves after
//! a long quiet period, and re-approves when a burst of occurrences has
//! accumulated since the last notification. Everything it needs is read
//! from the group and the injected [`GroupStore`]; it keeps no state of
//! its own.

use super::{Fallback, Policy};
use crate::group::{EventContext, Group, GroupStore};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Configuration for [`WakeupPolicy`].
#[derive(Debug, Clone)]
pub struct WakeupConfig {
    /// Occurrences since the last notification that force a re-notify.
    /// The comparison is strict: exactly this many is not enough.
    pub amount_trigger: u64,
    /// Quiet period after which a group is re-notified regardless of
    /// volume.
    pub wakeup_period: ChronoDuration,
    /// Decision to apply when the group store is unreachable.
    pub fallback: Fallback,
}

impl Default for WakeupConfig {
    fn default() -> Self {
        Self {
            amount_trigger: 100,
            wakeup_period: ChronoDuration::days(30),
            fallback: Fallback::default(),
        }
    }
}

/// Policy approving notifications for new, stale, or bursting groups.
pub struct WakeupPolicy {
    amount_trigger: u64,
    wakeup_period: ChronoDuration,
    groups: Arc<dyn GroupStore>,
    fallback: Fallback,
    fallbacks: AtomicU64,
}

impl WakeupPolicy {
    /// Creates a wakeup policy over the given group store.
    pub fn new(config: WakeupConfig, groups: Arc<dyn GroupStore>) -> Self {
        Self {
            amount_trigger: config.amount_trigger,
            wakeup_period: config.wakeup_period,
            groups,
            fallback: config.fallback,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Number of times a store failure was resolved by the fallback
    /// decision instead of a real evaluation.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Policy for WakeupPolicy {
    fn name(&self) -> &'static str {
        "wakeup"
    }

    async fn should_approve(&self, group: &Group, event: &EventContext) -> bool {
        let now = event.timestamp;

        let last_email_sent = match group.last_email_sent {
            // Never notified: the first notification always goes out.
            None => return true,
            Some(t) => t,
        };

        // Strictly longer than the wakeup period counts as stale.
        if now - last_email_sent > self.wakeup_period {
            return true;
        }

        match self
            .groups
            .count_messages_in_range(group.id, last_email_sent, now)
            .await
        {
            Ok(count) => count > self.amount_trigger,
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    group = %group.id,
                    fallback = ?self.fallback,
                    "Group store unavailable, applying fallback decision"
                );
                self.fallback.approves()
            }
        }
    }
}

impl std::fmt::Debug for WakeupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeupPolicy")
            .field("amount_trigger", &self.amount_trigger)
            .field("wakeup_period", &self.wakeup_period)
            .field("fallback", &self.fallback)
            .finish()
    }
}
