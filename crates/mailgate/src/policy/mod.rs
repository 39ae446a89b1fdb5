//! Notification admission policies.
//!
//! Each policy is an independent approve/deny decision over a group and
//! the occurrence that just arrived. Policies are built explicitly by
//! the caller with their own immutable configuration and injected store
//! handles; there is no global registry. The [`crate::Evaluator`] ANDs
//! them together.
//!
//! Store-backed policies never propagate backend failures: each converts
//! a failed store call into its configured [`Fallback`] decision, logs
//! it, and counts it, so an infrastructure hiccup cannot wedge the
//! ingestion pipeline.

mod logger_filter;
mod throttle;
mod wakeup;

pub use logger_filter::LoggerFilterPolicy;
pub use throttle::{ThrottleConfig, ThrottlePolicy};
pub use wakeup::{WakeupConfig, WakeupPolicy};

use crate::group::{EventContext, Group};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A unit of approve/deny logic consulted before sending a notification.
///
/// Implementations may have side effects (the throttle policy feeds the
/// shared counter), so the evaluator runs every policy on every
/// occurrence rather than short-circuiting.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Short stable name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if this policy allows a notification for the
    /// given occurrence.
    async fn should_approve(&self, group: &Group, event: &EventContext) -> bool;
}

/// Decision to apply when the backing store is unreachable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Treat as approved. Real notifications survive infra hiccups at
    /// the risk of a storm during an outage. The default.
    Open,
    /// Treat as denied. No storms, but alerts are dropped while the
    /// store is down.
    Closed,
}

impl Fallback {
    /// The approval decision this fallback resolves to.
    pub fn approves(self) -> bool {
        matches!(self, Fallback::Open)
    }
}

impl Default for Fallback {
    fn default() -> Self {
        Fallback::Open
    }
}
