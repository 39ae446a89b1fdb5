//! Glue between the ingestion pipeline and the policy evaluator.
//!
//! After upserting a group for an incoming occurrence, the pipeline
//! hands the group to [`NotificationGate::process`]. New groups and
//! regressions (occurrences on a previously resolved group) always
//! notify; everything else goes through the policy evaluator. When a
//! notification is actually delivered, the gate records
//! `last_email_sent` on the group; a failed delivery leaves the
//! bookkeeping untouched so the next occurrence retries.

use crate::evaluator::Evaluator;
use crate::group::{EventContext, Group, GroupStatus, GroupStore};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Notification delivery failure.
#[derive(Error, Debug, Clone)]
#[error("Notification delivery failed: {0}")]
pub struct SendError(pub String);

/// Delivery transport seam. Formatting and transport are the
/// collaborator's concern.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Delivers a notification for the group's latest occurrence.
    async fn send(&self, group: &Group) -> Result<(), SendError>;
}

/// Decides whether to notify for an occurrence and performs the send
/// plus bookkeeping.
pub struct NotificationGate {
    evaluator: Evaluator,
    groups: Arc<dyn GroupStore>,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationGate {
    /// Creates a gate over the given evaluator and collaborators.
    pub fn new(
        evaluator: Evaluator,
        groups: Arc<dyn GroupStore>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            evaluator,
            groups,
            sender,
        }
    }

    /// Processes one occurrence: decides, sends, and updates
    /// bookkeeping. Returns `true` if a notification was sent.
    ///
    /// `created` is whether the upsert created the group for this
    /// occurrence. `group` is the record as loaded by the upsert, before
    /// the pipeline clears a resolved status; a resolved group receiving
    /// an occurrence is a regression and always notifies.
    pub async fn process(&self, group: &Group, event: &EventContext, created: bool) -> bool {
        let regression = !created && group.status == GroupStatus::Resolved;
        let forced = created || regression;

        // The evaluator runs even when the outcome is already forced:
        // stateful policies must observe every occurrence, and created
        // groups are exactly the ones feeding the throttle's counter.
        let switches = self.evaluator.evaluate(group, event).await;
        let approved = forced || switches;
        if !approved {
            debug!(group = %group.id, "Notification suppressed by policy");
            return false;
        }

        if let Err(e) = self.sender.send(group).await {
            warn!(error = %e, group = %group.id, "Notification delivery failed");
            return false;
        }

        // Bookkeeping only after an actual send.
        if let Err(e) = self
            .groups
            .set_last_email_sent(group.id, event.timestamp)
            .await
        {
            warn!(error = %e, group = %group.id, "Failed to record last_email_sent");
        }

        debug!(group = %group.id, created, regression, "Notification sent");
        true
    }
}

impl std::fmt::Debug for NotificationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationGate")
            .field("evaluator", &self.evaluator)
            .finish()
    }
}
