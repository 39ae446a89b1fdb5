//! Group and event data models, plus the group storage seam.
//!
//! Groups are owned and mutated by the ingestion pipeline; this crate
//! only reads them. The [`GroupStore`] trait is the narrow interface the
//! policies use to count sibling messages and the pipeline glue uses to
//! record when a notification actually went out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle status of a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// The issue is active; occurrences are expected.
    Unresolved,
    /// The issue was marked resolved. A new occurrence on a resolved
    /// group is a regression.
    Resolved,
}

/// A deduplicated cluster of event occurrences sharing a checksum.
///
/// Invariants maintained by the owning pipeline: `times_seen >= 1` once
/// created, and `last_seen >= first_seen`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier assigned by the pipeline.
    pub id: Uuid,
    /// Content checksum identifying the group.
    pub checksum: String,
    /// Number of occurrences seen, monotonically increasing.
    pub times_seen: u64,
    /// When the first occurrence arrived.
    pub first_seen: DateTime<Utc>,
    /// When the most recent occurrence arrived.
    pub last_seen: DateTime<Utc>,
    /// When a notification was last sent for this group, if ever.
    pub last_email_sent: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: GroupStatus,
}

impl Group {
    /// Creates a group as it would look right after its first occurrence.
    pub fn new(checksum: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            checksum: checksum.into(),
            times_seen: 1,
            first_seen: now,
            last_seen: now,
            last_email_sent: None,
            status: GroupStatus::Unresolved,
        }
    }
}

/// Per-occurrence data handed to the policies.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Name of the logger that produced the event.
    pub logger_name: String,
    /// When the occurrence arrived. Policies treat this as "now".
    pub timestamp: DateTime<Utc>,
}

impl EventContext {
    /// Creates an event context for a single occurrence.
    pub fn new(logger_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            logger_name: logger_name.into(),
            timestamp,
        }
    }
}

/// Errors surfaced by the group storage collaborator.
#[derive(Error, Debug, Clone)]
pub enum GroupStoreError {
    /// The backing store is unreachable or timed out.
    #[error("Group store unavailable: {0}")]
    Unavailable(String),

    /// The group does not exist.
    #[error("Unknown group: {0}")]
    NotFound(Uuid),
}

/// Read/bookkeeping seam onto the pipeline's group storage.
///
/// Only the operations this crate needs are present; upserts and
/// `times_seen` maintenance belong to the ingestion pipeline.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Counts messages belonging to `group_id` with a timestamp in the
    /// inclusive range `[start, end]`.
    async fn count_messages_in_range(
        &self,
        group_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, GroupStoreError>;

    /// Records that a notification was sent for `group_id` at `at`.
    async fn set_last_email_sent(
        &self,
        group_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), GroupStoreError>;
}

/// In-memory [`GroupStore`] for tests and development.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    messages: RwLock<HashMap<Uuid, Vec<DateTime<Utc>>>>,
    last_email_sent: RwLock<HashMap<Uuid, DateTime<Utc>>>,
}

impl MemoryGroupStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message occurrence for a group.
    pub async fn record_message(&self, group_id: Uuid, at: DateTime<Utc>) {
        let mut messages = self.messages.write().await;
        messages.entry(group_id).or_default().push(at);
    }

    /// Returns the last recorded email timestamp for a group, if any.
    pub async fn last_email_sent(&self, group_id: Uuid) -> Option<DateTime<Utc>> {
        let sent = self.last_email_sent.read().await;
        sent.get(&group_id).copied()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn count_messages_in_range(
        &self,
        group_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, GroupStoreError> {
        let messages = self.messages.read().await;
        let count = messages
            .get(&group_id)
            .map(|ts| ts.iter().filter(|t| **t >= start && **t <= end).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn set_last_email_sent(
        &self,
        group_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), GroupStoreError> {
        let mut sent = self.last_email_sent.write().await;
        sent.insert(group_id, at);
        Ok(())
    }
}
