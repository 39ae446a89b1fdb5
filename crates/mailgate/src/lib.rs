//! # mailgate
//!
//! Notification admission control for grouped error events.
//!
//! An ingestion pipeline deduplicates incoming error occurrences into
//! recurring groups and, for each occurrence, asks this crate whether a
//! notification should go out. The decision is made by a set of
//! independent policies evaluated together: a throughput throttle backed
//! by a sliding-window counter in a shared key-value store, a wakeup
//! policy that re-notifies stale or bursting groups, and a logger-name
//! filter. Every policy must approve for a notification to fire.
//!
//! Persistence of groups and messages, checksum computation, and the
//! delivery transport are collaborators consumed through the narrow
//! [`GroupStore`], [`KvStore`], and [`NotificationSender`] seams.

pub mod config;
pub mod counter;
pub mod evaluator;
pub mod group;
pub mod pipeline;
pub mod policy;
pub mod store;

pub use config::{load_config, ConfigError, MailgateConfig, RateLimit, RateUnit};
pub use counter::SlidingWindowCounter;
pub use evaluator::Evaluator;
pub use group::{EventContext, Group, GroupStore, GroupStoreError, GroupStatus, MemoryGroupStore};
pub use pipeline::{NotificationGate, NotificationSender, SendError};
pub use policy::{
    Fallback, LoggerFilterPolicy, Policy, ThrottleConfig, ThrottlePolicy, WakeupConfig,
    WakeupPolicy,
};
pub use store::{KvStore, MemoryStore, StoreError};

#[cfg(feature = "redis")]
pub use store::{RedisStore, RedisStoreConfig};
