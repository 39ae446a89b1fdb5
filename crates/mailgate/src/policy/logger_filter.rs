//! Logger-name allow/deny filter.

use super::Policy;
use crate::group::{EventContext, Group};
use async_trait::async_trait;
use std::collections::HashSet;

/// Policy denying notifications for events from configured loggers.
///
/// Pure and stateless; membership is a single hash lookup.
#[derive(Debug, Clone)]
pub struct LoggerFilterPolicy {
    skip_loggers: HashSet<String>,
}

impl LoggerFilterPolicy {
    /// Creates a filter denying the given logger names.
    pub fn new(skip_loggers: HashSet<String>) -> Self {
        Self { skip_loggers }
    }
}

#[async_trait]
impl Policy for LoggerFilterPolicy {
    fn name(&self) -> &'static str {
        "logger_filter"
    }

    async fn should_approve(&self, _group: &Group, event: &EventContext) -> bool {
        !self.skip_loggers.contains(&event.logger_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn policy(loggers: &[&str]) -> LoggerFilterPolicy {
        LoggerFilterPolicy::new(loggers.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_skipped_logger_denied() {
        let policy = policy(&["http404"]);
        let group = Group::new("abc", Utc::now());
        let event = EventContext::new("http404", Utc::now());

        assert!(!policy.should_approve(&group, &event).await);
    }

    #[tokio::test]
    async fn test_other_logger_approved() {
        let policy = policy(&["http404"]);
        let group = Group::new("abc", Utc::now());
        let event = EventContext::new("root", Utc::now());

        assert!(policy.should_approve(&group, &event).await);
    }

    #[tokio::test]
    async fn test_empty_skip_set_approves_everything() {
        let policy = policy(&[]);
        let group = Group::new("abc", Utc::now());
        let event = EventContext::new("http404", Utc::now());

        assert!(policy.should_approve(&group, &event).await);
    }

    #[tokio::test]
    async fn test_match_is_exact() {
        let policy = policy(&["http404"]);
        let group = Group::new("abc", Utc::now());
        let event = EventContext::new("http404.extra", Utc::now());

        assert!(policy.should_approve(&group, &event).await);
    }
}
