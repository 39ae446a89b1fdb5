//! AND-combination of the configured policies.

use crate::group::{EventContext, Group};
use crate::policy::Policy;
use tracing::debug;

/// Evaluates every configured policy against an occurrence and combines
/// the results with logical AND.
///
/// The caller builds the policy list explicitly and passes it in; there
/// is no implicit registry. Every policy runs on every evaluation, even
/// when an earlier one has already denied: stateful policies (the
/// throttle feeds the shared counter) must observe every occurrence, so
/// short-circuiting would silently corrupt their state.
pub struct Evaluator {
    policies: Vec<Box<dyn Policy>>,
}

impl Evaluator {
    /// Creates an evaluator over the given ordered policy list.
    pub fn new(policies: Vec<Box<dyn Policy>>) -> Self {
        Self { policies }
    }

    /// Number of configured policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if no policies are configured.
    ///
    /// An empty evaluator approves everything.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Returns `true` iff every policy approves a notification for the
    /// given occurrence.
    pub async fn evaluate(&self, group: &Group, event: &EventContext) -> bool {
        let mut approved = true;
        for policy in &self.policies {
            let decision = policy.should_approve(group, event).await;
            debug!(
                policy = policy.name(),
                approved = decision,
                group = %group.id,
                logger = %event.logger_name,
                "Policy decision"
            );
            approved &= decision;
        }
        approved
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field(
                "policies",
                &self.policies.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
