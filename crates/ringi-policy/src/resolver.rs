//! Priority-ordered, first-match, default-deny policy resolution.
//!
//! Candidate policies are sorted by `priority` descending, with ties broken
//! by ascending id. The first policy whose conditions hold decides; when
//! none holds the decision is [`Effect::Deny`].

use ringi_core::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::error::PolicyResult;
use crate::policy::{Effect, Policy, PolicyId};
use crate::repository::PolicyRepository;

/// The result of a policy evaluation, with the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Allow or deny.
    pub effect: Effect,
    /// The policy that decided, or `None` for the default deny.
    pub matched_policy: Option<PolicyId>,
    /// How many policies were evaluated before deciding.
    pub evaluated: usize,
}

impl Decision {
    /// A default deny after evaluating `evaluated` policies.
    #[must_use]
    pub fn default_deny(evaluated: usize) -> Self {
        Self {
            effect: Effect::Deny,
            matched_policy: None,
            evaluated,
        }
    }

    /// Whether the action is permitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.effect.is_allow()
    }
}

/// Evaluate an already-fetched set of policies against `ctx`.
///
/// Pure: the slice is not reordered and nothing is logged above `debug`.
#[must_use]
pub fn evaluate_policies(policies: &[Policy], ctx: &Context) -> Decision {
    let mut ordered: Vec<&Policy> = policies.iter().filter(|p| p.is_active).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    for (index, policy) in ordered.iter().enumerate() {
        if policy.conditions.evaluate(ctx) {
            tracing::debug!(
                policy_id = policy.id.0,
                priority = policy.priority,
                effect = %policy.effect,
                "policy matched"
            );
            return Decision {
                effect: policy.effect,
                matched_policy: Some(policy.id),
                evaluated: index.saturating_add(1),
            };
        }
    }

    tracing::debug!(evaluated = ordered.len(), "no policy matched; default deny");
    Decision::default_deny(ordered.len())
}

/// Resolves allow/deny decisions against a [`PolicyRepository`].
#[derive(Clone)]
pub struct PolicyResolver {
    repository: Arc<dyn PolicyRepository>,
}

impl std::fmt::Debug for PolicyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyResolver").finish_non_exhaustive()
    }
}

impl PolicyResolver {
    /// Create a resolver over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn PolicyRepository>) -> Self {
        Self { repository }
    }

    /// Decide whether the action is allowed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the repository cannot be read.
    pub async fn decide(
        &self,
        business_code: &str,
        action: &str,
        resource_type: &str,
        ctx: &Context,
    ) -> PolicyResult<Effect> {
        Ok(self
            .explain(business_code, action, resource_type, ctx)
            .await?
            .effect)
    }

    /// Decide and report which policy decided.
    ///
    /// # Errors
    ///
    /// Returns an error only if the repository cannot be read.
    pub async fn explain(
        &self,
        business_code: &str,
        action: &str,
        resource_type: &str,
        ctx: &Context,
    ) -> PolicyResult<Decision> {
        let policies = self
            .repository
            .active_policies(business_code, action, resource_type)
            .await?;

        let span = tracing::debug_span!("policy_decision", business_code, action, resource_type);
        let decision = span.in_scope(|| evaluate_policies(&policies, ctx));
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
