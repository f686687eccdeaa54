//! Policy repository collaborator.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

use crate::error::{PolicyError, PolicyResult};
use crate::policy::Policy;

/// Source of already-decoded policy records.
///
/// Implementations return a snapshot; the resolver never mutates it.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Active policies scoped to the given triple, in any order.
    async fn active_policies(
        &self,
        business_code: &str,
        action: &str,
        resource_type: &str,
    ) -> PolicyResult<Vec<Policy>>;
}

/// In-memory policy repository for tests and file-backed catalogs.
#[derive(Debug, Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<Vec<Policy>>,
}

impl InMemoryPolicyRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a catalog, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPolicy`] if two records share an id.
    pub fn from_policies(policies: Vec<Policy>) -> PolicyResult<Self> {
        let mut seen = HashSet::new();
        for policy in &policies {
            if !seen.insert(policy.id) {
                return Err(PolicyError::InvalidPolicy {
                    id: policy.id.0,
                    reason: "duplicate policy id".to_owned(),
                });
            }
        }
        Ok(Self {
            policies: RwLock::new(policies),
        })
    }

    /// Add or replace a policy by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn upsert(&self, policy: Policy) -> PolicyResult<()> {
        let mut policies = self
            .policies
            .write()
            .map_err(|e| PolicyError::Repository(e.to_string()))?;
        policies.retain(|p| p.id != policy.id);
        policies.push(policy);
        Ok(())
    }

    /// Number of stored policies, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies
            .read()
            .unwrap_or_else(|e| {
                tracing::warn!("policy repository lock poisoned, recovering");
                e.into_inner()
            })
            .len()
    }

    /// Whether the repository holds no policies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn active_policies(
        &self,
        business_code: &str,
        action: &str,
        resource_type: &str,
    ) -> PolicyResult<Vec<Policy>> {
        let policies = self
            .policies
            .read()
            .map_err(|e| PolicyError::Repository(e.to_string()))?;
        Ok(policies
            .iter()
            .filter(|p| p.applies_to(business_code, action, resource_type))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Effect;

    #[tokio::test]
    async fn test_filters_by_triple_and_active() {
        let repo = InMemoryPolicyRepository::from_policies(vec![
            Policy::new(1, "estimate", "view", "estimate", Effect::Allow),
            Policy::new(2, "estimate", "view", "estimate", Effect::Deny).inactive(),
            Policy::new(3, "estimate", "edit", "estimate", Effect::Allow),
            Policy::new(4, "budget", "view", "estimate", Effect::Allow),
        ])
        .unwrap();

        let found = repo.active_policies("estimate", "view", "estimate").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.0, 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = InMemoryPolicyRepository::from_policies(vec![
            Policy::new(1, "estimate", "view", "estimate", Effect::Allow),
            Policy::new(1, "estimate", "view", "estimate", Effect::Deny),
        ])
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPolicy { id: 1, .. }));
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = InMemoryPolicyRepository::new();
        assert!(repo.is_empty());
        repo.upsert(Policy::new(1, "estimate", "view", "estimate", Effect::Allow))
            .unwrap();
        repo.upsert(Policy::new(1, "estimate", "view", "estimate", Effect::Deny))
            .unwrap();
        assert_eq!(repo.len(), 1);
        let found = repo.active_policies("estimate", "view", "estimate").await.unwrap();
        assert_eq!(found[0].effect, Effect::Deny);
    }
}
