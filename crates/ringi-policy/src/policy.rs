//! Policy records.

use ringi_core::ConditionNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a policy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub i64);

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy:{}", self.0)
    }
}

/// The outcome a policy produces when its conditions hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Permit the action.
    Allow,
    /// Forbid the action.
    Deny,
}

impl Effect {
    /// Whether this effect permits the action.
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// An access-control rule scoped to a `(business_code, action, resource_type)` triple.
///
/// Higher `priority` is evaluated first. Policies are read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Record identifier; breaks priority ties (lower first).
    pub id: PolicyId,
    /// Business area, e.g. `estimate`.
    pub business_code: String,
    /// Action, e.g. `view`.
    pub action: String,
    /// Resource type, e.g. `estimate`.
    pub resource_type: String,
    /// When the policy applies. Absent means always.
    #[serde(default)]
    pub conditions: ConditionNode,
    /// What the policy decides.
    pub effect: Effect,
    /// Evaluation order key.
    #[serde(default)]
    pub priority: i32,
    /// Inactive policies are never evaluated.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Policy {
    /// Create an active, unconditional policy.
    #[must_use]
    pub fn new(
        id: i64,
        business_code: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        effect: Effect,
    ) -> Self {
        Self {
            id: PolicyId(id),
            business_code: business_code.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            conditions: ConditionNode::always(),
            effect,
            priority: 0,
            is_active: true,
        }
    }

    /// Set the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: ConditionNode) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the policy inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether the policy is active and scoped to this triple.
    #[must_use]
    pub fn applies_to(&self, business_code: &str, action: &str, resource_type: &str) -> bool {
        self.is_active
            && self.business_code == business_code
            && self.action == action
            && self.resource_type == resource_type
    }
}
