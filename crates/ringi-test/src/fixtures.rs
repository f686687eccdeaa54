//! Test fixtures for principals, contexts, policies and flows.
//!
//! Policy and flow fixtures are decoded from JSON records, the same shape
//! the catalog files use.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::{Value, json};

use ringi_approval::{ApprovalFlow, ApprovalStep, ApprovalType, FlowConditions};
use ringi_core::{Context, Principal, PrincipalId, PrincipalRef};
use ringi_policy::Policy;

/// Business code used throughout the fixtures.
pub const ESTIMATE: &str = "estimate";

/// 2025-04-07 10:00 JST, a Monday.
#[must_use]
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 7, 1, 0, 0)
        .single()
        .expect("valid fixture instant")
}

/// The default engine offset, UTC+09:00.
#[must_use]
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(32_400).expect("valid offset")
}

/// The requester used by flow fixtures: user 100 in department 10.
#[must_use]
pub fn test_requester() -> Principal {
    Principal::new("100").with_department("10").with_position("5")
}

/// A principal with only an id.
#[must_use]
pub fn test_principal(id: impl Into<PrincipalId>) -> Principal {
    Principal::new(id)
}

/// A principal holding `position`.
#[must_use]
pub fn test_principal_with_position(
    id: impl Into<PrincipalId>,
    position: impl Into<String>,
) -> Principal {
    Principal::new(id).with_position(position)
}

/// Context for `user` and `data` at [`fixed_instant`] in JST.
#[must_use]
pub fn test_context(user: &Principal, data: Value) -> Context {
    Context::builder()
        .user(user)
        .data(data)
        .at(fixed_instant(), jst())
        .build()
}

fn policy(record: Value) -> Policy {
    serde_json::from_value(record).expect("valid policy fixture")
}

fn flow(record: Value) -> ApprovalFlow {
    serde_json::from_value(record).expect("valid flow fixture")
}

/// Priority-100 deny: positions 1, 2, 3 may not approve estimates above
/// 1,000,000.
#[must_use]
pub fn deny_large_amount_policy() -> Policy {
    policy(json!({
        "id": 1,
        "business_code": ESTIMATE,
        "action": "approve",
        "resource_type": ESTIMATE,
        "effect": "deny",
        "priority": 100,
        "conditions": {
            "operator": "and",
            "rules": [
                {"field": "user.position_id", "operator": "in", "value": [1, 2, 3]},
                {"field": "data.amount", "operator": "gt", "value": 1_000_000}
            ]
        }
    }))
}

/// Priority-10 unconditional allow.
#[must_use]
pub fn allow_all_policy() -> Policy {
    policy(json!({
        "id": 2,
        "business_code": ESTIMATE,
        "action": "approve",
        "resource_type": ESTIMATE,
        "effect": "allow",
        "priority": 10
    }))
}

/// Allow editing only for someone other than the creator.
#[must_use]
pub fn not_creator_policy() -> Policy {
    policy(json!({
        "id": 3,
        "business_code": ESTIMATE,
        "action": "edit",
        "resource_type": ESTIMATE,
        "effect": "allow",
        "conditions": {"field": "user.id", "operator": "ne", "value": "data.created_by"}
    }))
}

/// The estimate policy catalog.
#[must_use]
pub fn estimate_policies() -> Vec<Policy> {
    vec![deny_large_amount_policy(), allow_all_policy(), not_creator_policy()]
}

/// Two estimate flows: flow 1 for amounts up to 1,000,000 at priority 1 and
/// catch-all flow 2 at priority 10.
#[must_use]
pub fn estimate_flows() -> Vec<ApprovalFlow> {
    vec![
        flow(json!({
            "id": 1,
            "flow_type": ESTIMATE,
            "name": "small estimates",
            "priority": 1,
            "conditions": {"amount_min": 0, "amount_max": 1_000_000},
            "approval_steps": [
                {"step": 0, "name": "created"},
                {
                    "step": 1,
                    "name": "manager",
                    "approval_type": "optional",
                    "approvers": [{"type": "position", "value": 3}]
                }
            ]
        })),
        flow(json!({
            "id": 2,
            "flow_type": ESTIMATE,
            "name": "all estimates",
            "priority": 10,
            "approval_steps": [
                {
                    "step": 1,
                    "name": "manager",
                    "condition": {"type": "required"},
                    "approvers": [{"type": "position", "value": 3}]
                },
                {
                    "step": 2,
                    "name": "director",
                    "approvers": [
                        {"type": "position", "value": 1},
                        {
                            "type": "conditional",
                            "condition": {"field": "data.amount", "operator": "gt", "value": 10_000_000},
                            "approvers": [{"type": "system_level", "value": "executive"}]
                        }
                    ]
                }
            ]
        })),
    ]
}

/// A flow whose single step needs a majority of users 1, 2 and 3.
#[must_use]
pub fn majority_flow(id: i64) -> ApprovalFlow {
    ApprovalFlow::new(id, "purchase", "committee").with_step(
        ApprovalStep::new(1, "committee", ApprovalType::Majority)
            .with_approver(PrincipalRef::user("1"))
            .with_approver(PrincipalRef::user("2"))
            .with_approver(PrincipalRef::user("3")),
    )
}

/// A flow whose first step auto-approves when [`test_requester`] submits,
/// followed by a director step.
#[must_use]
pub fn auto_approve_flow(id: i64) -> ApprovalFlow {
    ApprovalFlow::new(id, "expense", "self-approved first step")
        .with_conditions(FlowConditions::default())
        .with_step(
            ApprovalStep::new(1, "team lead", ApprovalType::Optional)
                .with_approver(PrincipalRef::department("10"))
                .with_auto_approve(),
        )
        .with_step(
            ApprovalStep::new(2, "director", ApprovalType::Required)
                .with_approver(PrincipalRef::position("1")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_valid() {
        for f in estimate_flows() {
            f.validate().unwrap();
        }
        majority_flow(7).validate().unwrap();
        auto_approve_flow(8).validate().unwrap();
        assert_eq!(estimate_policies().len(), 3);
    }

    #[test]
    fn test_context_carries_time() {
        let ctx = test_context(&test_requester(), json!({"amount": 1}));
        let hour = ringi_core::AttrPath::parse("current_time.hour").unwrap();
        assert_eq!(ctx.resolve(&hour), Some(&json!(10)));
    }
}
