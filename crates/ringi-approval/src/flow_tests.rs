use super::*;
use serde_json::json;

fn flow(v: Value) -> ApprovalFlow {
    serde_json::from_value(v).unwrap()
}

fn two_step() -> ApprovalFlow {
    ApprovalFlow::new(1, "estimate", "standard")
        .with_step(ApprovalStep::new(0, "created", ApprovalType::Required))
        .with_step(
            ApprovalStep::new(1, "section chief", ApprovalType::Required)
                .with_approver(PrincipalRef::position("3")),
        )
        .with_step(
            ApprovalStep::new(2, "director", ApprovalType::Optional)
                .with_approver(PrincipalRef::position("1")),
        )
}

#[test]
fn test_decode_full_flow() {
    let f = flow(json!({
        "id": 4,
        "flow_type": "purchase",
        "name": "new vendor",
        "conditions": {"amount_min": 0, "amount_max": 1_000_000, "departments": [10, "11"]},
        "requesters": [{"type": "department", "value": 10}],
        "priority": 1,
        "approval_steps": [
            {"step": 0, "name": "created"},
            {
                "step": 1,
                "name": "review",
                "condition": {"type": "majority"},
                "auto_approve_if_requester": true,
                "approvers": [
                    {"type": "user", "value": 5},
                    {"type": "conditional",
                     "condition": {"field": "data.vendor.is_new", "operator": "eq", "value": true},
                     "approvers": [{"type": "position", "value": 2}]}
                ],
                "cancellation_conditions": {"pending": true, "reviewing": true}
            }
        ]
    }));

    assert_eq!(f.id, FlowId(4));
    assert!(f.is_active);
    assert_eq!(f.conditions.departments, ["10", "11"]);
    let step = f.step(1).unwrap();
    assert_eq!(step.approval_type, ApprovalType::Majority);
    assert!(step.auto_approve_if_requester);
    assert_eq!(step.approvers[0], Approver::Static(PrincipalRef::user("5")));
    assert!(matches!(step.approvers[1], Approver::Conditional { .. }));
    assert!(step.cancellation_conditions.reviewing);
    assert!(!step.cancellation_conditions.returned);
    assert_eq!(step.editing_conditions, StateGate::pending_or_returned());
    f.validate().unwrap();
}

#[test]
fn test_step_type_alias_conflict_rejected() {
    let r: Result<ApprovalStep, _> = serde_json::from_value(json!({
        "step": 1,
        "approval_type": "optional",
        "condition": {"type": "majority"},
    }));
    assert!(r.is_err());
}

#[test]
fn test_approver_decode_errors() {
    assert!(serde_json::from_value::<Approver>(json!({"type": "team", "value": 1})).is_err());
    assert!(serde_json::from_value::<Approver>(json!({"type": "user"})).is_err());
    assert!(serde_json::from_value::<Approver>(json!({"type": "conditional", "approvers": []})).is_err());
}

#[test]
fn test_approver_serialize_round_trip_shape() {
    let wire = json!({
        "type": "conditional",
        "condition": {"field": "data.vendor.is_new", "operator": "eq", "value": true},
        "approvers": [{"type": "position", "value": "2"}]
    });
    let a: Approver = serde_json::from_value(wire.clone()).unwrap();
    assert_eq!(serde_json::to_value(&a).unwrap(), wire);
}

#[test]
fn test_flow_conditions_matching() {
    let c = FlowConditions {
        amount_min: Some(0.0),
        amount_max: Some(1_000_000.0),
        departments: vec!["10".into()],
        ..FlowConditions::default()
    };
    assert!(c.matches(&json!({"amount": 500_000, "department_id": 10})));
    assert!(c.matches(&json!({"amount": "1000000", "department_id": "10"})));
    assert!(!c.matches(&json!({"amount": 1_000_001, "department_id": 10})));
    assert!(!c.matches(&json!({"amount": 5, "department_id": 11})));
    assert!(!c.matches(&json!({"department_id": 10})));
    assert!(!c.matches(&json!({"amount": "lots", "department_id": 10})));
}

#[test]
fn test_empty_conditions_match_everything() {
    let c = FlowConditions::default();
    assert!(c.is_catch_all());
    assert!(c.matches(&json!({})));
    assert!(c.matches(&json!({"amount": 99})));
}

#[test]
fn test_approval_type_satisfaction() {
    assert!(ApprovalType::Majority.is_satisfied(2, 3));
    assert!(!ApprovalType::Majority.is_satisfied(1, 3));
    assert!(!ApprovalType::Majority.is_satisfied(1, 2));
    assert!(ApprovalType::Optional.is_satisfied(1, 3));
    assert!(!ApprovalType::Required.is_satisfied(2, 3));
    assert!(ApprovalType::Unanimous.is_satisfied(3, 3));
    assert!(!ApprovalType::Optional.is_satisfied(0, 0));
}

#[test]
fn test_state_gate() {
    let gate = StateGate::pending_or_returned();
    assert!(gate.allows(RequestStatus::Pending, SubStatus::NoApprovals));
    assert!(!gate.allows(RequestStatus::Pending, SubStatus::PartiallyApproved));
    assert!(!gate.allows(RequestStatus::Reviewing, SubStatus::NoApprovals));
    assert!(!gate.allows(RequestStatus::Approved, SubStatus::NoApprovals));

    let lenient = StateGate {
        reviewing: true,
        partially_approved: true,
        ..gate
    };
    assert!(lenient.allows(RequestStatus::Reviewing, SubStatus::PartiallyApproved));
}

#[test]
fn test_step_navigation() {
    let f = two_step();
    assert_eq!(f.first_voting_step(), Some(1));
    assert_eq!(f.next_voting_step(1), Some(2));
    assert_eq!(f.next_voting_step(2), None);
    assert_eq!(f.previous_voting_step(2), Some(1));
    assert_eq!(f.previous_voting_step(1), None);
}

#[test]
fn test_requester_eligibility() {
    let open = two_step();
    assert!(open.can_submit(&Principal::new("1")));

    let restricted = two_step().with_requester(PrincipalRef::department("10"));
    assert!(restricted.can_submit(&Principal::new("1").with_department("10")));
    assert!(!restricted.can_submit(&Principal::new("1").with_department("11")));
}

#[test]
fn test_validate_accepts_flow_without_step_zero() {
    let f = ApprovalFlow::new(2, "estimate", "short").with_step(
        ApprovalStep::new(1, "only", ApprovalType::Optional).with_approver(PrincipalRef::user("1")),
    );
    f.validate().unwrap();
}

#[test]
fn test_validate_rejections() {
    let err = |f: ApprovalFlow| f.validate().unwrap_err().to_string();

    assert!(err(ApprovalFlow::new(1, "x", "empty")).contains("no steps"));

    let gap = two_step().with_step(
        ApprovalStep::new(4, "gap", ApprovalType::Optional).with_approver(PrincipalRef::user("1")),
    );
    assert!(err(gap).contains("contiguous"));

    let dup = two_step().with_step(
        ApprovalStep::new(2, "dup", ApprovalType::Optional).with_approver(PrincipalRef::user("1")),
    );
    assert!(err(dup).contains("more than once"));

    let only_creation = ApprovalFlow::new(1, "x", "y")
        .with_step(ApprovalStep::new(0, "created", ApprovalType::Required));
    assert!(err(only_creation).contains("no voting step"));

    let no_approvers = ApprovalFlow::new(1, "x", "y")
        .with_step(ApprovalStep::new(1, "review", ApprovalType::Required));
    assert!(err(no_approvers).contains("no approvers"));

    let voting_zero = ApprovalFlow::new(1, "x", "y")
        .with_step(ApprovalStep::new(0, "created", ApprovalType::Required).with_approver(PrincipalRef::user("1")))
        .with_step(ApprovalStep::new(1, "review", ApprovalType::Required).with_approver(PrincipalRef::user("1")));
    assert!(err(voting_zero).contains("step 0"));

    let empty_branch = ApprovalFlow::new(1, "x", "y").with_step(
        ApprovalStep::new(1, "review", ApprovalType::Required).with_approver(Approver::Conditional {
            condition: ConditionNode::always(),
            approvers: vec![],
        }),
    );
    assert!(err(empty_branch).contains("conditional approver has no approvers"));
}

#[test]
fn test_validate_rejects_deep_conditional_nesting() {
    let mut approver = Approver::Static(PrincipalRef::user("1"));
    for _ in 0..MAX_APPROVER_DEPTH {
        approver = Approver::Conditional {
            condition: ConditionNode::always(),
            approvers: vec![approver],
        };
    }
    let f = ApprovalFlow::new(1, "x", "y")
        .with_step(ApprovalStep::new(1, "review", ApprovalType::Required).with_approver(approver));
    assert!(f.validate().unwrap_err().to_string().contains("nest deeper"));
}

#[test]
fn test_return_target_parse() {
    assert_eq!("same_step".parse::<ReturnTarget>().unwrap(), ReturnTarget::SameStep);
    assert!("sideways".parse::<ReturnTarget>().is_err());
    assert_eq!(ReturnTarget::default().as_str(), "first_step");
}
