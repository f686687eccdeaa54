use super::*;
use crate::types::Principal;
use serde_json::json;

fn node(v: Value) -> ConditionNode {
    serde_json::from_value(v).unwrap()
}

fn ctx(user: &Principal, data: Value) -> Context {
    Context::builder().user(user).data(data).build()
}

#[test]
fn test_cross_attribute_ne() {
    let cond = node(json!({"field": "user.id", "operator": "ne", "value": "data.created_by"}));

    assert!(cond.evaluate(&ctx(&Principal::new("5"), json!({"created_by": 7}))));
    assert!(!cond.evaluate(&ctx(&Principal::new("5"), json!({"created_by": 5}))));
}

#[test]
fn test_cross_attribute_missing_rhs_is_false() {
    let eq = node(json!({"field": "user.id", "operator": "eq", "value": "data.created_by"}));
    let ne = node(json!({"field": "user.id", "operator": "ne", "value": "data.created_by"}));
    let c = ctx(&Principal::new("5"), json!({}));
    assert!(!eq.evaluate(&c));
    assert!(!ne.evaluate(&c));
}

#[test]
fn test_missing_field_gt_is_always_false() {
    let cond = node(json!({"field": "data.nonexistent", "operator": "gt", "value": 0}));
    let c = ctx(&Principal::new("1"), json!({"amount": 10}));
    for _ in 0..3 {
        assert!(!cond.evaluate(&c));
    }
}

#[test]
fn test_empty_groups() {
    let c = Context::empty();
    assert!(node(json!({"operator": "and", "rules": []})).evaluate(&c));
    assert!(!node(json!({"operator": "or", "rules": []})).evaluate(&c));
    assert!(ConditionNode::always().evaluate(&c));
}

#[test]
fn test_not_negates_child() {
    let cond = node(json!({
        "operator": "not",
        "rules": [{"field": "data.is_new", "operator": "eq", "value": true}]
    }));
    assert!(!cond.evaluate(&ctx(&Principal::new("1"), json!({"is_new": true}))));
    assert!(cond.evaluate(&ctx(&Principal::new("1"), json!({"is_new": false}))));
}

#[test]
fn test_hand_built_not_without_child_fails_closed() {
    let cond = ConditionNode::Group {
        operator: GroupOperator::Not,
        rules: vec![],
    };
    assert!(!cond.evaluate(&Context::empty()));
}

#[test]
fn test_numeric_coercion() {
    let c = ctx(&Principal::new("1"), json!({"amount": "1500000", "count": 3}));
    assert!(node(json!({"field": "data.amount", "operator": "gt", "value": 1_000_000})).evaluate(&c));
    assert!(node(json!({"field": "data.amount", "operator": "eq", "value": 1_500_000})).evaluate(&c));
    assert!(node(json!({"field": "data.count", "operator": "gte", "value": "3"})).evaluate(&c));
    assert!(node(json!({"field": "data.count", "operator": "lte", "value": 3.0})).evaluate(&c));
    assert!(!node(json!({"field": "data.count", "operator": "lt", "value": 3})).evaluate(&c));
}

#[test]
fn test_non_numeric_comparison_fails_closed() {
    let c = ctx(&Principal::new("1"), json!({"name": "alpha", "flag": true}));
    assert!(!node(json!({"field": "data.name", "operator": "gt", "value": 1})).evaluate(&c));
    assert!(!node(json!({"field": "data.flag", "operator": "lt", "value": 2})).evaluate(&c));
    // Incomparable types fail both eq and ne.
    assert!(!node(json!({"field": "data.name", "operator": "eq", "value": 1})).evaluate(&c));
    assert!(!node(json!({"field": "data.name", "operator": "ne", "value": 1})).evaluate(&c));
}

#[test]
fn test_in_operator() {
    let user = Principal::new("1").with_position("2");
    let c = ctx(&user, json!({"allowed": ["a", "b"], "kind": "b"}));

    assert!(node(json!({"field": "user.position_id", "operator": "in", "value": [1, 2, 3]})).evaluate(&c));
    assert!(!node(json!({"field": "user.position_id", "operator": "in", "value": [4, 5]})).evaluate(&c));
    assert!(node(json!({"field": "data.kind", "operator": "in", "value": "data.allowed"})).evaluate(&c));
    // Right-hand side must be a list.
    assert!(!node(json!({"field": "data.kind", "operator": "in", "value": "b"})).evaluate(&c));
}

#[test]
fn test_exists() {
    let c = ctx(&Principal::new("1"), json!({"vendor": {"is_new": false}, "gone": null}));
    assert!(node(json!({"field": "user.id", "operator": "exists"})).evaluate(&c));
    assert!(node(json!({"field": "data.vendor.is_new", "operator": "exists"})).evaluate(&c));
    assert!(!node(json!({"field": "data.gone", "operator": "exists"})).evaluate(&c));
    assert!(!node(json!({"field": "data.missing", "operator": "exists"})).evaluate(&c));
}

#[test]
fn test_deny_policy_shape() {
    let cond = node(json!({"operator": "and", "rules": [
        {"field": "user.position_id", "operator": "in", "value": [1, 2, 3]},
        {"field": "data.amount", "operator": "gt", "value": 1_000_000}
    ]}));
    let user = Principal::new("9").with_position("2");
    assert!(cond.evaluate(&ctx(&user, json!({"amount": 1_500_000}))));
    assert!(!cond.evaluate(&ctx(&user, json!({"amount": 900_000}))));
    assert!(!cond.evaluate(&ctx(&Principal::new("9").with_position("4"), json!({"amount": 1_500_000}))));
}

#[test]
fn test_time_condition() {
    use chrono::{FixedOffset, TimeZone, Utc};
    let jst = FixedOffset::east_opt(32_400).unwrap();
    let at = Utc.with_ymd_and_hms(2025, 4, 7, 0, 30, 0).unwrap();
    let c = Context::builder().at(at, jst).build();

    let business_hours = node(json!({"operator": "and", "rules": [
        {"field": "current_time.hhmm", "operator": "gte", "value": 900},
        {"field": "current_time.hhmm", "operator": "lt", "value": 1800}
    ]}));
    assert!(business_hours.evaluate(&c));
}

#[test]
fn test_string_literal_that_is_not_a_path() {
    let cond = node(json!({"field": "data.status", "operator": "eq", "value": "draft"}));
    match &cond {
        ConditionNode::Leaf { value, .. } => assert_eq!(value, &Operand::Literal(json!("draft"))),
        ConditionNode::Group { .. } => panic!("expected leaf"),
    }
    assert!(cond.evaluate(&ctx(&Principal::new("1"), json!({"status": "draft"}))));
}

#[test]
fn test_decode_errors() {
    let err = |v: Value| serde_json::from_value::<ConditionNode>(v).unwrap_err().to_string();

    assert!(err(json!({"operator": "like", "field": "data.a", "value": 1})).contains("unknown condition operator"));
    assert!(err(json!({"operator": "eq", "value": 1})).contains("requires a `field`"));
    assert!(err(json!({"operator": "eq", "field": "data.a"})).contains("requires a `value`"));
    assert!(err(json!({"operator": "and"})).contains("requires `rules`"));
    assert!(err(json!({"operator": "not", "rules": []})).contains("exactly one rule"));
    assert!(err(json!({"operator": "eq", "field": "amount", "value": 1})).contains("invalid attribute path"));
}

#[test]
fn test_decode_rejects_deep_trees() {
    let mut tree = json!({"field": "data.a", "operator": "exists"});
    for _ in 0..MAX_CONDITION_DEPTH {
        tree = json!({"operator": "and", "rules": [tree]});
    }
    let err = serde_json::from_value::<ConditionNode>(tree).unwrap_err();
    assert!(err.to_string().contains("maximum depth"));
}

#[test]
fn test_decode_accepts_max_depth() {
    let mut tree = json!({"field": "data.a", "operator": "exists"});
    for _ in 1..MAX_CONDITION_DEPTH {
        tree = json!({"operator": "or", "rules": [tree]});
    }
    let cond = node(tree);
    assert_eq!(cond.depth(), MAX_CONDITION_DEPTH);
}

#[test]
fn test_serialize_preserves_wire_shape() {
    let wire = json!({"operator": "and", "rules": [
        {"field": "user.id", "operator": "ne", "value": "data.created_by"},
        {"field": "data.vendor", "operator": "exists"}
    ]});
    let cond = node(wire.clone());
    assert_eq!(serde_json::to_value(&cond).unwrap(), wire);
}

#[test]
fn test_builders() {
    let cond = ConditionNode::and(vec![
        ConditionNode::leaf("data.amount", LeafOperator::Gte, json!(10)).unwrap(),
        ConditionNode::not(ConditionNode::exists("data.locked").unwrap()),
    ]);
    assert!(cond.evaluate(&ctx(&Principal::new("1"), json!({"amount": 10}))));
    assert!(!cond.evaluate(&ctx(&Principal::new("1"), json!({"amount": 10, "locked": true}))));
    assert!(!cond.is_always());
    assert!(ConditionNode::default().is_always());
}

#[test]
fn test_large_ids_compare_exactly() {
    let eq = node(json!({"field": "user.id", "operator": "eq", "value": "data.created_by"}));
    let ne = node(json!({"field": "user.id", "operator": "ne", "value": "data.created_by"}));

    // Both sides above 2^53, one apart.
    let c = ctx(&Principal::new("9007199254740993"), json!({"created_by": 9_007_199_254_740_992_u64}));
    assert!(!eq.evaluate(&c));
    assert!(ne.evaluate(&c));

    let c = ctx(&Principal::new("9007199254740993"), json!({"created_by": 9_007_199_254_740_993_u64}));
    assert!(eq.evaluate(&c));
    assert!(!ne.evaluate(&c));

    let c = ctx(&Principal::new("12345678901234567890"), json!({"created_by": "12345678901234567891"}));
    assert!(!eq.evaluate(&c));
    assert!(ne.evaluate(&c));
}

#[test]
fn test_large_ids_in_list_and_ordering() {
    let user = Principal::new("18446744073709551615");
    let c = ctx(&user, json!({"limit": 18_446_744_073_709_551_614_u64}));

    assert!(!node(json!({"field": "user.id", "operator": "in", "value": ["18446744073709551614"]})).evaluate(&c));
    assert!(node(json!({"field": "user.id", "operator": "in", "value": [18_446_744_073_709_551_615_u64]})).evaluate(&c));
    assert!(node(json!({"field": "user.id", "operator": "gt", "value": "data.limit"})).evaluate(&c));
}

#[test]
fn test_fractional_values_still_coerce() {
    let c = ctx(&Principal::new("1"), json!({"rate": "2.50", "count": 3}));
    assert!(node(json!({"field": "data.rate", "operator": "eq", "value": 2.5})).evaluate(&c));
    assert!(node(json!({"field": "data.count", "operator": "eq", "value": 3.0})).evaluate(&c));
    // Strings on both sides compare as text.
    assert!(!node(json!({"field": "data.rate", "operator": "eq", "value": "2.5"})).evaluate(&c));
}
