#![allow(clippy::arithmetic_side_effects)]

use super::*;
use crate::flow::{ApprovalStep, ApprovalType, FlowConditions};
use crate::repository::InMemoryFlowRepository;
use crate::store::InMemoryRequestStore;
use chrono::{Duration, TimeZone};
use ringi_core::PrincipalRef;
use serde_json::json;

#[derive(Debug)]
struct TestClock(std::sync::Mutex<DateTime<Utc>>);

impl TestClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(std::sync::Mutex::new(
            Utc.with_ymd_and_hms(2025, 4, 7, 1, 0, 0).unwrap(),
        )))
    }

    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn requester() -> Principal {
    Principal::new("100").with_department("10")
}

fn director() -> Principal {
    Principal::new("42").with_position("1")
}

fn committee_flow() -> ApprovalFlow {
    let mut committee = ApprovalStep::new(1, "committee", ApprovalType::Required);
    for id in 1..=5 {
        committee = committee.with_approver(PrincipalRef::user(id.to_string()));
    }
    ApprovalFlow::new(1, "estimate", "committee")
        .with_priority(10)
        .with_step(ApprovalStep::new(0, "created", ApprovalType::Required))
        .with_step(committee)
        .with_step(
            ApprovalStep::new(2, "director", ApprovalType::Optional)
                .with_approver(PrincipalRef::position("1")),
        )
}

fn small_flow() -> ApprovalFlow {
    ApprovalFlow::new(2, "estimate", "small amounts")
        .with_priority(1)
        .with_conditions(FlowConditions {
            amount_max: Some(1_000.0),
            ..FlowConditions::default()
        })
        .with_expiry_hours(1)
        .with_step(
            ApprovalStep::new(1, "director", ApprovalType::Optional)
                .with_approver(PrincipalRef::position("1")),
        )
}

fn engine(clock: Arc<TestClock>) -> ApprovalEngine {
    let flows = InMemoryFlowRepository::from_flows(vec![
        committee_flow(),
        small_flow(),
        ApprovalFlow::new(3, "estimate", "retired")
            .inactive()
            .with_step(
                ApprovalStep::new(1, "x", ApprovalType::Optional).with_approver(PrincipalRef::user("1")),
            ),
    ])
    .unwrap();
    ApprovalEngine::new(Arc::new(flows), Arc::new(InMemoryRequestStore::new())).with_clock(clock)
}

#[tokio::test]
async fn test_lifecycle_through_engine() {
    let clock = TestClock::new();
    let engine = engine(Arc::clone(&clock));

    let req = engine
        .select_and_submit("estimate", requester(), Submission::new(json!({"amount": 50_000})))
        .await
        .unwrap();
    assert_eq!(req.flow_id, FlowId(1));
    assert_eq!(req.version, 0);
    assert!(req.expires_at.is_none());

    let mut last = req.clone();
    for id in 1..=5 {
        let actor = Principal::new(id.to_string());
        if last.status == RequestStatus::Pending {
            last = engine.act(&req.id, &actor, RequestAction::StartReview, None).await.unwrap();
        }
        last = engine
            .act(&req.id, &actor, RequestAction::Approve, Some("ok".into()))
            .await
            .unwrap();
    }
    assert_eq!(last.current_step, 2);
    assert_eq!(last.status, RequestStatus::Pending);

    engine.act(&req.id, &director(), RequestAction::StartReview, None).await.unwrap();
    let done = engine.act(&req.id, &director(), RequestAction::Approve, None).await.unwrap();
    assert_eq!(done.status, RequestStatus::Approved);
    assert_eq!(done.version, 8);
    assert!(engine.locks.is_empty());
}

#[tokio::test]
async fn test_repeated_start_review_is_not_persisted() {
    let engine = engine(TestClock::new());
    let req = engine
        .submit(FlowId(1), requester(), Submission::new(json!({})))
        .await
        .unwrap();
    let a = engine.act(&req.id, &Principal::new("1"), RequestAction::StartReview, None).await.unwrap();
    let b = engine.act(&req.id, &Principal::new("1"), RequestAction::StartReview, None).await.unwrap();
    assert_eq!(a.version, 1);
    assert_eq!(b.version, 1);
}

#[tokio::test]
async fn test_submit_unknown_or_inactive_flow() {
    let engine = engine(TestClock::new());
    for id in [FlowId(3), FlowId(99)] {
        let err = engine
            .submit(id, requester(), Submission::new(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NotFound(_)));
    }

    let err = engine
        .select_and_submit("purchase", requester(), Submission::new(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(_)));
}

#[tokio::test]
async fn test_unknown_request() {
    let engine = engine(TestClock::new());
    let err = engine
        .act(&RequestId::new(), &director(), RequestAction::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(_)));
}

#[tokio::test]
async fn test_terminal_request_is_immutable() {
    let engine = engine(TestClock::new());
    let req = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    engine.act(&req.id, &director(), RequestAction::StartReview, None).await.unwrap();
    let rejected = engine.act(&req.id, &director(), RequestAction::Reject, None).await.unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);

    for action in [
        RequestAction::StartReview,
        RequestAction::Approve,
        RequestAction::Reject,
        RequestAction::Return,
        RequestAction::Cancel,
    ] {
        let err = engine.act(&req.id, &director(), action, None).await.unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidStateTransition { from: RequestStatus::Rejected, .. }));
    }
    let after = engine.get(&req.id).await.unwrap();
    assert_eq!(after, rejected);
}

#[tokio::test]
async fn test_lazy_expiry_on_act() {
    let clock = TestClock::new();
    let engine = engine(Arc::clone(&clock));
    let req = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    assert_eq!(req.expires_at, Some(clock.now() + Duration::hours(1)));

    clock.advance(Duration::hours(2));
    let err = engine
        .act(&req.id, &director(), RequestAction::StartReview, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::InvalidStateTransition { from: RequestStatus::Expired, .. }));
    assert_eq!(engine.get(&req.id).await.unwrap().status, RequestStatus::Expired);
}

#[tokio::test]
async fn test_lazy_expiry_on_get() {
    let clock = TestClock::new();
    let engine = engine(Arc::clone(&clock));
    let req = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    clock.advance(Duration::hours(1));
    let fetched = engine.get(&req.id).await.unwrap();
    assert_eq!(fetched.status, RequestStatus::Expired);
    assert_eq!(fetched.version, 1);
}

#[tokio::test]
async fn test_expire_due_sweeps_open_requests() {
    let clock = TestClock::new();
    let engine = engine(Arc::clone(&clock)).with_settings(
        EngineSettings::default().with_default_ttl_hours(48).unwrap(),
    );

    let short = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    let long = engine
        .submit(FlowId(1), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    assert_eq!(long.expires_at, Some(clock.now() + Duration::hours(48)));

    let expired = engine.expire_due(clock.now() + Duration::hours(3)).await.unwrap();
    assert_eq!(expired, vec![short.id.clone()]);

    let expired = engine.expire_due(clock.now() + Duration::hours(49)).await.unwrap();
    assert_eq!(expired, vec![long.id.clone()]);
    assert!(engine.expire_due(clock.now() + Duration::hours(100)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_and_resubmit() {
    let engine = engine(TestClock::new());
    let req = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    assert!(engine.can_edit(&req.id, &requester()).await.unwrap());

    engine.act(&req.id, &director(), RequestAction::StartReview, None).await.unwrap();
    assert!(!engine.can_edit(&req.id, &requester()).await.unwrap());

    let returned = engine
        .act(&req.id, &director(), RequestAction::Return, Some("attach quote".into()))
        .await
        .unwrap();
    assert_eq!(returned.status, RequestStatus::Returned);
    assert!(engine.can_edit(&req.id, &requester()).await.unwrap());

    let again = engine
        .resubmit(&req.id, &requester(), Some(json!({"amount": 20})))
        .await
        .unwrap();
    assert_eq!(again.status, RequestStatus::Pending);
    assert_eq!(again.round, 2);
    assert_eq!(again.data, json!({"amount": 20}));
}

#[tokio::test]
async fn test_cancel_by_requester_only() {
    let engine = engine(TestClock::new());
    let req = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    let err = engine.act(&req.id, &director(), RequestAction::Cancel, None).await.unwrap_err();
    assert!(matches!(err, ApprovalError::PermissionDenied { .. }));
    let cancelled = engine.act(&req.id, &requester(), RequestAction::Cancel, None).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_advance_once() {
    let engine = Arc::new(engine(TestClock::new()));
    let req = engine
        .submit(FlowId(1), requester(), Submission::new(json!({})))
        .await
        .unwrap();
    engine.act(&req.id, &Principal::new("1"), RequestAction::StartReview, None).await.unwrap();

    let tasks: Vec<_> = (1..=5)
        .map(|id| {
            let engine = Arc::clone(&engine);
            let rid = req.id.clone();
            tokio::spawn(async move {
                engine
                    .act(&rid, &Principal::new(id.to_string()), RequestAction::Approve, None)
                    .await
            })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let after = engine.get(&req.id).await.unwrap();
    assert_eq!(after.current_step, 2);
    assert_eq!(after.status, RequestStatus::Pending);
    assert_eq!(after.current_votes(1).count(), 5);
    assert_eq!(after.version, 6);
    assert!(engine.locks.is_empty());
}

#[tokio::test]
async fn test_lock_table_empties_on_every_exit() {
    let clock = TestClock::new();
    let engine = engine(Arc::clone(&clock));

    for _ in 0..100 {
        let err = engine
            .act(&RequestId::new(), &director(), RequestAction::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NotFound(_)));
        assert!(engine.get(&RequestId::new()).await.is_err());
    }
    assert_eq!(engine.locks.len(), 0);

    let req = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    assert!(engine.can_edit(&req.id, &requester()).await.unwrap());
    engine.get(&req.id).await.unwrap();
    engine.act(&req.id, &director(), RequestAction::StartReview, None).await.unwrap();
    assert_eq!(engine.locks.len(), 0);

    engine.act(&req.id, &director(), RequestAction::Reject, None).await.unwrap();
    for _ in 0..3 {
        engine.get(&req.id).await.unwrap();
        assert!(engine.act(&req.id, &director(), RequestAction::Approve, None).await.is_err());
    }
    assert_eq!(engine.locks.len(), 0);

    let open = engine
        .submit(FlowId(2), requester(), Submission::new(json!({"amount": 10})))
        .await
        .unwrap();
    assert!(engine.expire_due(clock.now()).await.unwrap().is_empty());
    clock.advance(Duration::hours(2));
    assert_eq!(engine.expire_due(clock.now()).await.unwrap(), vec![open.id]);
    assert_eq!(engine.locks.len(), 0);
}

#[test]
fn test_settings_validation() {
    assert!(EngineSettings::default().with_timezone_offset_minutes(-300).is_ok());
    assert!(EngineSettings::default().with_timezone_offset_minutes(24 * 60).is_err());
    assert!(EngineSettings::default().with_default_ttl_hours(MAX_REQUEST_TTL_HOURS + 1).is_err());
    assert_eq!(
        EngineSettings::default().timezone_offset.local_minus_utc(),
        DEFAULT_TIMEZONE_OFFSET_MINUTES * 60
    );
}
