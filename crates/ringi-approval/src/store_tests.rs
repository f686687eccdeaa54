use super::*;
use crate::flow::FlowId;
use crate::request::RequestStatus;
use chrono::Utc;
use ringi_core::Principal;
use serde_json::json;
use std::collections::BTreeMap;

fn make_request(status: RequestStatus) -> ApprovalRequest {
    let now = Utc::now();
    ApprovalRequest {
        id: RequestId::new(),
        flow_id: FlowId(1),
        business_code: "estimate".into(),
        data_ref: Some("estimate/42".into()),
        data: json!({"amount": 1}),
        request_meta: json!({}),
        status,
        current_step: 1,
        round: 1,
        per_step_votes: BTreeMap::new(),
        created_by: Principal::new("1"),
        created_at: now,
        updated_at: now,
        expires_at: None,
        reviewer: None,
        returned_from: None,
        version: 0,
    }
}

#[tokio::test]
async fn test_insert_and_get() {
    let store = InMemoryRequestStore::new();
    let req = make_request(RequestStatus::Pending);
    let id = req.id.clone();
    store.insert(req).await.unwrap();

    let fetched = store.get(&id).await.unwrap().unwrap();
    assert_eq!(fetched.data_ref.as_deref(), Some("estimate/42"));
    assert_eq!(store.count(), 1);
    assert!(store.get(&RequestId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_double_insert_conflicts() {
    let store = InMemoryRequestStore::new();
    let req = make_request(RequestStatus::Pending);
    store.insert(req.clone()).await.unwrap();
    let err = store.insert(req).await.unwrap_err();
    assert!(matches!(err, ApprovalError::Conflict { .. }));
}

#[tokio::test]
async fn test_update_bumps_version() {
    let store = InMemoryRequestStore::new();
    let mut req = make_request(RequestStatus::Pending);
    store.insert(req.clone()).await.unwrap();

    req.status = RequestStatus::Reviewing;
    let stored = store.update(req, 0).await.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(
        store.get(&stored.id).await.unwrap().unwrap().status,
        RequestStatus::Reviewing
    );
}

#[tokio::test]
async fn test_stale_update_conflicts() {
    let store = InMemoryRequestStore::new();
    let req = make_request(RequestStatus::Pending);
    store.insert(req.clone()).await.unwrap();
    store.update(req.clone(), 0).await.unwrap();

    let err = store.update(req, 0).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, ApprovalError::Conflict { expected: 0, found: 1, .. }));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = InMemoryRequestStore::new();
    let err = store
        .update(make_request(RequestStatus::Pending), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(_)));
}

#[tokio::test]
async fn test_open_requests_excludes_terminal() {
    let store = InMemoryRequestStore::new();
    let open = make_request(RequestStatus::Returned);
    let open_id = open.id.clone();
    store.insert(open).await.unwrap();
    store.insert(make_request(RequestStatus::Approved)).await.unwrap();
    store.insert(make_request(RequestStatus::Expired)).await.unwrap();

    assert_eq!(store.open_requests().await.unwrap(), vec![open_id]);
}
