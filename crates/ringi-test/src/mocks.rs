//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

use ringi_approval::{ApprovalError, ApprovalRequest, ApprovalResult, RequestId, RequestStore};
use ringi_core::Clock;
use ringi_policy::{Policy, PolicyError, PolicyRepository, PolicyResult};

use crate::fixtures::fixed_instant;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// A clock stopped at `at`.
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    /// A clock stopped at [`fixed_instant`].
    #[must_use]
    pub fn at_fixed_instant() -> Self {
        Self::new(fixed_instant())
    }

    /// Move the clock forward.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = *now + by;
    }

    /// Jump to `at`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A request store whose every call fails with a storage error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRequestStore;

impl FailingRequestStore {
    fn error() -> ApprovalError {
        ApprovalError::Storage("request store unavailable".to_string())
    }
}

#[async_trait]
impl RequestStore for FailingRequestStore {
    async fn get(&self, _id: &RequestId) -> ApprovalResult<Option<ApprovalRequest>> {
        Err(Self::error())
    }

    async fn insert(&self, _request: ApprovalRequest) -> ApprovalResult<()> {
        Err(Self::error())
    }

    async fn update(
        &self,
        _request: ApprovalRequest,
        _expected_version: u64,
    ) -> ApprovalResult<ApprovalRequest> {
        Err(Self::error())
    }

    async fn open_requests(&self) -> ApprovalResult<Vec<RequestId>> {
        Err(Self::error())
    }
}

/// A policy repository that cannot be read.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPolicyRepository;

#[async_trait]
impl PolicyRepository for FailingPolicyRepository {
    async fn active_policies(
        &self,
        _business_code: &str,
        _action: &str,
        _resource_type: &str,
    ) -> PolicyResult<Vec<Policy>> {
        Err(PolicyError::Repository("policy store unavailable".to_string()))
    }
}
