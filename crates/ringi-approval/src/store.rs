//! Persistence for approval requests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{ApprovalError, ApprovalResult};
use crate::request::{ApprovalRequest, RequestId};

/// Storage for approval requests with optimistic concurrency.
///
/// `update` must be atomic: it compares the stored version with
/// `expected_version`, and only on a match stores the request with the
/// version incremented.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fetch a request.
    async fn get(&self, id: &RequestId) -> ApprovalResult<Option<ApprovalRequest>>;

    /// Store a new request.
    async fn insert(&self, request: ApprovalRequest) -> ApprovalResult<()>;

    /// Replace a request if it is still at `expected_version`.
    ///
    /// Returns the request as stored, with its new version.
    async fn update(
        &self,
        request: ApprovalRequest,
        expected_version: u64,
    ) -> ApprovalResult<ApprovalRequest>;

    /// Ids of every request that has not reached a terminal status.
    async fn open_requests(&self) -> ApprovalResult<Vec<RequestId>>;
}

/// In-memory request store.
///
/// Thread-safe via internal [`RwLock`].
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<RequestId, ApprovalRequest>>,
}

impl InMemoryRequestStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored requests.
    #[must_use]
    pub fn count(&self) -> usize {
        self.requests
            .read()
            .unwrap_or_else(|e| {
                tracing::warn!("request store lock poisoned, recovering");
                e.into_inner()
            })
            .len()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get(&self, id: &RequestId) -> ApprovalResult<Option<ApprovalRequest>> {
        let requests = self
            .requests
            .read()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        Ok(requests.get(id).cloned())
    }

    async fn insert(&self, request: ApprovalRequest) -> ApprovalResult<()> {
        let mut requests = self
            .requests
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        if let Some(existing) = requests.get(&request.id) {
            return Err(ApprovalError::Conflict {
                id: request.id.to_string(),
                expected: request.version,
                found: existing.version,
            });
        }
        requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn update(
        &self,
        mut request: ApprovalRequest,
        expected_version: u64,
    ) -> ApprovalResult<ApprovalRequest> {
        let mut requests = self
            .requests
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        let stored = requests
            .get_mut(&request.id)
            .ok_or_else(|| ApprovalError::NotFound(request.id.to_string()))?;
        if stored.version != expected_version {
            return Err(ApprovalError::Conflict {
                id: request.id.to_string(),
                expected: expected_version,
                found: stored.version,
            });
        }
        request.version = expected_version.saturating_add(1);
        *stored = request.clone();
        Ok(request)
    }

    async fn open_requests(&self) -> ApprovalResult<Vec<RequestId>> {
        let requests = self
            .requests
            .read()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        Ok(requests
            .values()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.id.clone())
            .collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
