use crate::request::RequestStatus;

/// Errors returned by flow selection and the approval state machine.
///
/// Every variant is an ordinary, typed outcome the caller is expected to
/// handle. None of them indicate a corrupted engine.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A flow or request does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested action is not valid in the request's current state.
    #[error("cannot {action} a request in state {from}: {reason}")]
    InvalidStateTransition {
        /// Status the request was in.
        from: RequestStatus,
        /// The attempted action.
        action: String,
        /// Why the transition was refused.
        reason: String,
    },

    /// The actor is not allowed to perform the action.
    #[error("permission denied for {actor}: {reason}")]
    PermissionDenied {
        /// Who attempted the action.
        actor: String,
        /// Why it was refused.
        reason: String,
    },

    /// A flow is misconfigured (invalid steps, unsatisfiable approvers).
    #[error("flow configuration error: {0}")]
    Configuration(String),

    /// The stored request changed since it was read.
    #[error("conflicting update to {id}: expected version {expected}, found {found}")]
    Conflict {
        /// The request that conflicted.
        id: String,
        /// Version the writer read.
        expected: u64,
        /// Version actually stored.
        found: u64,
    },

    /// The flow repository failed.
    #[error("flow repository error: {0}")]
    Repository(String),

    /// The request store failed (lock poisoned, persistence failed, etc.).
    #[error("storage error: {0}")]
    Storage(String),
}

impl ApprovalError {
    /// Build an [`ApprovalError::InvalidStateTransition`].
    pub(crate) fn invalid(
        from: RequestStatus,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            from,
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`ApprovalError::PermissionDenied`].
    pub(crate) fn denied(actor: impl ToString, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            actor: actor.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether retrying after re-reading state may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
