use thiserror::Error;

/// Errors raised by the policy resolver and its repositories.
///
/// A missing policy is never an error: the resolver denies by default.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy repository could not be read.
    #[error("policy repository error: {0}")]
    Repository(String),

    /// A policy record is malformed or conflicts with another record.
    #[error("invalid policy {id}: {reason}")]
    InvalidPolicy {
        /// Identifier of the offending policy.
        id: i64,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
