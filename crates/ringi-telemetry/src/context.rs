//! Correlation context for a single decision or transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Carries a correlation id across one policy decision, flow selection or
/// request transition, and opens the tracing span for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Correlation identifier shared by every log line of the operation.
    pub correlation_id: Uuid,
    /// What is being evaluated (`decide`, `select_flow`, `approve`, ...).
    pub operation: String,
    /// Business code, when the operation has one.
    pub business_code: Option<String>,
    /// Approval request identifier, when the operation targets one.
    pub request_id: Option<String>,
    /// Acting principal.
    pub actor: Option<String>,
    /// When the operation started.
    pub started_at: DateTime<Utc>,
}

impl EvaluationContext {
    /// Start a context for `operation` with a fresh correlation id.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            operation: operation.into(),
            business_code: None,
            request_id: None,
            actor: None,
            started_at: Utc::now(),
        }
    }

    /// Reuse an upstream correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the business code.
    #[must_use]
    pub fn with_business_code(mut self, code: impl Into<String>) -> Self {
        self.business_code = Some(code.into());
        self
    }

    /// Set the approval request id.
    #[must_use]
    pub fn with_request_id(mut self, id: impl ToString) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    /// Set the acting principal.
    #[must_use]
    pub fn with_actor(mut self, actor: impl ToString) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    /// Milliseconds since the context was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// A span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "evaluation",
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            business_code = self.business_code.as_deref(),
            request_id = self.request_id.as_deref(),
            actor = self.actor.as_deref(),
        )
    }

    /// First eight characters of the correlation id.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.correlation_id.simple().to_string().chars().take(8).collect()
    }
}
