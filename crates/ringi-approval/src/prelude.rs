//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ringi_approval::prelude::*;` to import all essential types.

// Errors
pub use crate::{ApprovalError, ApprovalResult};

// Flow configuration
pub use crate::{ApprovalFlow, ApprovalStep, ApprovalType, Approver, FlowConditions, FlowId};

// Requests
pub use crate::{ApprovalRequest, RequestId, RequestStatus, Submission, VoteAction};

// Engine and collaborators
pub use crate::{
    ApprovalEngine, EngineSettings, FlowRepository, FlowSelector, InMemoryFlowRepository,
    InMemoryRequestStore, RequestAction, RequestStore,
};
