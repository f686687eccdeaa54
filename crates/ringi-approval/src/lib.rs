//! Ringi Approval - Multi-step approval workflows.
//!
//! This crate selects the approval flow that applies to a piece of business
//! data and drives an [`ApprovalRequest`] through that flow's steps to a
//! terminal outcome.
//!
//! # Components
//!
//! - **Flow model**: [`ApprovalFlow`], [`ApprovalStep`], [`Approver`],
//!   [`FlowConditions`], validated at load time
//! - **Flow selection**: [`FlowSelector`] over a [`FlowRepository`]
//! - **State machine**: [`StepMachine`], pure in-memory transitions
//! - **Engine**: [`ApprovalEngine`], per-request locking, expiry, and
//!   persistence through a [`RequestStore`]
//!
//! # Example
//!
//! ```
//! use ringi_approval::{ApprovalFlow, ApprovalStep, ApprovalType, select_flow};
//! use ringi_core::PrincipalRef;
//! use serde_json::json;
//!
//! let flows = vec![
//!     ApprovalFlow::new(1, "estimate", "default")
//!         .with_priority(10)
//!         .with_step(
//!             ApprovalStep::new(1, "manager", ApprovalType::Optional)
//!                 .with_approver(PrincipalRef::position("3")),
//!         ),
//! ];
//!
//! let flow = select_flow(&flows, "estimate", &json!({"amount": 500_000})).unwrap();
//! assert_eq!(flow.name, "default");
//! assert!(flow.validate().is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod engine;
/// Error types and results for the approval module.
pub mod error;
pub mod flow;
pub mod machine;
pub mod repository;
pub mod request;
pub mod resolve;
pub mod selector;
pub mod store;

pub use engine::{ApprovalEngine, EngineSettings, RequestAction};
pub use error::{ApprovalError, ApprovalResult};
pub use flow::{
    ApprovalFlow, ApprovalStep, ApprovalType, Approver, FlowConditions, FlowId, ReturnTarget,
    StateGate,
};
pub use machine::StepMachine;
pub use repository::{FlowRepository, InMemoryFlowRepository};
pub use request::{
    ApprovalRequest, RequestId, RequestStatus, SubStatus, Submission, Vote, VoteAction,
};
pub use resolve::{ResolvedStep, resolve_approvers};
pub use selector::{FlowSelector, select_flow};
pub use store::{InMemoryRequestStore, RequestStore};
