//! Ringi Core - Foundation types shared by the policy and approval engines.
//!
//! This crate provides:
//! - Principal identities and principal references (`user`, `department`,
//!   `position`, `system_level`)
//! - The read-only evaluation [`Context`] over four fixed namespaces
//! - The [`ConditionNode`] tree and its fail-closed evaluator
//! - A [`Clock`] abstraction so evaluation never reads the wall clock
//!
//! # Example
//!
//! ```
//! use ringi_core::{ConditionNode, Context, Principal};
//! use serde_json::json;
//!
//! let node: ConditionNode = serde_json::from_value(json!({
//!     "field": "user.id",
//!     "operator": "ne",
//!     "value": "data.created_by",
//! }))
//! .unwrap();
//!
//! let ctx = Context::builder()
//!     .user(&Principal::new("5"))
//!     .data(json!({ "created_by": 7 }))
//!     .build();
//!
//! assert!(node.evaluate(&ctx));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod clock;
pub mod condition;
pub mod context;
pub mod error;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use condition::{ConditionNode, GroupOperator, LeafOperator, MAX_CONDITION_DEPTH, Operand};
pub use context::{AttrPath, Context, ContextBuilder, Namespace};
pub use error::{ConditionError, ConditionResult};
pub use types::{Principal, PrincipalId, PrincipalKind, PrincipalRef};
