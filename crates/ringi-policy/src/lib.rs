//! Ringi Policy - Attribute-based allow/deny decisions.
//!
//! A [`Policy`] scopes a condition tree to a `(business_code, action,
//! resource_type)` triple. The [`PolicyResolver`] fetches the candidates from
//! a [`PolicyRepository`], evaluates them highest priority first, and lets
//! the first match decide. With no match the answer is [`Effect::Deny`].
//!
//! # Example
//!
//! ```
//! use ringi_core::Context;
//! use ringi_policy::{Effect, Policy, evaluate_policies};
//!
//! let policies = vec![Policy::new(1, "estimate", "view", "estimate", Effect::Allow)];
//! let decision = evaluate_policies(&policies, &Context::empty());
//! assert!(decision.is_allowed());
//!
//! let decision = evaluate_policies(&[], &Context::empty());
//! assert_eq!(decision.effect, Effect::Deny);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Error types and results for policy resolution.
pub mod error;
pub mod policy;
pub mod repository;
pub mod resolver;

pub use error::{PolicyError, PolicyResult};
pub use policy::{Effect, Policy, PolicyId};
pub use repository::{InMemoryPolicyRepository, PolicyRepository};
pub use resolver::{Decision, PolicyResolver, evaluate_policies};
