//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ringi_policy::prelude::*;` to import all essential types.

pub use crate::{PolicyError, PolicyResult};

pub use crate::{Effect, Policy, PolicyId};

pub use crate::{Decision, InMemoryPolicyRepository, PolicyRepository, PolicyResolver};
