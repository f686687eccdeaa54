//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ringi_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{ConditionError, ConditionResult};

// Principals
pub use crate::{Principal, PrincipalId, PrincipalKind, PrincipalRef};

// Evaluation
pub use crate::{AttrPath, ConditionNode, Context, ContextBuilder, Namespace};

// Time
pub use crate::{Clock, SystemClock};
