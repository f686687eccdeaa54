//! Prelude module - commonly used test utilities.
//!
//! Use `use ringi_test::prelude::*;` to import all essential helpers.

pub use crate::fixtures::{
    auto_approve_flow, deny_large_amount_policy, allow_all_policy, estimate_flows,
    estimate_policies, fixed_instant, jst, majority_flow, test_context, test_principal,
    test_requester,
};

pub use crate::mocks::{FailingPolicyRepository, FailingRequestStore, FixedClock};

pub use crate::harness::{TestCatalog, setup_test_logging, setup_test_logging_default};
