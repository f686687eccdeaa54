//! Cross-crate integration tests for Ringi.
//!
//! The tests live under `tests/` and drive the policy resolver and the
//! approval engine together through the shared fixtures in `ringi-test`.
