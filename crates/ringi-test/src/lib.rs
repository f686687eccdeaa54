//! Ringi Test - Shared test utilities.
//!
//! Fixtures, mocks and harness helpers used as a dev-dependency by the
//! integration tests and the CLI.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! ringi-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use ringi_test::{FixedClock, estimate_flows, test_requester};
//!
//! let clock = FixedClock::at_fixed_instant();
//! let flows = estimate_flows();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
