//! Ringi Telemetry - logging and tracing setup.
//!
//! This crate provides:
//! - Configurable `tracing` subscriber setup with four output formats
//! - [`EvaluationContext`] for correlating the log lines of one decision
//!   or transition
//! - With the `config` feature, conversion from
//!   `ringi_config::LoggingSection`
//!
//! # Example
//!
//! ```rust,no_run
//! use ringi_telemetry::{EvaluationContext, LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), ringi_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("ringi_approval=trace");
//! setup_logging(&config)?;
//!
//! let ctx = EvaluationContext::new("decide").with_business_code("estimate");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("deciding");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

#[cfg(feature = "config")]
mod config_bridge;
mod context;
mod error;
mod logging;

pub use context::EvaluationContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
