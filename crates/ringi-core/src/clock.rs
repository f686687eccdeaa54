//! Injected time source.
//!
//! The engines never call `Utc::now()` directly; the caller supplies a
//! [`Clock`] at the boundary so tests can pin time.

use chrono::{DateTime, Utc};
use std::fmt;

/// A source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
