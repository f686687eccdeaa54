//! Configuration types for Ringi.
//!
//! These types have no dependencies on the engine crates. Conversion into
//! engine settings happens at the integration boundary (CLI startup) so the
//! config crate stays a leaf. Every struct implements [`Default`] so that a
//! bare `[section]` header produces a working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine-wide settings (time zone, expiry, return target).
    pub engine: EngineSection,
    /// Locations of the policy and flow catalogs.
    pub catalog: CatalogSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// EngineSection
// ---------------------------------------------------------------------------

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Fixed UTC offset in minutes for the `current_time` namespace.
    pub timezone_offset_minutes: i32,
    /// Default request TTL in hours; `0` means requests never expire unless
    /// their flow sets one.
    pub default_request_ttl_hours: u32,
    /// `first_step`, `same_step` or `previous_step`.
    pub return_target: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            timezone_offset_minutes: 540,
            default_request_ttl_hours: 0,
            return_target: "first_step".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// CatalogSection
// ---------------------------------------------------------------------------

/// Catalog file locations. Both are JSON arrays of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    /// Path to `policies.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<PathBuf>,
    /// Path to `flows.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["ringi_approval=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
