#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Layered configuration for Ringi.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ringi_config::Config;
//!
//! // defaults → system → user → explicit file → env fallbacks
//! let resolved = Config::load(Some(std::path::Path::new("ringi.toml"))).unwrap();
//! println!("offset: {}", resolved.config.engine.timezone_offset_minutes);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** passed by the caller (`ringi --config path`)
//! 2. **User** (`~/.ringi/config.toml`)
//! 3. **System** (`/etc/ringi/config.toml`)
//! 4. **Environment variables** (`RINGI_*`), fallback only
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate depends on no other ringi crate. Conversion into engine
//! settings happens where the engine is built.

pub mod prelude;

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::LoadOptions;
pub use merge::{ConfigLayer, FieldSources};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed, the
    /// explicit file is missing, or the final configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(&LoadOptions {
            explicit: explicit.map(std::path::Path::to_path_buf),
            ..LoadOptions::default()
        })
    }

    /// Load configuration from a single file over the defaults (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
