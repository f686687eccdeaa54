//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ringi_config::prelude::*;` to import all essential types.

pub use crate::{ConfigError, ConfigResult};

pub use crate::{CatalogSection, Config, EngineSection, LoggingSection};

pub use crate::{ConfigLayer, LoadOptions, ResolvedConfig, ShowFormat};
