//! Environment variable fallbacks.
//!
//! Environment variables are a **fallback**, not an override: they only
//! apply to fields that no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: FieldKind,
}

#[derive(Clone, Copy)]
enum FieldKind {
    Str,
    Int,
}

/// All supported `RINGI_*` variables.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "RINGI_LOG_LEVEL",
        field_path: "logging.level",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "RINGI_LOG_FORMAT",
        field_path: "logging.format",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "RINGI_TIMEZONE_OFFSET_MINUTES",
        field_path: "engine.timezone_offset_minutes",
        kind: FieldKind::Int,
    },
    EnvMapping {
        var_name: "RINGI_REQUEST_TTL_HOURS",
        field_path: "engine.default_request_ttl_hours",
        kind: FieldKind::Int,
    },
    EnvMapping {
        var_name: "RINGI_POLICIES_PATH",
        field_path: "catalog.policies",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "RINGI_FLOWS_PATH",
        field_path: "catalog.flows",
        kind: FieldKind::Str,
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// any file layer. Fields set only by the embedded defaults count as unset.
///
/// Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric field's variable does not
/// parse as an integer.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            continue;
        }

        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        let value = match mapping.kind {
            FieldKind::Str => toml::Value::String(raw.clone()),
            FieldKind::Int => raw
                .trim()
                .parse::<i64>()
                .map(toml::Value::Integer)
                .map_err(|e| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected an integer: {e}"),
                })?,
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Set a dotted field in the TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
