//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod decide;
pub(crate) mod select_flow;
pub(crate) mod validate;

use anyhow::{Context as _, Result};
use serde_json::Value;

/// Parse a JSON object argument; an absent argument is `{}`.
pub(crate) fn parse_object(label: &str, raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let value: Value = serde_json::from_str(raw).with_context(|| format!("--{label} is not valid JSON"))?;
    anyhow::ensure!(value.is_object(), "--{label} must be a JSON object");
    Ok(value)
}
