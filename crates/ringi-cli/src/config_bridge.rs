//! Bridge from `ringi_config::Config` to engine and logging types.

use anyhow::{Context as _, Result};
use ringi_approval::{EngineSettings, ReturnTarget};
use ringi_config::Config;
use ringi_telemetry::{LogConfig, LogFormat};

/// Engine settings from the `[engine]` section.
pub(crate) fn engine_settings(config: &Config) -> Result<EngineSettings> {
    let target: ReturnTarget = config
        .engine
        .return_target
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let settings = EngineSettings::default()
        .with_timezone_offset_minutes(config.engine.timezone_offset_minutes)?
        .with_default_ttl_hours(config.engine.default_request_ttl_hours)?
        .with_return_target(target);
    Ok(settings)
}

/// Log configuration from the `[logging]` section, raised to `debug` when
/// `verbose` is set.
pub(crate) fn log_config(config: &Config, verbose: bool) -> Result<LogConfig> {
    let mut lc = LogConfig::try_from(&config.logging).context("invalid [logging] section")?;
    if verbose {
        "debug".clone_into(&mut lc.level);
    }
    Ok(lc)
}

/// Logging used when the configuration itself failed to load.
pub(crate) fn fallback_log_config(verbose: bool) -> LogConfig {
    let level = if verbose { "debug" } else { "warn" };
    LogConfig::new(level).with_format(LogFormat::Compact)
}
