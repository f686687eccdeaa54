//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Largest accepted UTC offset, in minutes (UTC+14:00 / UTC-14:00).
pub const MAX_TIMEZONE_OFFSET_MINUTES: i32 = 840;

/// Largest accepted default request TTL (ten years).
pub const MAX_REQUEST_TTL_HOURS: u32 = 87_600;

const VALID_RETURN_TARGETS: [&str; 3] = ["first_step", "same_step", "previous_step"];

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_engine(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_engine(config: &Config) -> ConfigResult<()> {
    let e = &config.engine;

    if e.timezone_offset_minutes.unsigned_abs() > MAX_TIMEZONE_OFFSET_MINUTES.unsigned_abs() {
        return Err(ConfigError::ValidationError {
            field: "engine.timezone_offset_minutes".to_owned(),
            message: format!(
                "offset {} is out of range; must be within ±{MAX_TIMEZONE_OFFSET_MINUTES} minutes",
                e.timezone_offset_minutes
            ),
        });
    }

    if e.default_request_ttl_hours > MAX_REQUEST_TTL_HOURS {
        return Err(ConfigError::ValidationError {
            field: "engine.default_request_ttl_hours".to_owned(),
            message: format!("ttl must be at most {MAX_REQUEST_TTL_HOURS} hours"),
        });
    }

    if !VALID_RETURN_TARGETS.contains(&e.return_target.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "engine.return_target".to_owned(),
            message: format!(
                "unsupported return target '{}'; expected one of: {}",
                e.return_target,
                VALID_RETURN_TARGETS.join(", ")
            ),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_timezone_bounds() {
        let mut config = Config::default();
        config.engine.timezone_offset_minutes = -840;
        assert!(validate(&config).is_ok());

        config.engine.timezone_offset_minutes = 841;
        assert_eq!(field_of(validate(&config)), "engine.timezone_offset_minutes");

        config.engine.timezone_offset_minutes = i32::MIN;
        assert_eq!(field_of(validate(&config)), "engine.timezone_offset_minutes");
    }

    #[test]
    fn test_ttl_bound() {
        let mut config = Config::default();
        config.engine.default_request_ttl_hours = MAX_REQUEST_TTL_HOURS;
        assert!(validate(&config).is_ok());
        config.engine.default_request_ttl_hours = 87_601;
        assert_eq!(field_of(validate(&config)), "engine.default_request_ttl_hours");
    }

    #[test]
    fn test_invalid_return_target() {
        let mut config = Config::default();
        config.engine.return_target = "last_step".to_owned();
        assert_eq!(field_of(validate(&config)), "engine.return_target");
    }

    #[test]
    fn test_invalid_log_level_and_format() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");

        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }
}
