//! Conversion from `ringi_config::LoggingSection` to [`LogConfig`].

use ringi_config::LoggingSection;

use crate::error::TelemetryResult;
use crate::logging::{LogConfig, LogFormat};

impl TryFrom<&LoggingSection> for LogConfig {
    type Error = crate::error::TelemetryError;

    fn try_from(section: &LoggingSection) -> TelemetryResult<Self> {
        let format: LogFormat = section.format.parse()?;
        let mut config = LogConfig::new(section.level.clone()).with_format(format);
        config.directives.clone_from(&section.directives);
        Ok(config)
    }
}
