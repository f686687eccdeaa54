//! Source-annotated display for `ringi config show`.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration together with source annotations.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config file paths that were loaded, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with inline comments naming each value's source.
    Toml,
    /// JSON, for programmatic consumption.
    Json,
}

impl ResolvedConfig {
    /// Render the configuration, optionally restricted to one section.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or `section` does not exist.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(section),
            ShowFormat::Json => self.show_json(section),
        }
    }

    fn section_value(&self, name: &str) -> Result<toml::Value, fmt::Error> {
        let val = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        val.as_table()
            .and_then(|t| t.get(name))
            .cloned()
            .ok_or(fmt::Error)
    }

    fn show_toml(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let toml_str = match section {
            Some(name) => toml::to_string_pretty(&self.section_value(name)?).map_err(|_| fmt::Error)?,
            None => toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?,
        };

        let mut output = String::new();
        output.push_str("# Resolved Ringi configuration\n");
        output.push_str("# Source annotations: [defaults] [system] [user] [file] [env]\n");

        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                writeln!(output, "#   {}. {path}", i.saturating_add(1))?;
            }
        }
        output.push('\n');

        // Section headers reset the prefix so keys map back to dotted paths.
        let mut prefix = section.unwrap_or("").to_owned();
        for line in toml_str.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                prefix = match section {
                    Some(s) => format!("{s}.{header}"),
                    None => header.to_owned(),
                };
            }
            match self.annotate_line(trimmed, &prefix) {
                Some(annotation) => writeln!(output, "{line}  # {annotation}")?,
                None => writeln!(output, "{line}")?,
            }
        }

        Ok(output)
    }

    fn show_json(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        match section {
            Some(name) => serde_json::to_string_pretty(&self.section_value(name)?),
            None => serde_json::to_string_pretty(&self.config),
        }
        .map_err(|_| fmt::Error)
    }

    fn annotate_line(&self, trimmed: &str, prefix: &str) -> Option<String> {
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let key = trimmed.split('=').next()?.trim();
        let field_path = if prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{prefix}.{key}")
        };
        self.field_sources
            .get(&field_path)
            .map(|layer| format!("[{layer}]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("engine.timezone_offset_minutes".to_owned(), ConfigLayer::Defaults);
        field_sources.insert("logging.level".to_owned(), ConfigLayer::Environment);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/etc/ringi/config.toml".to_owned()],
        }
    }

    #[test]
    fn test_show_toml_annotates_sources() {
        let out = resolved().show(ShowFormat::Toml, None).unwrap();
        assert!(out.contains("# Resolved Ringi configuration"));
        assert!(out.contains("1. /etc/ringi/config.toml"));
        assert!(out.contains("timezone_offset_minutes = 540  # [defaults]"));
        assert!(out.contains("level = \"info\"  # [environment variable]"));
    }

    #[test]
    fn test_show_json_section() {
        let out = resolved().show(ShowFormat::Json, Some("engine")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["return_target"], "first_step");
        assert!(value.get("level").is_none());
    }

    #[test]
    fn test_unknown_section_is_an_error() {
        assert!(resolved().show(ShowFormat::Toml, Some("nope")).is_err());
    }
}
