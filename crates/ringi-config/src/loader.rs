//! Config file discovery and layered loading.
//!
//! Implements [`load`]:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/ringi/config.toml` (system)
//! 3. Merge `~/.ringi/config.toml` (user)
//! 4. Merge the caller's explicit file, if any
//! 5. Apply env var fallbacks for fields no file set
//! 6. Deserialize the merged tree → [`Config`]
//! 7. Validate

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

const SYSTEM_CONFIG_PATH: &str = "/etc/ringi/config.toml";

/// Where [`load`] looks for files.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit file, merged above the user layer. Must exist.
    pub explicit: Option<PathBuf>,
    /// Replaces the discovered home directory; the user file is read from
    /// `{home}/.ringi/config.toml`.
    pub home_override: Option<PathBuf>,
    /// Skip `/etc/ringi/config.toml`.
    pub skip_system: bool,
}

/// Load the configuration with layered file precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is unreadable or malformed,
/// if the explicit file is missing, or if the merged configuration fails
/// validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();
    load_with_env(options, &env_vars)
}

/// [`load`] with an explicit environment, for tests and embedding.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    options: &LoadOptions,
    env_vars: &std::collections::HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // 2. System.
    if !options.skip_system {
        let system_path = PathBuf::from(SYSTEM_CONFIG_PATH);
        if let Some(overlay) = try_load_file(&system_path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::System, &mut field_sources);
            loaded_files.push(system_path.display().to_string());
            info!(path = %system_path.display(), "loaded system config");
        }
    }

    // 3. User.
    let home = match &options.home_override {
        Some(h) => h.clone(),
        None => home_directory()?,
    };
    let user_path = home.join(".ringi").join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut field_sources);
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    // 4. Explicit file; unlike the discovered layers it must exist.
    if let Some(path) = &options.explicit {
        let overlay = read_file(path)?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit(path.clone()),
            &mut field_sources,
        );
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config file");
    }

    // 5. Env fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 6. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 7. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a single file on top of the defaults (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let overlay = read_file(path)?;
    let mut sources = FieldSources::new();
    deep_merge_tracking(
        &mut merged,
        &overlay,
        "",
        &ConfigLayer::Explicit(path.to_path_buf()),
        &mut sources,
    );
    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if it doesn't exist.
///
/// A single read avoids racing a separate existence check.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_content(path, &content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            Ok(None)
        },
        Err(e) => Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_content(path, &content)
}

fn parse_content(path: &Path, content: &str) -> ConfigResult<toml::Value> {
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn options(home: &Path, explicit: Option<PathBuf>) -> LoadOptions {
        LoadOptions {
            explicit,
            home_override: Some(home.to_path_buf()),
            skip_system: true,
        }
    }

    fn write_user_config(home: &Path, body: &str) {
        let dir = home.join(".ringi");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), body).unwrap();
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_defaults_only() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load_with_env(&options(home.path(), None), &HashMap::new()).unwrap();

        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("engine.timezone_offset_minutes"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_precedence_user_then_explicit_then_env() {
        let home = tempfile::tempdir().unwrap();
        write_user_config(
            home.path(),
            "[engine]\ntimezone_offset_minutes = 0\nreturn_target = \"same_step\"\n",
        );
        let explicit = home.path().join("ringi.toml");
        std::fs::write(&explicit, "[engine]\nreturn_target = \"previous_step\"\n").unwrap();

        let env: HashMap<String, String> = [
            ("RINGI_TIMEZONE_OFFSET_MINUTES".to_owned(), "60".to_owned()),
            ("RINGI_LOG_FORMAT".to_owned(), "json".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_with_env(&options(home.path(), Some(explicit.clone())), &env).unwrap();
        let config = &resolved.config;

        // User file wins over the env fallback.
        assert_eq!(config.engine.timezone_offset_minutes, 0);
        assert_eq!(config.engine.return_target, "previous_step");
        assert_eq!(config.logging.format, "json");
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("engine.return_target"),
            Some(&ConfigLayer::Explicit(explicit))
        );
        assert_eq!(
            resolved.field_sources.get("logging.format"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let result = load_with_env(
            &options(home.path(), Some(home.path().join("absent.toml"))),
            &HashMap::new(),
        );
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_merged_config_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        write_user_config(home.path(), "[logging]\nlevel = \"loud\"\n");
        let result = load_with_env(&options(home.path(), None), &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let home = tempfile::tempdir().unwrap();
        write_user_config(home.path(), "[engine\n");
        let result = load_with_env(&options(home.path(), None), &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_file_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ringi.toml");
        std::fs::write(&path, "[catalog]\nflows = \"flows.json\"\n").unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.catalog.flows, Some(PathBuf::from("flows.json")));
        assert_eq!(config.engine.timezone_offset_minutes, 540);
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/ringi.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_try_load_file_missing() {
        assert!(try_load_file(Path::new("/nonexistent/config.toml")).unwrap().is_none());
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
