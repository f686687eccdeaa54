//! `ringi validate`: load, decode and validate the configured catalogs.

use anyhow::Result;
use ringi_config::Config;
use serde_json::{Value, json};

use crate::catalog;
use crate::config_bridge;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// Validate the configuration and every configured catalog.
///
/// Unconfigured catalogs are skipped; a configured but broken one fails.
pub(crate) fn check(config: &Config) -> Result<Value> {
    let settings = config_bridge::engine_settings(config)?;

    let policies = match &config.catalog.policies {
        Some(_) => Some(catalog::policy_repository(&config.catalog)?.len()),
        None => None,
    };
    let flows = match &config.catalog.flows {
        Some(_) => Some(catalog::flow_repository(&config.catalog)?.len()),
        None => None,
    };

    Ok(json!({
        "timezone_offset_seconds": settings.timezone_offset.local_minus_utc(),
        "default_request_ttl_hours": settings.default_request_ttl_hours,
        "default_return_target": settings.default_return_target.as_str(),
        "policies": policies,
        "flows": flows,
    }))
}

/// Run the command.
pub(crate) fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let report = check(config)?;
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Pretty => {
            println!("{}", Theme::header("Ringi catalog validation"));
            println!("{}", Theme::separator());
            for (key, label) in [("policies", "policy"), ("flows", "flow")] {
                match report[key].as_u64() {
                    Some(n) => println!("{}", Theme::success(&format!("{n} {label} record(s) valid"))),
                    None => println!("{}", Theme::warning(&format!("no {label} catalog configured"))),
                }
            }
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringi_test::{TestCatalog, estimate_flows, estimate_policies};

    #[test]
    fn test_check_reports_counts() {
        let catalog = TestCatalog::write(&estimate_policies(), &estimate_flows());
        let mut config = Config::default();
        config.catalog.policies = Some(catalog.policies.clone());
        config.catalog.flows = Some(catalog.flows.clone());

        let report = check(&config).unwrap();
        assert_eq!(report["policies"], 3);
        assert_eq!(report["flows"], 2);
        assert_eq!(report["default_return_target"], "first_step");
    }

    #[test]
    fn test_check_without_catalogs() {
        let report = check(&Config::default()).unwrap();
        assert!(report["policies"].is_null());
        assert!(report["flows"].is_null());
    }

    #[test]
    fn test_check_fails_on_broken_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut config = Config::default();
        config.catalog.policies = Some(path);
        assert!(check(&config).is_err());
    }
}
