//! Ringi CLI - inspect and dry-run policy and approval-flow catalogs.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod catalog;
mod commands;
mod config_bridge;
mod formatter;
mod theme;

use commands::decide::DecideArgs;
use formatter::OutputFormat;
use theme::Theme;

/// Ringi - policy decisions and approval flows
#[derive(Parser)]
#[command(name = "ringi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    /// Configuration file merged above the user config
    #[arg(short, long, global = true, env = "RINGI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configured policy and flow catalogs
    Validate,

    /// Decide whether an action is allowed
    Decide {
        /// Business area, e.g. estimate
        business_code: String,
        /// Action, e.g. approve
        action: String,
        /// Resource type, e.g. estimate
        resource_type: String,
        /// Acting user as a JSON object
        #[arg(long)]
        user: Option<String>,
        /// Target data as a JSON object
        #[arg(long)]
        data: Option<String>,
        /// Request metadata as a JSON object
        #[arg(long)]
        request: Option<String>,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Show which flow a submission would use
    SelectFlow {
        /// Flow type, e.g. estimate
        flow_type: String,
        /// Submitted data as a JSON object
        #[arg(long)]
        data: Option<String>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only a specific section (engine, catalog, logging)
        #[arg(short, long)]
        section: Option<String>,
    },
}

fn parse_instant(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("--at '{s}' is not an RFC 3339 instant"))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = ringi_config::Config::load(cli.config.as_deref());

    let log_config = match &resolved {
        Ok(r) => config_bridge::log_config(&r.config, cli.verbose)?,
        Err(_) => config_bridge::fallback_log_config(cli.verbose),
    };
    if let Err(e) = ringi_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let resolved = match resolved {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("configuration error: {e}")));
            std::process::exit(2);
        },
    };

    let format: OutputFormat = cli.format.parse().map_err(anyhow::Error::msg)?;
    let config = &resolved.config;

    let outcome = match cli.command {
        Commands::Validate => commands::validate::run(config, format),
        Commands::Decide {
            business_code,
            action,
            resource_type,
            user,
            data,
            request,
            at,
        } => {
            let args = DecideArgs {
                business_code,
                action,
                resource_type,
                user: commands::parse_object("user", user.as_deref())?,
                data: commands::parse_object("data", data.as_deref())?,
                request: commands::parse_object("request", request.as_deref())?,
                at: parse_instant(at.as_deref())?,
            };
            commands::decide::run(config, &args, format).await
        },
        Commands::SelectFlow { flow_type, data } => {
            let data = commands::parse_object("data", data.as_deref())?;
            commands::select_flow::run(config, &flow_type, &data, format).await
        },
        Commands::Config {
            command: ConfigCommands::Show { format, section },
        } => commands::config::show(&resolved, &format, section.as_deref()),
    };

    if let Err(e) = outcome {
        eprintln!("{}", Theme::error(&format!("{e:#}")));
        std::process::exit(1);
    }
    Ok(())
}
