//! `ringi decide`: dry-run a policy decision.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use ringi_config::Config;
use ringi_core::{Clock, Context, SystemClock};
use ringi_policy::{Decision, PolicyResolver};
use ringi_telemetry::EvaluationContext;
use serde_json::{Value, json};
use tracing::Instrument;

use crate::catalog;
use crate::config_bridge;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// What to decide.
#[derive(Debug, Clone)]
pub(crate) struct DecideArgs {
    pub(crate) business_code: String,
    pub(crate) action: String,
    pub(crate) resource_type: String,
    pub(crate) user: Value,
    pub(crate) data: Value,
    pub(crate) request: Value,
    /// Evaluation instant; the system clock when absent.
    pub(crate) at: Option<DateTime<Utc>>,
}

/// Evaluate the configured policy catalog for `args`.
pub(crate) async fn decide(config: &Config, args: &DecideArgs) -> Result<Decision> {
    let settings = config_bridge::engine_settings(config)?;
    let repository = catalog::policy_repository(&config.catalog)?;
    let resolver = PolicyResolver::new(Arc::new(repository));

    let now = args.at.unwrap_or_else(|| SystemClock.now());
    let ctx = Context::builder()
        .user_value(args.user.clone())
        .data(args.data.clone())
        .request(args.request.clone())
        .at(now, settings.timezone_offset)
        .build();

    let eval = EvaluationContext::new("decide").with_business_code(&args.business_code);
    let decision = resolver
        .explain(&args.business_code, &args.action, &args.resource_type, &ctx)
        .instrument(eval.span())
        .await?;
    tracing::debug!(
        correlation_id = %eval.correlation_id,
        elapsed_ms = eval.elapsed_ms(),
        effect = %decision.effect,
        "decision complete"
    );
    Ok(decision)
}

/// Run the command and print the decision.
pub(crate) async fn run(config: &Config, args: &DecideArgs, format: OutputFormat) -> Result<()> {
    let decision = decide(config, args).await?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "business_code": args.business_code,
            "action": args.action,
            "resource_type": args.resource_type,
            "decision": decision,
        })),
        OutputFormat::Pretty => {
            let effect = if decision.is_allowed() {
                "ALLOW".green().bold()
            } else {
                "DENY".red().bold()
            };
            println!(
                "{} {}/{}/{}",
                effect, args.business_code, args.action, args.resource_type
            );
            match decision.matched_policy {
                Some(id) => println!("  matched {id}"),
                None => println!("  {}", Theme::dimmed("no policy matched (default deny)")),
            }
            println!(
                "  {}",
                Theme::dimmed(&format!("{} policies evaluated", decision.evaluated))
            );
            Ok(())
        },
    }
}
