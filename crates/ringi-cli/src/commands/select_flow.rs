//! `ringi select-flow`: show which flow a submission would use.

use std::sync::Arc;

use anyhow::Result;
use ringi_approval::{ApprovalFlow, FlowSelector};
use ringi_config::Config;
use ringi_telemetry::EvaluationContext;
use serde_json::{Value, json};
use tracing::Instrument;

use crate::catalog;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// Select the flow of `flow_type` for `data` from the configured catalog.
pub(crate) async fn select(config: &Config, flow_type: &str, data: &Value) -> Result<Option<ApprovalFlow>> {
    let repository = catalog::flow_repository(&config.catalog)?;
    let selector = FlowSelector::new(Arc::new(repository));
    let eval = EvaluationContext::new("select_flow").with_business_code(flow_type);
    Ok(selector.select(flow_type, data).instrument(eval.span()).await?)
}

/// Run the command. Finding no flow is reported, not an error.
pub(crate) async fn run(
    config: &Config,
    flow_type: &str,
    data: &Value,
    format: OutputFormat,
) -> Result<()> {
    let selected = select(config, flow_type, data).await?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "flow_type": flow_type,
            "flow": selected,
        })),
        OutputFormat::Pretty => {
            match selected {
                Some(flow) => {
                    println!(
                        "{}",
                        Theme::success(&format!("{} \"{}\" (priority {})", flow.id, flow.name, flow.priority))
                    );
                    for step in &flow.approval_steps {
                        println!(
                            "  {}",
                            Theme::dimmed(&format!(
                                "step {}: {} ({:?}, {} approver entries)",
                                step.step,
                                step.name,
                                step.approval_type,
                                step.approvers.len()
                            ))
                        );
                    }
                },
                None => println!("{}", Theme::warning(&format!("no active {flow_type} flow matched"))),
            }
            Ok(())
        },
    }
}
