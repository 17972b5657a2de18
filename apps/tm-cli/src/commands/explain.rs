// explain.rs - `tm explain`: trace one threat against one target.

use std::path::Path;

use tm_engine::{explain, MatchTrace};
use tm_model::ThreatModel;

use crate::commands::{load_catalog, load_model};
use crate::config::{OutputFormat, TmConfig};

pub fn execute(
    config: &TmConfig,
    model_path: &Path,
    threat_id: &str,
    target_id: &str,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let catalog = load_catalog(config, &[])?;
    let (model, _) = load_model(model_path)?;

    let threat = catalog
        .get(threat_id)
        .ok_or_else(|| anyhow::anyhow!("Threat not found: {}", threat_id))?;
    let target = model.resolve_target(target_id).ok_or_else(|| {
        anyhow::anyhow!(
            "No boundary, element or dataflow '{}' in {}",
            target_id,
            model.name()
        )
    })?;

    let trace = explain(&model, threat, &target)?;
    match format.unwrap_or(config.output.format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trace)?),
        OutputFormat::Table => print_trace(&model, &trace),
    }
    Ok(())
}

fn print_trace(model: &ThreatModel, trace: &MatchTrace) {
    let label = model.target_label(&trace.target).unwrap_or(trace.target.id.as_str());
    println!(
        "{} on {} '{}' ({})",
        trace.threat_id, trace.target.kind, trace.target.id, label
    );
    println!();

    for (i, step) in trace.steps.iter().enumerate() {
        let marker = if step.terminal { " <- decided" } else { "" };
        println!("  {}. {:<14} {}{}", i + 1, step.check, step.outcome, marker);
    }

    if !trace.leaves.is_empty() {
        println!();
        println!("  {:<48} {:<20} RESULT", "TEST", "ACTUAL");
        println!("  {}", "-".repeat(76));
        for leaf in &trace.leaves {
            println!(
                "  {:<48} {:<20} {}",
                leaf.check,
                leaf.actual,
                if leaf.outcome { "true" } else { "false" }
            );
        }
    }

    println!();
    if trace.matched {
        println!("Result: MATCHED");
    } else {
        println!("Result: not matched");
    }
}
