// threats.rs - Threat catalog subcommands: list, show.

use std::path::PathBuf;

use clap::Subcommand;
use tm_model::TargetKind;

use crate::commands::{load_catalog, truncate};
use crate::config::TmConfig;

#[derive(Subcommand)]
pub enum ThreatsCommands {
    /// List all threats in the catalog.
    List {
        /// Only threats evaluated against this target kind.
        #[arg(long)]
        target: Option<String>,
        /// Extra threat catalog files.
        #[arg(long = "catalog")]
        catalogs: Vec<PathBuf>,
    },
    /// Show one threat in full.
    Show {
        /// Threat id (e.g. DE01).
        id: String,
        /// Extra threat catalog files.
        #[arg(long = "catalog")]
        catalogs: Vec<PathBuf>,
    },
}

pub fn execute(cmd: &ThreatsCommands, config: &TmConfig) -> anyhow::Result<()> {
    match cmd {
        ThreatsCommands::List { target, catalogs } => {
            let catalog = load_catalog(config, catalogs)?;
            let kind = target.as_deref().map(parse_target_kind).transpose()?;

            println!(
                "{:<8} {:<10} {:<10} {:>5}  DESCRIPTION",
                "ID", "TARGET", "SEVERITY", "SCORE"
            );
            println!("{}", "-".repeat(90));
            let mut shown = 0;
            for threat in catalog.iter().filter(|t| kind.map_or(true, |k| t.target == k)) {
                let score = threat
                    .score
                    .map(|s| format!("{:.1}", s))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:<10} {:<10} {:>5}  {}",
                    threat.id,
                    threat.target,
                    threat.severity,
                    score,
                    truncate(&threat.description, 60),
                );
                shown += 1;
            }
            println!();
            println!("{} threat(s).", shown);
        }

        ThreatsCommands::Show { id, catalogs } => {
            let catalog = load_catalog(config, catalogs)?;
            let threat = catalog
                .get(id)
                .ok_or_else(|| anyhow::anyhow!("Threat not found: {}", id))?;

            println!("{}  {}", threat.id, threat.description);
            println!();
            println!("Target:      {}", threat.target);
            if !threat.element_kinds.is_empty() {
                let kinds: Vec<String> =
                    threat.element_kinds.iter().map(|k| k.to_string()).collect();
                println!("Kinds:       {}", kinds.join(", "));
            }
            println!("Severity:    {}", threat.severity);
            if let Some(score) = threat.score {
                println!("Score:       {:.1}", score);
            }
            println!("Condition:   {}", threat.condition);
            if !threat.details.is_empty() {
                println!();
                println!("{}", threat.details.trim());
            }
            if !threat.mitigations.is_empty() {
                println!();
                println!("Mitigations: {}", threat.mitigations.trim());
            }
            for reference in &threat.references {
                println!("Reference:   {}", reference);
            }
        }
    }

    Ok(())
}

fn parse_target_kind(s: &str) -> anyhow::Result<TargetKind> {
    match s.to_lowercase().as_str() {
        "element" => Ok(TargetKind::Element),
        "dataflow" | "flow" => Ok(TargetKind::Dataflow),
        "boundary" => Ok(TargetKind::Boundary),
        _ => anyhow::bail!(
            "Invalid target kind: '{}'. Valid kinds: element, dataflow, boundary",
            s
        ),
    }
}
