// model.rs - Model inspection subcommands.

use std::path::PathBuf;

use clap::Subcommand;
use tm_model::{Controls, Element, ThreatModel};

use crate::commands::load_model;
use crate::config::{OutputFormat, TmConfig};

#[derive(Subcommand)]
pub enum ModelCommands {
    /// Print boundaries, elements and dataflows of a model definition.
    Show {
        /// Model definition file (yaml, yml or json).
        file: PathBuf,
        /// Output format: table or json.
        #[arg(long)]
        format: Option<OutputFormat>,
    },
}

pub fn execute(cmd: &ModelCommands, config: &TmConfig) -> anyhow::Result<()> {
    match cmd {
        ModelCommands::Show { file, format } => {
            let (model, overrides) = load_model(file)?;
            match format.unwrap_or(config.output.format) {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&model.snapshot())?);
                }
                OutputFormat::Table => {
                    print_model(&model);
                    if !overrides.is_empty() {
                        println!();
                        println!("{} override(s) declared.", overrides.len());
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_model(model: &ThreatModel) {
    println!("Model: {}", model.name());
    if !model.description().is_empty() {
        println!("{}", model.description().trim());
    }

    for boundary in model.boundaries() {
        println!();
        println!("[{}] {}{}", boundary.id, boundary.name, controls_suffix(&boundary.controls));
        for element in model.elements_in(&boundary.id) {
            print_element(element);
        }
    }

    let loose: Vec<&Element> = model.unbounded_elements().collect();
    if !loose.is_empty() {
        println!();
        println!("(no boundary)");
        for element in loose {
            print_element(element);
        }
    }

    if !model.dataflows().is_empty() {
        println!();
        println!("Dataflows:");
        for flow in model.dataflows() {
            let marker = if model.crosses_boundary(flow) { " *" } else { "" };
            println!(
                "  {:<20} -> {:<20} {}{}{}",
                flow.source,
                flow.destination,
                flow.label,
                marker,
                controls_suffix(&flow.controls)
            );
        }
        println!();
        println!("* crosses a trust boundary");
    }
}

fn print_element(element: &Element) {
    println!(
        "  {:<20} {:<10} {}{}",
        element.id,
        element.kind,
        element.name,
        controls_suffix(&element.controls)
    );
}

/// Explicitly set controls, e.g. ` {isEncrypted=true, protocol=HTTPS}`.
fn controls_suffix(controls: &Controls) -> String {
    if controls.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = controls
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    format!(" {{{}}}", pairs.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_model::{ElementSpec, ModelBuilder};

    #[test]
    fn controls_suffix_lists_explicit_values_only() {
        let mut b = ModelBuilder::new("m");
        let bare = b.add_element(ElementSpec::server("bare")).unwrap();
        let set = b
            .add_element(ElementSpec::server("set").control("isHardened", true))
            .unwrap();
        let m = b.build();
        assert_eq!(controls_suffix(&m.element(&bare).unwrap().controls), "");
        assert_eq!(
            controls_suffix(&m.element(&set).unwrap().controls),
            " {isHardened=true}"
        );
    }
}
