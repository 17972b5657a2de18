//! # tm-cli
//!
//! Command-line driver for agent threat models.
//!
//! - `tm process <models...>` - build, match, reconcile and print findings
//! - `tm threats list/show` - inspect the threat catalog
//! - `tm model show <file>` - print a model's boundaries, elements and flows
//! - `tm explain <file> <threat> <target>` - trace one match decision
//!
//! Any configuration error (bad model, bad catalog, bad override) ends the
//! run with a non-zero exit.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{OutputFormat, TmConfig};

/// Threat modeling for AI-agent data-flow diagrams.
#[derive(Parser)]
#[command(name = "tm", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Config file (defaults to <project_root>/tm.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more model definitions.
    Process {
        /// Model files or glob patterns (yaml, yml or json).
        #[arg(required = true)]
        models: Vec<String>,
        /// Output format: table or json.
        #[arg(long)]
        format: Option<OutputFormat>,
        /// Extra threat catalog files merged over the configured ones.
        #[arg(long = "catalog")]
        catalogs: Vec<PathBuf>,
    },
    /// Inspect the threat catalog.
    Threats {
        #[command(subcommand)]
        command: commands::threats::ThreatsCommands,
    },
    /// Inspect a model definition.
    Model {
        #[command(subcommand)]
        command: commands::model::ModelCommands,
    },
    /// Explain why a threat did or did not match a target.
    Explain {
        /// Model definition file.
        model: PathBuf,
        /// Threat id (e.g. AC12).
        threat: String,
        /// Boundary, element or dataflow id.
        target: String,
        /// Output format: table or json.
        #[arg(long)]
        format: Option<OutputFormat>,
    },
}

/// Log filter used when `RUST_LOG` is unset or empty.
const DEFAULT_LOG_FILTER: &str = "tm_engine=info,tm_threats=info,tm=info";

/// `RUST_LOG` replaces the defaults entirely when it parses.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|e| {
            eprintln!("ignoring invalid RUST_LOG '{}': {}", directives, e);
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config_path = cli
        .config
        .unwrap_or_else(|| TmConfig::default_path(&project_root));
    let config = TmConfig::load_or_default(&config_path)?.rooted_at(&project_root);

    match &cli.command {
        Commands::Process {
            models,
            format,
            catalogs,
        } => commands::process::execute(&config, models, *format, catalogs),
        Commands::Threats { command } => commands::threats::execute(command, &config),
        Commands::Model { command } => commands::model::execute(command, &config),
        Commands::Explain {
            model,
            threat,
            target,
            format,
        } => commands::explain::execute(&config, model, threat, target, *format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_default_directives() {
        let filter = log_filter(Some("tm_engine=debug")).to_string();
        assert!(filter.contains("tm_engine=debug"), "{}", filter);
        assert!(!filter.contains("tm_engine=info"), "{}", filter);
    }

    #[test]
    fn defaults_apply_without_rust_log() {
        for unset in [None, Some(""), Some("  ")] {
            let filter = log_filter(unset).to_string();
            assert!(filter.contains("tm_engine=info"), "{}", filter);
            assert!(filter.contains("tm=info"), "{}", filter);
        }
    }
}
