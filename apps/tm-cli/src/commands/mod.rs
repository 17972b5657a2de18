// mod.rs - Subcommands and the helpers they share.

pub mod explain;
pub mod model;
pub mod process;
pub mod threats;

use std::path::{Path, PathBuf};

use tm_engine::{ModelDefinition, OverrideStore};
use tm_model::ThreatModel;
use tm_threats::ThreatCatalog;

use crate::config::TmConfig;

/// Build the catalog: the embedded rules (unless disabled), then configured
/// files, then files given on the command line.
pub fn load_catalog(config: &TmConfig, extra: &[PathBuf]) -> anyhow::Result<ThreatCatalog> {
    let mut catalog = if config.catalog.include_builtin {
        ThreatCatalog::builtin()?
    } else {
        ThreatCatalog::empty()
    };
    let configured = config.catalog.paths.iter().map(|p| config.resolve(p));
    for path in configured.chain(extra.iter().cloned()) {
        let more = ThreatCatalog::load(&path)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        catalog = catalog.merge(more)?;
    }
    if catalog.is_empty() {
        tracing::warn!("threat catalog is empty; no findings will be produced");
    }
    Ok(catalog)
}

/// Load a model definition file into a frozen model and its overrides.
pub fn load_model(path: &Path) -> anyhow::Result<(ThreatModel, OverrideStore)> {
    let definition = ModelDefinition::load(path)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    let loaded = definition
        .into_model()
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    Ok(loaded)
}

/// Expand file arguments and glob patterns into a sorted, de-duplicated
/// list of files. A pattern that matches nothing is an error.
pub fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !is_pattern(input) {
            files.push(PathBuf::from(input));
            continue;
        }
        let mut matched: Vec<PathBuf> = glob::glob(input)
            .map_err(|e| anyhow::anyhow!("Invalid pattern '{}': {}", input, e))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            anyhow::bail!("No model files match '{}'", input);
        }
        matched.sort();
        files.extend(matched);
    }
    let mut seen = std::collections::HashSet::new();
    files.retain(|p| seen.insert(p.clone()));
    Ok(files)
}

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Truncate to `width` characters for table cells.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
