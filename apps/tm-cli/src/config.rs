// config.rs - tm.toml configuration.
//
// Every section and field is optional; a missing file means all defaults:
//
//   [catalog]
//   include_builtin = true
//   paths = ["rules/custom.yaml"]
//
//   [output]
//   format = "table"
//   show_mitigated = true
//
//   [policy]
//   fail_on_unmitigated = false
//
// Relative catalog paths are resolved against the project root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Invalid output format: '{}'. Valid formats: table, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Top-level configuration from tm.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    /// Project root used to resolve relative paths. Not read from the file.
    #[serde(skip)]
    pub root: PathBuf,
}

/// Which threat definitions to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Start from the embedded rule set.
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,

    /// Extra catalog files (yaml/yml/json), merged in order.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            include_builtin: default_include_builtin(),
            paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default format when `--format` is not given.
    #[serde(default)]
    pub format: OutputFormat,

    /// List mitigated, accepted and rejected findings in tables.
    #[serde(default = "default_show_mitigated")]
    pub show_mitigated: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            show_mitigated: default_show_mitigated(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Exit non-zero when `process` leaves unmitigated findings.
    #[serde(default)]
    pub fail_on_unmitigated: bool,
}

// Serde default functions
fn default_include_builtin() -> bool {
    true
}

fn default_show_mitigated() -> bool {
    true
}

impl TmConfig {
    pub fn default_path(project_root: &Path) -> PathBuf {
        project_root.join("tm.toml")
    }

    /// Load config from a tm.toml file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Load config, returning defaults if the file doesn't exist.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.root = root.to_path_buf();
        self
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TmConfig::load_or_default(&dir.path().join("tm.toml")).unwrap();
        assert!(config.catalog.include_builtin);
        assert!(config.catalog.paths.is_empty());
        assert_eq!(config.output.format, OutputFormat::Table);
        assert!(config.output.show_mitigated);
        assert!(!config.policy.fail_on_unmitigated);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tm.toml");
        std::fs::write(
            &path,
            "[output]\nformat = \"json\"\n\n[policy]\nfail_on_unmitigated = true\n",
        )
        .unwrap();
        let config = TmConfig::load_or_default(&path).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.show_mitigated);
        assert!(config.policy.fail_on_unmitigated);
        assert!(config.catalog.include_builtin);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tm.toml");
        std::fs::write(&path, "[output]\nformat = \"pdf\"\n").unwrap();
        assert!(TmConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let config = TmConfig::default().rooted_at(Path::new("/work"));
        assert_eq!(
            config.resolve(Path::new("rules/extra.yaml")),
            PathBuf::from("/work/rules/extra.yaml")
        );
        assert_eq!(
            config.resolve(Path::new("/abs/extra.yaml")),
            PathBuf::from("/abs/extra.yaml")
        );
    }

    #[test]
    fn output_format_parses() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("html".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Table.to_string(), "table");
    }
}
