// catalog.rs - Indexed, immutable set of threat definitions.
//
// A catalog document (YAML or JSON) has one top-level key:
//
//   threats:
//     - id: DE01
//       description: Data in transit is not encrypted
//       target: dataflow
//       condition:
//         flag: { name: isEncrypted, value: false }
//
// The built-in rule set lives in `rules/builtin.yaml` and is embedded at
// compile time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tm_model::{controls, TargetKind};

use crate::error::CatalogError;
use crate::threat::Threat;

const BUILTIN_RULES: &str = include_str!("../rules/builtin.yaml");

#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    threats: Vec<Threat>,
}

/// Threat definitions indexed by id, iterated in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ThreatCatalog {
    threats: Vec<Threat>,
    index: HashMap<String, usize>,
}

impl ThreatCatalog {
    /// Build a catalog, validating every definition.
    pub fn new(threats: Vec<Threat>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(threats.len());
        for (pos, threat) in threats.iter().enumerate() {
            check_threat(threat)?;
            if index.insert(threat.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateThreatId(threat.id.clone()));
            }
        }
        tracing::debug!(threats = threats.len(), "threat catalog built");
        Ok(Self { threats, index })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_yaml::from_str(s)?;
        Self::new(doc.threats)
    }

    pub fn from_json_str(s: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(s)?;
        Self::new(doc.threats)
    }

    /// Load a catalog file, choosing the parser by extension.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let json = match ext.as_deref() {
            Some("yaml") | Some("yml") => false,
            Some("json") => true,
            _ => return Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        };
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = if json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        tracing::info!(path = %path.display(), threats = catalog.len(), "loaded threat catalog");
        Ok(catalog)
    }

    /// The embedded rule set for agent architectures.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_RULES)
    }

    /// Append another catalog's threats after this one's.
    ///
    /// Ids must stay unique across both; a collision is an error rather
    /// than a silent override.
    pub fn merge(self, other: ThreatCatalog) -> Result<Self, CatalogError> {
        let mut threats = self.threats;
        threats.extend(other.threats);
        Self::new(threats)
    }

    pub fn get(&self, id: &str) -> Option<&Threat> {
        self.index.get(id).map(|&pos| &self.threats[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threat> {
        self.threats.iter()
    }

    /// Threats evaluated against targets of `kind`.
    pub fn for_kind(&self, kind: TargetKind) -> impl Iterator<Item = &Threat> {
        self.threats.iter().filter(move |t| t.target == kind)
    }

    pub fn len(&self) -> usize {
        self.threats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threats.is_empty()
    }
}

fn check_threat(threat: &Threat) -> Result<(), CatalogError> {
    for flag in threat.condition.referenced_flags() {
        if controls::lookup(flag).is_none() {
            return Err(CatalogError::UnknownFlag {
                threat: threat.id.clone(),
                flag: flag.to_string(),
            });
        }
    }
    if let Some(score) = threat.score {
        if !(0.0..=10.0).contains(&score) {
            return Err(CatalogError::InvalidScore {
                threat: threat.id.clone(),
                score,
            });
        }
    }
    if !threat.element_kinds.is_empty() && threat.target != TargetKind::Element {
        return Err(CatalogError::KindFilterOnNonElement {
            threat: threat.id.clone(),
            target: threat.target,
        });
    }
    Ok(())
}
