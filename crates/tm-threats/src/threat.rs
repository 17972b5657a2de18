// threat.rs - Threat definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use tm_model::{ElementKind, TargetKind, ThreatModel};

use crate::condition::{Condition, Subject};
use crate::error::EvalError;

/// Qualitative severity label carried by a threat definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::VeryHigh => "very_high",
        };
        f.pad(s)
    }
}

/// A catalog-defined security concern with a machine-evaluable predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    /// Stable id, e.g. `AC12`.
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default)]
    pub severity: Severity,
    /// Default CVSS-style score (0.0 to 10.0) for matched findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Which kind of model entity this threat is evaluated against.
    pub target: TargetKind,
    /// Restricts element threats to these kinds. Empty means every kind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_kinds: Vec<ElementKind>,
    /// Written as nested single-key maps (`flag: {..}`, `all: [..]`).
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mitigations: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl Threat {
    /// Whether this threat applies to `subject`.
    ///
    /// Subjects of another target kind, and elements excluded by the kind
    /// filter, never match and are not evaluated.
    pub fn applies(&self, model: &ThreatModel, subject: Subject<'_>) -> Result<bool, EvalError> {
        if !self.considers(subject) {
            return Ok(false);
        }
        self.condition.evaluate(model, subject)
    }

    /// Whether `subject` passes the target-kind and element-kind filters.
    pub fn considers(&self, subject: Subject<'_>) -> bool {
        if subject.kind() != self.target {
            return false;
        }
        match subject {
            Subject::Element(e) => {
                self.element_kinds.is_empty() || self.element_kinds.contains(&e.kind)
            }
            _ => true,
        }
    }
}
