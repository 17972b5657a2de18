// overrides.rs - Human-supplied overrides and their reconciliation with
// automatic candidates.
//
// Overrides live in their own store keyed by (target, threat id), never on
// the model entities, so reconciliation can be exercised without building a
// graph. At most one override is active per key: a later `add` for the same
// key replaces the earlier one, and the replacement is logged and kept as a
// diagnostic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tm_model::{TargetRef, ThreatModel};
use tm_threats::ThreatCatalog;

use crate::error::EngineError;
use crate::finding::{Finding, Origin, Response};

/// A manual disposition of one threat on one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Caller-chosen finding id (e.g. `F-AE-01`). When absent the final
    /// finding keeps the deterministic `threat:target` id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub target: TargetRef,
    pub threat_id: String,
    pub response: Response,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Override {
    pub fn new(target: TargetRef, threat_id: impl Into<String>, response: Response) -> Self {
        Self {
            id: None,
            target,
            threat_id: threat_id.into(),
            response,
            severity: None,
            notes: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_severity(mut self, severity: f32) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn key(&self) -> (TargetRef, String) {
        (self.target.clone(), self.threat_id.clone())
    }

    fn finding_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| Finding::candidate_id(&self.threat_id, &self.target))
    }
}

/// Active overrides in first-declaration order.
#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    overrides: Vec<Override>,
    index: HashMap<(TargetRef, String), usize>,
    diagnostics: Vec<String>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an override, returning the one it replaced, if any.
    ///
    /// A replacement keeps the earlier override's position.
    pub fn add(&mut self, ov: Override) -> Option<Override> {
        match self.index.get(&ov.key()) {
            Some(&pos) => {
                let message = format!(
                    "override for threat '{}' on {} replaced: {} -> {}",
                    ov.threat_id, ov.target, self.overrides[pos].response, ov.response
                );
                tracing::warn!(
                    threat = %ov.threat_id,
                    target = %ov.target,
                    previous = %self.overrides[pos].response,
                    response = %ov.response,
                    "override replaced by a later declaration"
                );
                self.diagnostics.push(message);
                Some(std::mem::replace(&mut self.overrides[pos], ov))
            }
            None => {
                self.index.insert(ov.key(), self.overrides.len());
                self.overrides.push(ov);
                None
            }
        }
    }

    pub fn get(&self, target: &TargetRef, threat_id: &str) -> Option<&Override> {
        self.index
            .get(&(target.clone(), threat_id.to_string()))
            .map(|&pos| &self.overrides[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Override> {
        self.overrides.iter()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Replacement notices, in the order they happened.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Check every override against the catalog and the model.
    ///
    /// The target must exist and be of the kind the threat is evaluated
    /// against.
    pub fn validate(&self, model: &ThreatModel, catalog: &ThreatCatalog) -> Result<(), EngineError> {
        for ov in &self.overrides {
            let threat = catalog.get(&ov.threat_id).ok_or_else(|| {
                EngineError::UnknownOverrideThreat {
                    threat: ov.threat_id.clone(),
                    target: ov.target.clone(),
                }
            })?;
            if !model.contains_target(&ov.target) {
                return Err(EngineError::UnknownOverrideTarget {
                    threat: ov.threat_id.clone(),
                    target: ov.target.clone(),
                });
            }
            if threat.target != ov.target.kind {
                return Err(EngineError::OverrideKindMismatch {
                    threat: ov.threat_id.clone(),
                    expected: threat.target,
                    target: ov.target.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Merge candidates with overrides into the final finding set.
///
/// - candidate with an override: the override's response replaces the
///   candidate's, as do its severity, notes and id when supplied;
/// - candidate without one: kept unchanged;
/// - override without a candidate: kept as a standalone finding.
///
/// Candidates come first in their original order, then standalone
/// overrides in store order. No override is ever dropped.
pub fn reconcile(
    candidates: Vec<Finding>,
    overrides: &OverrideStore,
) -> Result<Vec<Finding>, EngineError> {
    let mut used = vec![false; overrides.len()];
    let mut out = Vec::with_capacity(candidates.len() + overrides.len());

    for mut finding in candidates {
        let key = (finding.target.clone(), finding.threat_id.clone());
        if let Some(&pos) = overrides.index.get(&key) {
            let ov = &overrides.overrides[pos];
            used[pos] = true;
            finding.id = ov.finding_id();
            finding.response = ov.response;
            finding.severity = ov.severity.or(finding.severity);
            if ov.notes.is_some() {
                finding.notes = ov.notes.clone();
            }
            finding.origin = Origin::Overridden;
        }
        out.push(finding);
    }

    for (ov, _) in overrides.overrides.iter().zip(&used).filter(|(_, used)| !**used) {
        out.push(Finding {
            id: ov.finding_id(),
            threat_id: ov.threat_id.clone(),
            target: ov.target.clone(),
            response: ov.response,
            severity: ov.severity,
            origin: Origin::Manual,
            notes: ov.notes.clone(),
        });
    }

    let mut seen = HashSet::with_capacity(out.len());
    for finding in &out {
        if !seen.insert(finding.id.as_str()) {
            return Err(EngineError::DuplicateFindingId(finding.id.clone()));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_model::{BoundarySpec, ElementId, ElementSpec, ModelBuilder, TargetKind};

    fn target(id: &str) -> TargetRef {
        TargetRef::element(&ElementId::new(id))
    }

    #[test]
    fn later_override_replaces_earlier() {
        let mut store = OverrideStore::new();
        assert!(store
            .add(Override::new(target("e"), "T", Response::Accepted))
            .is_none());
        let replaced = store.add(Override::new(target("e"), "T", Response::Mitigated));
        assert_eq!(replaced.unwrap().response, Response::Accepted);
        assert_eq!(store.len(), 1);
        assert_eq!(store.diagnostics().len(), 1);

        let candidates = vec![Finding::candidate("T", target("e"), None)];
        let out = reconcile(candidates, &store).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].response, Response::Mitigated);
        assert_eq!(out[0].origin, Origin::Overridden);
    }

    #[test]
    fn override_without_candidate_is_kept() {
        let mut store = OverrideStore::new();
        store.add(
            Override::new(target("e"), "T", Response::Mitigated)
                .with_id("F-01")
                .with_severity(7.5),
        );
        let out = reconcile(Vec::new(), &store).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "F-01");
        assert_eq!(out[0].response, Response::Mitigated);
        assert_eq!(out[0].severity, Some(7.5));
        assert_eq!(out[0].origin, Origin::Manual);
    }

    #[test]
    fn candidates_without_overrides_are_unchanged() {
        let candidates = vec![
            Finding::candidate("T", target("a"), Some(3.0)),
            Finding::candidate("T", target("b"), Some(3.0)),
        ];
        let out = reconcile(candidates.clone(), &OverrideStore::new()).unwrap();
        assert_eq!(out, candidates);
    }

    #[test]
    fn override_severity_falls_back_to_candidate_score() {
        let mut store = OverrideStore::new();
        store.add(Override::new(target("a"), "T", Response::Accepted).with_notes("known risk"));
        let out = reconcile(vec![Finding::candidate("T", target("a"), Some(3.0))], &store).unwrap();
        assert_eq!(out[0].severity, Some(3.0));
        assert_eq!(out[0].notes.as_deref(), Some("known risk"));
        assert_eq!(out[0].id, "T:a");
    }

    #[test]
    fn colliding_finding_ids_are_rejected() {
        let mut store = OverrideStore::new();
        store.add(Override::new(target("a"), "T", Response::Mitigated).with_id("F-01"));
        store.add(Override::new(target("b"), "T", Response::Mitigated).with_id("F-01"));
        let err = reconcile(Vec::new(), &store).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateFindingId(id) if id == "F-01"));
    }

    #[test]
    fn validate_checks_catalog_and_model() {
        let catalog = ThreatCatalog::from_yaml_str(
            "threats:\n  - { id: T, description: t, target: element, condition: always }\n",
        )
        .unwrap();
        let mut b = ModelBuilder::new("m");
        b.add_element(ElementSpec::server("S").with_id("s")).unwrap();
        let model = b.build();

        let mut ok = OverrideStore::new();
        ok.add(Override::new(target("s"), "T", Response::Accepted));
        assert!(ok.validate(&model, &catalog).is_ok());

        let mut bad_threat = OverrideStore::new();
        bad_threat.add(Override::new(target("s"), "NOPE", Response::Accepted));
        assert!(matches!(
            bad_threat.validate(&model, &catalog),
            Err(EngineError::UnknownOverrideThreat { .. })
        ));

        let mut bad_target = OverrideStore::new();
        bad_target.add(Override::new(target("ghost"), "T", Response::Accepted));
        assert!(matches!(
            bad_target.validate(&model, &catalog),
            Err(EngineError::UnknownOverrideTarget { .. })
        ));
    }

    #[test]
    fn validate_rejects_target_of_another_kind() {
        let catalog = ThreatCatalog::from_yaml_str(
            "threats:\n  - { id: T, description: t, target: element, condition: always }\n",
        )
        .unwrap();
        let mut b = ModelBuilder::new("m");
        let zone = b.add_boundary(BoundarySpec::new("Zone").with_id("zone")).unwrap();
        b.add_element(ElementSpec::server("S").with_id("s")).unwrap();
        let model = b.build();

        let mut store = OverrideStore::new();
        store.add(Override::new(TargetRef::boundary(&zone), "T", Response::Mitigated));
        let err = store.validate(&model, &catalog).unwrap_err();
        assert!(matches!(
            err,
            EngineError::OverrideKindMismatch { expected: TargetKind::Element, .. }
        ));
    }
}
