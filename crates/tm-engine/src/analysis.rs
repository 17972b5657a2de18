// analysis.rs - The "process" pipeline: match, reconcile, report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_model::ThreatModel;
use tm_threats::ThreatCatalog;
use uuid::Uuid;

use crate::error::EngineError;
use crate::finding::{Finding, Response};
use crate::matcher::match_threats;
use crate::overrides::{reconcile, OverrideStore};

/// Finding counts by response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub unmitigated: usize,
    pub mitigated: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl Summary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Summary {
            total: findings.len(),
            ..Default::default()
        };
        for f in findings {
            match f.response {
                Response::Unmitigated => summary.unmitigated += 1,
                Response::Mitigated => summary.mitigated += 1,
                Response::Accepted => summary.accepted += 1,
                Response::Rejected => summary.rejected += 1,
            }
        }
        summary
    }
}

/// Read model handed to report generators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub model: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Number of threats evaluated.
    pub threats_evaluated: usize,
    pub findings: Vec<Finding>,
    pub summary: Summary,
    /// Override replacements and other non-fatal notices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl AnalysisReport {
    pub fn unmitigated(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.response == Response::Unmitigated)
    }

    pub fn finding(&self, id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.id == id)
    }
}

/// Run the catalog against a frozen model and reconcile with overrides.
///
/// Overrides are validated first; any configuration error aborts the run
/// before matching starts.
pub fn analyze(
    model: &ThreatModel,
    catalog: &ThreatCatalog,
    overrides: &OverrideStore,
) -> Result<AnalysisReport, EngineError> {
    overrides.validate(model, catalog)?;
    let candidates = match_threats(model, catalog)?;
    let candidate_count = candidates.len();
    let findings = reconcile(candidates, overrides)?;
    let summary = Summary::from_findings(&findings);

    tracing::info!(
        model = %model.name(),
        candidates = candidate_count,
        findings = summary.total,
        unmitigated = summary.unmitigated,
        "analysis complete"
    );

    Ok(AnalysisReport {
        model: model.name().to_string(),
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        threats_evaluated: catalog.len(),
        findings,
        summary,
        diagnostics: overrides.diagnostics().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::Override;
    use tm_model::{ElementSpec, ModelBuilder, TargetRef};

    fn catalog() -> ThreatCatalog {
        ThreatCatalog::from_yaml_str(
            r#"
threats:
  - id: H
    description: Unhardened server
    target: element
    score: 5.0
    condition:
      flag: { name: isHardened, value: false }
"#,
        )
        .unwrap()
    }

    #[test]
    fn summary_counts_by_response() {
        let mut b = ModelBuilder::new("m");
        let a = b.add_element(ElementSpec::server("A").with_id("a")).unwrap();
        b.add_element(ElementSpec::server("B").with_id("b")).unwrap();
        let model = b.build();

        let mut store = OverrideStore::new();
        store.add(Override::new(TargetRef::element(&a), "H", Response::Mitigated));
        let report = analyze(&model, &catalog(), &store).unwrap();

        assert_eq!(report.model, "m");
        assert_eq!(report.threats_evaluated, 1);
        assert_eq!(
            report.summary,
            Summary {
                total: 2,
                unmitigated: 1,
                mitigated: 1,
                accepted: 0,
                rejected: 0
            }
        );
        assert_eq!(report.unmitigated().count(), 1);
        assert_eq!(report.finding("H:b").unwrap().severity, Some(5.0));
    }

    #[test]
    fn invalid_override_aborts_before_matching() {
        let mut b = ModelBuilder::new("m");
        let a = b.add_element(ElementSpec::server("A")).unwrap();
        let model = b.build();
        let mut store = OverrideStore::new();
        store.add(Override::new(TargetRef::element(&a), "MISSING", Response::Accepted));
        assert!(matches!(
            analyze(&model, &catalog(), &store),
            Err(EngineError::UnknownOverrideThreat { .. })
        ));
    }

    #[test]
    fn report_serializes_to_json() {
        let model = ModelBuilder::new("empty").build();
        let report = analyze(&model, &catalog(), &OverrideStore::new()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["total"], 0);
        assert!(json.get("diagnostics").is_none());
        let restored: AnalysisReport = serde_json::from_value(json).unwrap();
        assert_eq!(restored.run_id, report.run_id);
    }
}
