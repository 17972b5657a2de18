// matcher.rs - Cross-product scan of a threat catalog over a frozen model.
//
// For every threat in catalog order, every target of the threat's kind is
// visited in registration order:
//
// 1. Is the target of the kind the threat evaluates? -> No -> skip
// 2. Does an element target pass the threat's kind filter? -> No -> skip
// 3. Does the condition hold? -> Yes -> candidate finding
//
// A condition that cannot be evaluated aborts the whole run; there is no
// partial result.

use serde::{Deserialize, Serialize};
use tm_model::{TargetKind, TargetRef, ThreatModel};
use tm_threats::{ConditionStep, Subject, Threat, ThreatCatalog};

use crate::error::EngineError;
use crate::finding::Finding;

/// Produce candidate findings, all with response `unmitigated`.
///
/// Running twice on the same model and catalog yields the same findings in
/// the same order.
pub fn match_threats(
    model: &ThreatModel,
    catalog: &ThreatCatalog,
) -> Result<Vec<Finding>, EngineError> {
    let mut findings = Vec::new();
    for threat in catalog.iter() {
        let before = findings.len();
        for subject in subjects(model, threat.target) {
            if !threat.considers(subject) {
                continue;
            }
            let matched = threat
                .condition
                .evaluate(model, subject)
                .map_err(|source| EngineError::Predicate {
                    threat: threat.id.clone(),
                    target: subject.target_ref(),
                    source,
                })?;
            if matched {
                findings.push(Finding::candidate(
                    &threat.id,
                    subject.target_ref(),
                    threat.score,
                ));
            }
        }
        tracing::debug!(
            threat = %threat.id,
            matches = findings.len() - before,
            "threat evaluated"
        );
    }
    Ok(findings)
}

/// Every entity of one target kind, in registration order.
fn subjects(model: &ThreatModel, kind: TargetKind) -> Vec<Subject<'_>> {
    match kind {
        TargetKind::Element => model.elements().iter().map(Subject::Element).collect(),
        TargetKind::Dataflow => model.dataflows().iter().map(Subject::Dataflow).collect(),
        TargetKind::Boundary => model.boundaries().iter().map(Subject::Boundary).collect(),
    }
}

/// A single step in a match explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchStep {
    /// What was checked (e.g., "target_kind", "element_kind", a flag test).
    pub check: String,
    /// What the check found.
    pub outcome: String,
    /// Whether this step decided the result.
    pub terminal: bool,
}

/// Step-by-step record of why one threat did or did not match one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchTrace {
    pub threat_id: String,
    pub target: TargetRef,
    pub matched: bool,
    pub steps: Vec<MatchStep>,
    /// Raw condition leaves as evaluated, in evaluation order.
    pub leaves: Vec<ConditionStep>,
}

/// Explain the match decision for one (threat, target) pair.
pub fn explain(
    model: &ThreatModel,
    threat: &Threat,
    target: &TargetRef,
) -> Result<MatchTrace, EngineError> {
    let subject = Subject::resolve(model, target)
        .ok_or_else(|| EngineError::UnknownTarget(target.clone()))?;
    let mut steps = Vec::new();
    let trace = |matched: bool, steps: Vec<MatchStep>, leaves: Vec<ConditionStep>| MatchTrace {
        threat_id: threat.id.clone(),
        target: target.clone(),
        matched,
        steps,
        leaves,
    };

    if threat.target != target.kind {
        steps.push(MatchStep {
            check: "target_kind".to_string(),
            outcome: format!(
                "skipped: threat evaluates {} targets, not {}",
                threat.target, target.kind
            ),
            terminal: true,
        });
        return Ok(trace(false, steps, Vec::new()));
    }
    steps.push(MatchStep {
        check: "target_kind".to_string(),
        outcome: format!("passed: {}", target.kind),
        terminal: false,
    });

    if let Subject::Element(element) = subject {
        if !threat.considers(subject) {
            steps.push(MatchStep {
                check: "element_kind".to_string(),
                outcome: format!("skipped: {} is not in the threat's kind filter", element.kind),
                terminal: true,
            });
            return Ok(trace(false, steps, Vec::new()));
        }
        steps.push(MatchStep {
            check: "element_kind".to_string(),
            outcome: format!("passed: {}", element.kind),
            terminal: false,
        });
    }

    let (matched, leaves) = threat
        .condition
        .evaluate_traced(model, subject)
        .map_err(|source| EngineError::Predicate {
            threat: threat.id.clone(),
            target: target.clone(),
            source,
        })?;
    steps.push(MatchStep {
        check: "condition".to_string(),
        outcome: if matched {
            format!("matched: {}", threat.condition)
        } else {
            format!("no match: {}", threat.condition)
        },
        terminal: true,
    });
    Ok(trace(matched, steps, leaves))
}
