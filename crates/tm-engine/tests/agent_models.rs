// agent_models.rs - Integration test over the bundled agent-architecture models.
//
// Every model under `models/` is loaded from disk and analyzed against the
// built-in threat catalog.
//
// Flow:
//   1. Parse the definition (YAML)
//   2. Build the frozen model and override store
//   3. Run match + reconcile with the built-in catalog
//   4. Check that every declared override survives exactly once
//
// This proves: definition files -> builder validation -> matcher -> reconcile
// agree with each other for real architectures, not just unit fixtures.

use std::path::PathBuf;

use tm_engine::{analyze, ModelDefinition, Origin, Response};
use tm_model::{TargetKind, TargetRef};
use tm_threats::ThreatCatalog;

fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models")
}

fn model_files() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(models_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yaml"))
        .collect();
    files.sort();
    files
}

fn load(name: &str) -> ModelDefinition {
    ModelDefinition::load(&models_dir().join(name)).unwrap()
}

#[test]
fn all_bundled_models_analyze_cleanly() {
    let catalog = ThreatCatalog::builtin().unwrap();
    let files = model_files();
    assert_eq!(files.len(), 10, "expected ten bundled models");

    for path in files {
        let def = ModelDefinition::load(&path)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        let declared = def.overrides.clone();
        let (model, overrides) = def
            .into_model()
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        let report = analyze(&model, &catalog, &overrides)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));

        assert!(!model.is_empty(), "{} is empty", path.display());
        assert_eq!(report.summary.total, report.findings.len());

        for ov in declared {
            let hits: Vec<_> = report
                .findings
                .iter()
                .filter(|f| f.threat_id == ov.threat && f.target.id == ov.target)
                .collect();
            assert_eq!(
                hits.len(),
                1,
                "{}: override {} on {} should appear once",
                path.display(),
                ov.threat,
                ov.target
            );
            assert_eq!(hits[0].response, ov.response);
        }
    }
}

#[test]
fn agentic_greeting_overrides_replace_candidates() {
    let catalog = ThreatCatalog::builtin().unwrap();
    let (model, overrides) = load("greeting_agentic.yaml").into_model().unwrap();
    assert_eq!(overrides.len(), 4);
    let report = analyze(&model, &catalog, &overrides).unwrap();

    for (id, threat, target, score) in [
        ("F-AE-01", "AC12", "action_executor", 7.5),
        ("F-SEC-01", "AC01", "secret_manager", 9.0),
        ("F-DF-01", "DE01", "d_root_vertex", 6.5),
        ("F-PA-01", "DO01", "policy_agent", 5.0),
    ] {
        let finding = report
            .finding(id)
            .unwrap_or_else(|| panic!("missing finding {}", id));
        assert_eq!(finding.threat_id, threat);
        assert_eq!(finding.target.id, target);
        assert_eq!(finding.response, Response::Mitigated);
        assert_eq!(finding.severity, Some(score));
        assert_eq!(finding.origin, Origin::Overridden);
    }

    // The overridden pairs no longer appear under their automatic ids.
    assert!(report.finding("AC12:action_executor").is_none());
    assert!(report.finding("DE01:d_root_vertex").is_none());
    assert_eq!(report.summary.mitigated, 4);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn encrypted_flows_do_not_match_interception() {
    let catalog = ThreatCatalog::builtin().unwrap();
    let (model, overrides) = load("greeting_vertex.yaml").into_model().unwrap();
    let report = analyze(&model, &catalog, &overrides).unwrap();

    assert!(report.finding("DE01:d_root_vertex").is_none());
    assert!(report.finding("DE01:d_user_root").is_none());
    let response_flow = report.finding("DE01:d_vertex_root").unwrap();
    assert_eq!(response_flow.response, Response::Unmitigated);
    assert_eq!(response_flow.target.kind, TargetKind::Dataflow);
}

#[test]
fn public_boundary_without_perimeter_is_flagged() {
    let catalog = ThreatCatalog::builtin().unwrap();
    let (model, overrides) = load("basic_agent.yaml").into_model().unwrap();
    let report = analyze(&model, &catalog, &overrides).unwrap();

    let bd01: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.threat_id == "BD01")
        .collect();
    assert_eq!(bd01.len(), 1);
    assert_eq!(bd01[0].target, TargetRef::boundary(&"internet".into()));
}

#[test]
fn analysis_is_repeatable() {
    let catalog = ThreatCatalog::builtin().unwrap();
    let (model, overrides) = load("trip_planner.yaml").into_model().unwrap();
    let first = analyze(&model, &catalog, &overrides).unwrap();
    let second = analyze(&model, &catalog, &overrides).unwrap();
    assert_eq!(first.findings, second.findings);
    assert_ne!(first.run_id, second.run_id);
}
