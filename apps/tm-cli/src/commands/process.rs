// process.rs - `tm process`: build, match, reconcile and hand off findings.

use std::path::PathBuf;

use tm_engine::{analyze, AnalysisReport, Response};
use tm_model::ThreatModel;
use tm_threats::ThreatCatalog;

use crate::commands::{expand_inputs, load_catalog, load_model, truncate};
use crate::config::{OutputFormat, TmConfig};

pub fn execute(
    config: &TmConfig,
    inputs: &[String],
    format: Option<OutputFormat>,
    catalogs: &[PathBuf],
) -> anyhow::Result<()> {
    let format = format.unwrap_or(config.output.format);
    let catalog = load_catalog(config, catalogs)?;
    let files = expand_inputs(inputs)?;

    // Every model is analyzed before anything is printed, so a bad file
    // never leaves a partial report behind.
    let mut runs = Vec::with_capacity(files.len());
    for path in &files {
        let (model, overrides) = load_model(path)?;
        let report = analyze(&model, &catalog, &overrides)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        runs.push((model, report));
    }

    match format {
        OutputFormat::Json => {
            let reports: Vec<&AnalysisReport> = runs.iter().map(|(_, r)| r).collect();
            if reports.len() == 1 {
                println!("{}", serde_json::to_string_pretty(reports[0])?);
            } else {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }
        OutputFormat::Table => {
            for (i, (model, report)) in runs.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_report(model, report, &catalog, config.output.show_mitigated);
            }
        }
    }

    let unmitigated: usize = runs.iter().map(|(_, r)| r.summary.unmitigated).sum();
    if config.policy.fail_on_unmitigated && unmitigated > 0 {
        anyhow::bail!(
            "{} unmitigated finding(s) remain (policy.fail_on_unmitigated is set)",
            unmitigated
        );
    }
    Ok(())
}

fn print_report(
    model: &ThreatModel,
    report: &AnalysisReport,
    catalog: &ThreatCatalog,
    show_mitigated: bool,
) {
    println!("Model: {}", report.model);
    println!(
        "Run:   {} ({})",
        report.run_id,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    let rows: Vec<_> = report
        .findings
        .iter()
        .filter(|f| show_mitigated || f.response == Response::Unmitigated)
        .collect();

    if rows.is_empty() {
        println!("No findings to show.");
    } else {
        println!(
            "{:<24} {:<8} {:<28} {:<12} {:>5}  DESCRIPTION",
            "FINDING", "THREAT", "TARGET", "RESPONSE", "SCORE"
        );
        println!("{}", "-".repeat(110));
        for finding in rows {
            let target = model
                .target_label(&finding.target)
                .unwrap_or(finding.target.id.as_str());
            let description = catalog
                .get(&finding.threat_id)
                .map(|t| t.description.as_str())
                .unwrap_or("-");
            let score = finding
                .severity
                .map(|s| format!("{:.1}", s))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<24} {:<8} {:<28} {:<12} {:>5}  {}",
                truncate(&finding.id, 24),
                finding.threat_id,
                truncate(target, 28),
                finding.response,
                score,
                truncate(description, 60),
            );
        }
    }

    println!();
    println!(
        "{} finding(s) from {} threat(s): {} unmitigated, {} mitigated, {} accepted, {} rejected",
        report.summary.total,
        report.threats_evaluated,
        report.summary.unmitigated,
        report.summary.mitigated,
        report.summary.accepted,
        report.summary.rejected,
    );
    for diagnostic in &report.diagnostics {
        println!("note: {}", diagnostic);
    }
}
