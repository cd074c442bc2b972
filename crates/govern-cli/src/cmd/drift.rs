use crate::output::{print_json, truncated_listing, MAX_LISTED_FILES};
use anyhow::Context;
use clap::Args;
use govern_core::config::Config;
use govern_core::drift::{self, DriftReport, Provenance, Verdict};
use govern_core::store::{AlertSink, NullSink, RestStore, StoreCredentials};
use govern_core::types::Severity;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Default, Clone)]
pub struct DriftArgs {
    /// Scan and report without writing compliance alerts (no credentials needed)
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the drift gate. Returns the process exit code: 0 pass, 1 block.
/// Configuration errors surface as `Err` and map to exit code 2.
pub fn run(root: &Path, args: DriftArgs, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(root).context("failed to load config")?;

    // Credentials are checked before any scanning so a misconfigured job
    // never produces a partial result.
    let sink: Box<dyn AlertSink> = if args.dry_run {
        Box::new(NullSink)
    } else {
        let credentials =
            StoreCredentials::from_env().context("alert store is not configured")?;
        Box::new(
            RestStore::new(credentials, config.store.clone())
                .context("failed to build store client")?,
        )
    };

    let report = drift::scan(root, &config.drift)
        .with_context(|| format!("drift scan failed in {}", root.display()))?;

    let provenance = Provenance::detect(root);
    let recorded = drift::publish(&report, sink.as_ref(), &provenance);

    if let Some(path) = &args.report {
        govern_core::io::write_json(path, &report)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, &provenance);
        if !report.findings.is_empty() {
            if args.dry_run {
                println!("Dry run: {} alert(s) not recorded.", report.findings.len());
            } else {
                println!(
                    "Recorded {recorded} of {} compliance alert(s).",
                    report.findings.len()
                );
            }
        }
    }

    Ok(report.verdict.exit_code())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_report(report: &DriftReport, provenance: &Provenance) {
    println!(
        "Drift scan {} on {}@{}: {} file(s) scanned",
        report.scan_id, provenance.branch, provenance.commit, report.files_scanned
    );

    if report.is_clean() {
        println!("No drift detected.");
    }

    for finding in &report.findings {
        println!();
        println!(
            "{} [{}] {}: {}",
            finding.severity.icon(),
            finding.severity.as_str().to_uppercase(),
            finding.kind,
            finding.message
        );
        for line in truncated_listing(&finding.files, MAX_LISTED_FILES) {
            println!("   {line}");
        }
        println!("   Fix: {}", finding.remediation);
    }

    if !report.is_clean() {
        let counts: Vec<String> = Severity::all()
            .iter()
            .rev()
            .map(|&s| format!("{} {}", report.count(s), s))
            .collect();
        println!();
        println!("Summary: {}", counts.join(", "));
    }

    match report.verdict {
        Verdict::Block => println!(
            "BLOCKED: {} critical finding(s) must be resolved before merge.",
            report.critical_count()
        ),
        Verdict::Pass => println!("PASSED"),
    }
}
