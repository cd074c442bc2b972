//! Filesystem drift and boundary detection.
//!
//! A scan walks the project tree once, then runs two checks over the file
//! list: forbidden-pattern rules (artifacts whose canonical home is the
//! database) and the two-domain import boundary. Each non-empty check becomes
//! a [`DriftFinding`]; any critical finding makes the verdict blocking.

pub mod alert;
pub mod boundary;
pub mod rules;
pub mod tree;

pub use alert::{ComplianceAlert, Provenance};
pub use boundary::{BoundaryConfig, BoundaryViolation, DomainConfig};
pub use rules::{ForbiddenRule, PatternSet};

use crate::error::Result;
use crate::store::AlertSink;
use crate::types::Severity;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BOUNDARY_FINDING: &str = "boundary_violations";

// ---------------------------------------------------------------------------
// DriftConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriftConfig {
    #[serde(default = "rules::default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default = "rules::default_allowlist")]
    pub allowlist: Vec<String>,
    #[serde(default = "rules::default_rules")]
    pub rules: Vec<ForbiddenRule>,
    /// `None` disables the boundary check.
    #[serde(default = "default_boundary")]
    pub boundary: Option<BoundaryConfig>,
}

fn default_boundary() -> Option<BoundaryConfig> {
    Some(BoundaryConfig::default())
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: rules::default_exclude_dirs(),
            allowlist: rules::default_allowlist(),
            rules: rules::default_rules(),
            boundary: default_boundary(),
        }
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftFinding {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub files: Vec<String>,
    pub message: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Block,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Block => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub scan_id: String,
    pub root: String,
    pub files_scanned: usize,
    pub findings: Vec<DriftFinding>,
    pub verdict: Verdict,
}

impl DriftReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn critical_count(&self) -> usize {
        self.count(Severity::Critical)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

fn forbidden_findings(
    files: &[String],
    rules: &[rules::CompiledRule],
    allowlist: &PatternSet,
) -> Vec<DriftFinding> {
    let mut findings = Vec::new();
    for compiled in rules {
        let offending: Vec<String> = files
            .iter()
            .filter(|f| compiled.patterns.matches(f) && !allowlist.matches(f))
            .cloned()
            .collect();
        if offending.is_empty() {
            continue;
        }
        let rule = &compiled.rule;
        findings.push(DriftFinding {
            kind: rule.name.clone(),
            severity: rule.severity,
            message: format!(
                "Found {} {} on the filesystem (database is the source of truth)",
                offending.len(),
                rule.description
            ),
            files: offending,
            remediation: rule.remediation.clone(),
        });
    }
    findings
}

fn boundary_finding(violations: &[BoundaryViolation]) -> Option<DriftFinding> {
    if violations.is_empty() {
        return None;
    }
    let mut directions: Vec<String> = violations
        .iter()
        .map(|v| format!("{} -> {}", v.from_domain, v.to_domain))
        .collect();
    directions.sort();
    directions.dedup();
    Some(DriftFinding {
        kind: BOUNDARY_FINDING.to_string(),
        severity: Severity::Critical,
        files: violations.iter().map(BoundaryViolation::describe).collect(),
        message: format!(
            "Found {} cross-domain import(s) ({})",
            violations.len(),
            directions.join(", ")
        ),
        remediation: "Engineering tooling and application code must stay decoupled. Move the \
                      shared code behind an API or a published package instead of importing \
                      across the boundary."
            .to_string(),
    })
}

/// Scan `root` against `cfg`. Read-only: nothing is persisted here.
pub fn scan(root: &Path, cfg: &DriftConfig) -> Result<DriftReport> {
    let compiled = rules::compile_rules(&cfg.rules)?;
    let allowlist = PatternSet::compile(&cfg.allowlist)?;
    let files = tree::list_files(root, &cfg.exclude_dirs)?;

    let mut findings = forbidden_findings(&files, &compiled, &allowlist);
    if let Some(boundary) = &cfg.boundary {
        let violations = boundary::scan_boundaries(root, &files, boundary);
        findings.extend(boundary_finding(&violations));
    }

    let verdict = if findings.iter().any(|f| f.severity.is_blocking()) {
        Verdict::Block
    } else {
        Verdict::Pass
    };

    let report = DriftReport {
        scan_id: uuid::Uuid::new_v4().to_string(),
        root: root.display().to_string(),
        files_scanned: files.len(),
        findings,
        verdict,
    };
    tracing::info!(
        scan_id = %report.scan_id,
        files = report.files_scanned,
        findings = report.findings.len(),
        critical = report.critical_count(),
        "drift scan complete"
    );
    Ok(report)
}

/// Persist every finding as a compliance alert. Write failures are logged and
/// skipped; the return value is the number of alerts stored.
pub fn publish(report: &DriftReport, sink: &dyn AlertSink, provenance: &Provenance) -> usize {
    let detected_at = Utc::now();
    let mut stored = 0;
    for finding in &report.findings {
        let alert = ComplianceAlert::from_finding(finding, &report.scan_id, provenance, detected_at);
        match sink.record(&alert) {
            Ok(()) => stored += 1,
            Err(e) => {
                tracing::warn!(
                    alert_type = %alert.alert_type,
                    error = %e,
                    "failed to record compliance alert"
                );
            }
        }
    }
    stored
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
