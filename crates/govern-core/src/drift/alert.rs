use super::DriftFinding;
use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

pub const ALERT_SOURCE: &str = "filesystem-drift-detector";

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a scan ran: git position plus CI identity, so historical drift can
/// be traced back to a branch and a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub branch: String,
    pub commit: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_run_id: Option<String>,
}

const UNKNOWN: &str = "unknown";

/// Run a git query in `root`. Returns None when git is missing, the directory
/// is not a repository, or the output is empty.
fn git_output(root: &Path, args: &[&str]) -> Option<String> {
    which::which("git").ok()?;
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn non_empty_env(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(*k))
        .find(|v| !v.trim().is_empty())
}

impl Provenance {
    pub fn detect(root: &Path) -> Self {
        Self::detect_with(root, |k| std::env::var(k).ok())
    }

    pub fn detect_with(root: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            branch: git_output(root, &["rev-parse", "--abbrev-ref", "HEAD"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            commit: git_output(root, &["rev-parse", "--short", "HEAD"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            actor: non_empty_env(&lookup, &["GITHUB_ACTOR", "USER", "USERNAME"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            pr_number: non_empty_env(&lookup, &["PR_NUMBER", "GITHUB_PR_NUMBER"]),
            ci_run_id: non_empty_env(&lookup, &["GITHUB_RUN_ID"]),
        }
    }
}

// ---------------------------------------------------------------------------
// ComplianceAlert
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub alert_type: String,
    pub severity: Severity,
    pub source: String,
    pub message: String,
    pub payload: serde_json::Value,
}

impl ComplianceAlert {
    pub fn from_finding(
        finding: &DriftFinding,
        scan_id: &str,
        provenance: &Provenance,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_type: finding.kind.clone(),
            severity: finding.severity,
            source: ALERT_SOURCE.to_string(),
            message: finding.message.clone(),
            payload: serde_json::json!({
                "scan_id": scan_id,
                "files": finding.files,
                "file_count": finding.files.len(),
                "remediation": finding.remediation,
                "provenance": provenance,
                "detected_at": detected_at.to_rfc3339(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
