//! Story dependency validation.
//!
//! [`validate`] builds a [`DependencyGraph`] from story records, then checks
//! it for cycles, computes an execution order, measures chain depth, and
//! scores the result. Detection runs before scoring; the report always
//! carries the full diagnostics so callers never need to re-run analysis.

pub mod extract;
pub mod graph;

pub use extract::extract_text_dependencies;
pub use graph::DependencyGraph;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_SCORE: u32 = 100;
pub const PASS_THRESHOLD: u32 = 60;
pub const ORPHAN_PENALTY: u32 = 10;
pub const CYCLE_PENALTY: u32 = 30;
pub const DEPTH_PENALTY: u32 = 5;
pub const MAX_RECOMMENDED_DEPTH: usize = 5;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    pub total_stories: usize,
    pub total_dependencies: usize,
    pub orphan_dependencies: Vec<String>,
    pub circular_dependencies: Vec<Vec<String>>,
    pub max_depth: usize,
    /// Present only when the graph is acyclic.
    pub execution_order: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// No cycles and no orphans.
    pub valid: bool,
    /// No cycles and a score at or above the pass threshold.
    pub passed: bool,
    pub score: u32,
    pub max_score: u32,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub details: ReportDetails,
}

pub fn format_cycle(cycle: &[String]) -> String {
    let mut path = cycle.join(" -> ");
    if let Some(first) = cycle.first() {
        path.push_str(" -> ");
        path.push_str(first);
    }
    path
}

/// Validate a story set. Pure and deterministic.
pub fn validate(stories: &[Value]) -> ValidationReport {
    let graph = DependencyGraph::build(stories);

    let cycles = graph.detect_circular_dependencies();
    let execution_order = graph.get_topological_order();
    let max_depth = graph.max_depth();
    let orphans: Vec<String> = graph.orphans.iter().cloned().collect();

    let mut issues = Vec::new();
    let mut warnings = graph.notes.clone();

    for cycle in &cycles {
        issues.push(format!("Circular dependency: {}", format_cycle(cycle)));
    }
    for (story, missing) in &graph.orphan_refs {
        issues.push(format!("Story {story} depends on unknown story {missing}"));
    }
    if max_depth > MAX_RECOMMENDED_DEPTH {
        warnings.push(format!(
            "Dependency chain depth {max_depth} exceeds {MAX_RECOMMENDED_DEPTH} levels; \
             consider parallelizing independent stories"
        ));
    }

    let mut penalty = ORPHAN_PENALTY as u64 * orphans.len() as u64
        + CYCLE_PENALTY as u64 * cycles.len() as u64;
    if max_depth > MAX_RECOMMENDED_DEPTH {
        penalty += DEPTH_PENALTY as u64;
    }
    let score = (MAX_SCORE as u64).saturating_sub(penalty) as u32;

    let has_cycles = !cycles.is_empty();
    let report = ValidationReport {
        valid: !has_cycles && orphans.is_empty(),
        passed: !has_cycles && score >= PASS_THRESHOLD,
        score,
        max_score: MAX_SCORE,
        issues,
        warnings,
        details: ReportDetails {
            total_stories: graph.nodes.len(),
            total_dependencies: graph.dependency_count(),
            orphan_dependencies: orphans,
            circular_dependencies: cycles,
            max_depth,
            execution_order,
        },
    };
    tracing::info!(
        stories = report.details.total_stories,
        score = report.score,
        passed = report.passed,
        cycles = report.details.circular_dependencies.len(),
        orphans = report.details.orphan_dependencies.len(),
        "validated story dependencies"
    );
    report
}

// ---------------------------------------------------------------------------
// Guidance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Required,
    Recommended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub priority: Priority,
    pub category: String,
    pub message: String,
    pub action: String,
}

/// Remediation steps for a report, required fixes first.
pub fn improvement_guidance(report: &ValidationReport) -> Vec<Improvement> {
    let mut out = Vec::new();
    for cycle in &report.details.circular_dependencies {
        out.push(Improvement {
            priority: Priority::Required,
            category: "circular_dependency".to_string(),
            message: format!("Circular dependency: {}", format_cycle(cycle)),
            action: "Remove one dependency in the cycle or split a story so the chain has a start"
                .to_string(),
        });
    }
    for orphan in &report.details.orphan_dependencies {
        out.push(Improvement {
            priority: Priority::Required,
            category: "orphan_dependency".to_string(),
            message: format!("Dependency {orphan} does not match any story in this set"),
            action: format!("Create story {orphan} or correct the reference"),
        });
    }
    if report.details.max_depth > MAX_RECOMMENDED_DEPTH {
        out.push(Improvement {
            priority: Priority::Recommended,
            category: "dependency_depth".to_string(),
            message: format!(
                "Dependency chain is {} levels deep",
                report.details.max_depth
            ),
            action: "Parallelize independent stories to shorten the critical path".to_string(),
        });
    }
    out.sort_by_key(|i| i.priority);
    out
}
