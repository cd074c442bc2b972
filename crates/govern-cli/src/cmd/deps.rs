use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use govern_core::deps::{self, format_cycle, Improvement, Priority, ValidationReport};
use govern_core::error::GovernError;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DepsArgs {
    /// JSON file holding an array of stories, or an object with a `stories` array
    pub file: PathBuf,

    /// Include prioritized remediation steps
    #[arg(long)]
    pub guidance: bool,
}

/// Accept either a bare array or `{ "stories": [...] }`.
fn parse_stories(doc: Value) -> Result<Vec<Value>, GovernError> {
    match doc {
        Value::Array(stories) => Ok(stories),
        Value::Object(mut map) => match map.remove("stories") {
            Some(Value::Array(stories)) => Ok(stories),
            _ => Err(GovernError::InvalidInput(
                "expected an object with a 'stories' array".to_string(),
            )),
        },
        _ => Err(GovernError::InvalidInput(
            "expected a JSON array of stories".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Returns exit code 0 when the report passed, 1 otherwise. A relative
/// `file` is read from the working directory, like `--report`.
pub fn run(args: DepsArgs, json: bool) -> anyhow::Result<i32> {
    let path = args.file;
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: Value = serde_json::from_str(&data)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let stories = parse_stories(doc).with_context(|| format!("in {}", path.display()))?;

    let report = deps::validate(&stories);
    let guidance = if args.guidance {
        Some(deps::improvement_guidance(&report))
    } else {
        None
    };

    if json {
        let mut value = serde_json::to_value(&report)?;
        if let (Some(g), Value::Object(map)) = (&guidance, &mut value) {
            map.insert("guidance".to_string(), serde_json::to_value(g)?);
        }
        print_json(&value)?;
    } else {
        print_report(&report);
        if let Some(g) = &guidance {
            print_guidance(g);
        }
    }

    Ok(if report.passed { 0 } else { 1 })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_report(report: &ValidationReport) {
    let d = &report.details;
    println!(
        "Dependency validation: {} (score {}/{})",
        if report.passed { "PASSED" } else { "FAILED" },
        report.score,
        report.max_score
    );
    println!(
        "  {} stories, {} dependencies, max depth {}",
        d.total_stories, d.total_dependencies, d.max_depth
    );

    if !report.issues.is_empty() {
        println!("\nIssues:");
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }

    match &d.execution_order {
        Some(order) if !order.is_empty() => {
            println!("\nExecution order:");
            for (i, key) in order.iter().enumerate() {
                println!("  {:>3}. {key}", i + 1);
            }
        }
        Some(_) => {}
        None => {
            println!("\nNo execution order: the graph has cycles.");
            for cycle in &d.circular_dependencies {
                println!("  {}", format_cycle(cycle));
            }
        }
    }
}

fn print_guidance(guidance: &[Improvement]) {
    if guidance.is_empty() {
        println!("\nNo improvements needed.");
        return;
    }
    println!("\nGuidance:");
    for item in guidance {
        let tag = match item.priority {
            Priority::Required => "required",
            Priority::Recommended => "recommended",
        };
        println!("  [{tag}] {}", item.message);
        println!("      -> {}", item.action);
    }
}
