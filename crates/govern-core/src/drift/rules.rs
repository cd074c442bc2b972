use crate::error::{GovernError, Result};
use crate::types::Severity;
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ForbiddenRule
// ---------------------------------------------------------------------------

/// A category of file that must not exist on disk because its canonical home
/// is the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForbiddenRule {
    /// Finding type key, also used as the compliance alert type.
    pub name: String,
    pub severity: Severity,
    pub patterns: Vec<String>,
    /// Short plural noun phrase used in messages ("PRD documents").
    pub description: String,
    pub remediation: String,
}

impl ForbiddenRule {
    fn new(
        name: &str,
        severity: Severity,
        patterns: &[&str],
        description: &str,
        remediation: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            severity,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            description: description.to_string(),
            remediation: remediation.to_string(),
        }
    }
}

pub fn default_rules() -> Vec<ForbiddenRule> {
    vec![
        ForbiddenRule::new(
            "strategic_directive_files",
            Severity::Critical,
            &["**/SD-*.md", "**/strategic-directives/**/*.md"],
            "strategic directive documents",
            "Strategic directives live in the strategic_directives table. Insert the content \
             through the directive scripts and delete the file.",
        ),
        ForbiddenRule::new(
            "prd_files",
            Severity::Critical,
            &["**/PRD-*.md", "**/prd-*.md", "**/*-prd.md", "**/prds/**/*.md"],
            "PRD documents",
            "Requirement documents live in the product_requirements table. Migrate the \
             content to the database and delete the file.",
        ),
        ForbiddenRule::new(
            "handoff_files",
            Severity::Critical,
            &["**/*handoff*.md", "**/handoffs/**/*.md"],
            "handoff documents",
            "Phase handoffs are recorded in the handoff table. Create the handoff through \
             the handoff system and delete the file.",
        ),
        ForbiddenRule::new(
            "retrospective_files",
            Severity::Warning,
            &["**/*retrospective*.md", "**/retrospectives/**/*.md"],
            "retrospective documents",
            "Retrospectives belong in the retrospectives table. Record them there and \
             remove the markdown copy.",
        ),
        ForbiddenRule::new(
            "review_artifacts",
            Severity::Warning,
            &["**/*-review.md", "**/reviews/**/*.md"],
            "review artifacts",
            "Review results are stored as sub-agent execution records. Persist the review \
             in the database instead of the working tree.",
        ),
        ForbiddenRule::new(
            "generated_reports",
            Severity::Warning,
            &["**/*-report.md", "**/reports/**/*.md"],
            "generated reports",
            "Generated reports should be written to the database or CI artifacts, not \
             committed to the repository.",
        ),
    ]
}

pub fn default_allowlist() -> Vec<String> {
    [
        "docs/**",
        "**/templates/**",
        "**/*.template.md",
        "**/examples/**",
        "**/*.example.*",
        "supabase/migrations/**",
        "database/migrations/**",
        ".github/workflows/**",
        "**/README.md",
        "**/CHANGELOG.md",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

pub fn default_exclude_dirs() -> Vec<String> {
    [
        "node_modules",
        ".git",
        "target",
        "dist",
        "build",
        ".next",
        "coverage",
        ".govern",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// PatternSet
// ---------------------------------------------------------------------------

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled list of globs matched against root-relative `/`-separated paths.
///
/// `*` and `?` never cross a `/`. `**/` spans zero or more directories, and a
/// trailing `/**` matches everything beneath the directory.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn compile<S: AsRef<str>>(globs: &[S]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(globs.len());
        for raw in globs {
            let raw = raw.as_ref();
            let expanded = match raw.strip_suffix("/**") {
                Some(prefix) => format!("{prefix}/**/*"),
                None => raw.to_string(),
            };
            let pattern = Pattern::new(&expanded).map_err(|e| GovernError::InvalidPattern {
                pattern: raw.to_string(),
                reason: e.msg.to_string(),
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(rel_path, MATCH_OPTIONS))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A forbidden rule with its globs compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: ForbiddenRule,
    pub patterns: PatternSet,
}

pub fn compile_rules(rules: &[ForbiddenRule]) -> Result<Vec<CompiledRule>> {
    rules
        .iter()
        .map(|rule| {
            Ok(CompiledRule {
                patterns: PatternSet::compile(&rule.patterns)?,
                rule: rule.clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
