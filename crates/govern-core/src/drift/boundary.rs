//! Two-domain import boundary checks.
//!
//! Import references are found with plain textual patterns, not a parser.
//! Commented-out imports are reported like live ones, and references built
//! from string concatenation are missed.

use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// One architectural domain: the directories it owns plus the module aliases
/// that point into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainConfig {
    pub name: String,
    pub roots: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// `rel_path` is `root` itself or lies beneath it.
fn is_under(rel_path: &str, root: &str) -> bool {
    let rel_path = rel_path.trim_end_matches('/');
    let root = root.trim_end_matches('/');
    rel_path == root
        || (rel_path.len() > root.len()
            && rel_path.starts_with(root)
            && rel_path.as_bytes()[root.len()] == b'/')
}

impl DomainConfig {
    fn root_match_len(&self, rel_path: &str) -> Option<usize> {
        self.roots
            .iter()
            .map(|r| r.trim_end_matches('/'))
            .filter(|r| is_under(rel_path, r))
            .map(str::len)
            .max()
    }

    pub fn owns_path(&self, rel_path: &str) -> bool {
        self.root_match_len(rel_path).is_some()
    }

    fn owns_alias(&self, specifier: &str) -> bool {
        self.aliases.iter().any(|a| specifier.starts_with(a.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryConfig {
    pub engineering: DomainConfig,
    pub application: DomainConfig,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    ["js", "jsx", "mjs", "cjs", "ts", "tsx"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            engineering: DomainConfig {
                name: "engineering".to_string(),
                roots: vec!["scripts".into(), "lib".into(), "tools".into()],
                aliases: vec![],
            },
            application: DomainConfig {
                name: "application".to_string(),
                roots: vec!["src".into()],
                aliases: vec!["@/".into()],
            },
            extensions: default_extensions(),
        }
    }
}

impl BoundaryConfig {
    /// Root pairs where one domain's root contains or equals the other's.
    pub fn overlapping_roots(&self) -> Vec<(String, String)> {
        let mut overlaps = Vec::new();
        for a in &self.engineering.roots {
            for b in &self.application.roots {
                if is_under(a, b) || is_under(b, a) {
                    overlaps.push((a.clone(), b.clone()));
                }
            }
        }
        overlaps
    }

    fn is_source(&self, rel_path: &str) -> bool {
        Path::new(rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Import extraction
// ---------------------------------------------------------------------------

static ES_IMPORT_RE: OnceLock<Regex> = OnceLock::new();
static DYNAMIC_IMPORT_RE: OnceLock<Regex> = OnceLock::new();
static REQUIRE_RE: OnceLock<Regex> = OnceLock::new();

fn es_import_re() -> &'static Regex {
    ES_IMPORT_RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*(?:import|export)\s+(?:[^'";]*?\s+from\s+)?['"]([^'"\n]+)['"]"#)
            .unwrap()
    })
}

fn dynamic_import_re() -> &'static Regex {
    DYNAMIC_IMPORT_RE.get_or_init(|| {
        Regex::new(r#"\bimport\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap()
    })
}

fn require_re() -> &'static Regex {
    REQUIRE_RE.get_or_init(|| {
        Regex::new(r#"\brequire\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap()
    })
}

/// Every module specifier referenced by ES-module or CommonJS import syntax,
/// in order of appearance, duplicates removed.
pub fn extract_import_specifiers(source: &str) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = Vec::new();
    for re in [es_import_re(), dynamic_import_re(), require_re()] {
        for cap in re.captures_iter(source) {
            if let Some(m) = cap.get(1) {
                hits.push((m.start(), m.as_str().to_string()));
            }
        }
    }
    hits.sort_by_key(|(pos, _)| *pos);
    let mut seen = std::collections::HashSet::new();
    hits.into_iter()
        .map(|(_, s)| s)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Whether `specifier`, written in a file at `from_file`, points into `domain`.
///
/// Relative specifiers are resolved against the importing file's directory,
/// root-anchored ones (`/src/x`) against the scan root, and anything else is
/// compared against the domain's aliases. Bare package names never match.
pub fn points_into(from_file: &str, specifier: &str, domain: &DomainConfig) -> bool {
    if specifier.starts_with("./") || specifier.starts_with("../") {
        return paths::join_lexical(paths::parent_slash(from_file), specifier)
            .map(|resolved| domain.owns_path(&resolved))
            .unwrap_or(false);
    }
    if let Some(anchored) = specifier.strip_prefix('/') {
        return domain.owns_path(anchored);
    }
    domain.owns_alias(specifier)
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryViolation {
    pub file: String,
    pub specifier: String,
    pub from_domain: String,
    pub to_domain: String,
}

impl BoundaryViolation {
    pub fn describe(&self) -> String {
        format!("{} -> {}", self.file, self.specifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Engineering,
    Application,
}

fn side_of(cfg: &BoundaryConfig, rel_path: &str) -> Option<Side> {
    // Longest owning root wins so the two file sets stay disjoint even when
    // roots are configured to nest.
    let eng = cfg.engineering.root_match_len(rel_path);
    let app = cfg.application.root_match_len(rel_path);
    match (eng, app) {
        (Some(e), Some(a)) if a > e => Some(Side::Application),
        (Some(_), _) => Some(Side::Engineering),
        (None, Some(_)) => Some(Side::Application),
        (None, None) => None,
    }
}

/// Check both directions of the boundary over an already-listed file set.
pub fn scan_boundaries(
    root: &Path,
    files: &[String],
    cfg: &BoundaryConfig,
) -> Vec<BoundaryViolation> {
    let mut violations = Vec::new();
    for file in files.iter().filter(|f| cfg.is_source(f)) {
        let (from, to) = match side_of(cfg, file) {
            Some(Side::Engineering) => (&cfg.engineering, &cfg.application),
            Some(Side::Application) => (&cfg.application, &cfg.engineering),
            None => continue,
        };
        let Some(content) = crate::io::read_text(&root.join(file)) else {
            tracing::warn!(file = %file, "skipping unreadable source file");
            continue;
        };
        for specifier in extract_import_specifiers(&content) {
            if points_into(file, &specifier, to) {
                violations.push(BoundaryViolation {
                    file: file.clone(),
                    specifier,
                    from_domain: from.name.clone(),
                    to_domain: to.name.clone(),
                });
            }
        }
    }
    violations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
