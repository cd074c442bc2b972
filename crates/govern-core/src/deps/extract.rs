//! Dependency references in story records.
//!
//! Structured fields (`dependencies`, `blocked_by`, `depends_on`) are the
//! authoritative source. [`extract_text_dependencies`] is a best-effort miner
//! over narrative text: it can report identifiers that are only mentioned in
//! passing and miss references phrased in ways it does not recognise, so its
//! hits are supplementary.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const STRUCTURED_FIELDS: &[&str] = &["dependencies", "blocked_by", "depends_on"];

pub const NARRATIVE_FIELDS: &[&str] = &[
    "title",
    "description",
    "user_want",
    "user_benefit",
    "implementation_context",
    "technical_notes",
    "acceptance_criteria",
];

const REF_KEYS: &[&str] = &["story_key", "id", "key"];

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The story's identifier: `story_key`, else `id`.
pub fn story_key(story: &Value) -> Option<String> {
    ["story_key", "id"]
        .iter()
        .find_map(|k| story.get(*k).and_then(scalar_string))
}

// ---------------------------------------------------------------------------
// Structured fields
// ---------------------------------------------------------------------------

fn refs_from_field(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.extend(
            s.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        ),
        Value::Number(_) => out.extend(scalar_string(value)),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) => {
                        out.extend(REF_KEYS.iter().find_map(|k| item.get(*k).and_then(scalar_string)))
                    }
                    other => refs_from_field(other, out),
                }
            }
        }
        Value::Object(_) => {
            out.extend(REF_KEYS.iter().find_map(|k| value.get(*k).and_then(scalar_string)))
        }
        Value::Bool(_) => {}
    }
}

/// References from the structured dependency fields, in field order.
pub fn structured_dependencies(story: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    for field in STRUCTURED_FIELDS {
        if let Some(value) = story.get(*field) {
            refs_from_field(value, &mut refs);
        }
    }
    dedup(refs)
}

// ---------------------------------------------------------------------------
// Narrative text
// ---------------------------------------------------------------------------

static PHRASE_RE: OnceLock<Regex> = OnceLock::new();
static BARE_RE: OnceLock<Regex> = OnceLock::new();

fn phrase_re() -> &'static Regex {
    PHRASE_RE.get_or_init(|| {
        Regex::new(
            r"\b(?i:depends\s+on|dependent\s+on|after|requires|blocked\s+by|following)\s*:?\s+((?:[A-Z][A-Z0-9]*(?:-[A-Z0-9]+)*:)?[A-Z][A-Z0-9]*(?:-[A-Z0-9]+)*-\d+)\b",
        )
        .unwrap()
    })
}

fn bare_re() -> &'static Regex {
    BARE_RE.get_or_init(|| {
        Regex::new(r"\b((?:[A-Z][A-Z0-9]*(?:-[A-Z0-9]+)*:)?US-\d+)\b").unwrap()
    })
}

/// Identifier-shaped references in free text, in order of first appearance.
pub fn extract_text_dependencies(text: &str) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = Vec::new();
    for re in [phrase_re(), bare_re()] {
        for cap in re.captures_iter(text) {
            if let Some(m) = cap.get(1) {
                hits.push((m.start(), m.as_str().to_string()));
            }
        }
    }
    hits.sort_by_key(|(pos, _)| *pos);
    dedup(hits.into_iter().map(|(_, r)| r).collect())
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push('\n');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

/// References mined from the narrative fields of `story`.
pub fn narrative_dependencies(story: &Value) -> Vec<String> {
    let mut text = String::new();
    for field in NARRATIVE_FIELDS {
        if let Some(value) = story.get(*field) {
            collect_text(value, &mut text);
        }
    }
    extract_text_dependencies(&text)
}

fn dedup(refs: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    refs.into_iter().filter(|r| seen.insert(r.clone())).collect()
}
