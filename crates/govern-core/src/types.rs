use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Only critical findings block CI. Everything else is advisory.
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Critical)
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "ℹ️ ",
            Severity::Warning => "⚠️ ",
            Severity::Error => "❌",
            Severity::Critical => "🚨",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Complexity/risk classification of a unit of work. Serialized as the bare
/// number `1`, `2` or `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    AutoApprove = 1,
    Standard = 2,
    Directive = 3,
}

impl Tier {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::AutoApprove => "Tier 1: Auto-Approve Quick Fix",
            Tier::Standard => "Tier 2: Standard Quick Fix",
            Tier::Directive => "Tier 3: Strategic Directive",
        }
    }

    /// Coarse workflow the item enters: the quick-fix lane or the full
    /// strategic-directive lane.
    pub fn work_item_type(self) -> &'static str {
        match self {
            Tier::AutoApprove | Tier::Standard => "quick-fix",
            Tier::Directive => "directive",
        }
    }
}

impl From<Tier> for u8 {
    fn from(t: Tier) -> u8 {
        t.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Tier::AutoApprove),
            2 => Ok(Tier::Standard),
            3 => Ok(Tier::Directive),
            _ => Err(format!("invalid tier {n}: must be 1, 2, or 3")),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
