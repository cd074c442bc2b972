use crate::drift::{DriftConfig, PatternSet};
use crate::error::Result;
use crate::paths;
use crate::store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RouterConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Seconds a fetched threshold row stays cached. 0 keeps it until the
    /// cache is invalidated.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub drift: DriftConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            store: StoreConfig::default(),
            router: RouterConfig::default(),
            drift: DriftConfig::default(),
        }
    }
}

impl Config {
    /// Load `.govern/config.yaml`, or the defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        // Forbidden rules
        let mut seen = HashSet::new();
        for rule in &self.drift.rules {
            if !seen.insert(rule.name.as_str()) {
                warn(
                    WarnLevel::Warning,
                    format!("duplicate drift rule name '{}'", rule.name),
                );
            }
            if rule.patterns.is_empty() {
                warn(
                    WarnLevel::Warning,
                    format!("drift rule '{}' has no patterns and never matches", rule.name),
                );
            }
            if let Err(e) = PatternSet::compile(&rule.patterns) {
                warn(WarnLevel::Error, format!("drift rule '{}': {e}", rule.name));
            }
        }
        if let Err(e) = PatternSet::compile(&self.drift.allowlist) {
            warn(WarnLevel::Error, format!("drift allowlist: {e}"));
        }

        // Boundary domains
        if let Some(boundary) = &self.drift.boundary {
            for domain in [&boundary.engineering, &boundary.application] {
                if domain.roots.is_empty() {
                    warn(
                        WarnLevel::Warning,
                        format!("boundary domain '{}' has no roots", domain.name),
                    );
                }
            }
            for (a, b) in boundary.overlapping_roots() {
                warn(
                    WarnLevel::Error,
                    format!(
                        "boundary roots overlap: '{a}' ({}) and '{b}' ({})",
                        boundary.engineering.name, boundary.application.name
                    ),
                );
            }
            if boundary.extensions.is_empty() {
                warn(
                    WarnLevel::Warning,
                    "boundary check has no source extensions and scans nothing".to_string(),
                );
            }
        }

        // Store / router
        if let Some(secs) = self.store.timeout_secs {
            if !(1..=120).contains(&secs) {
                warn(
                    WarnLevel::Warning,
                    format!("store.timeout_secs {secs} is outside 1..=120 and will be clamped"),
                );
            }
        }
        if self.router.cache_ttl_secs > 86_400 {
            warn(
                WarnLevel::Warning,
                format!(
                    "router.cache_ttl_secs {} exceeds one day; threshold edits may go unnoticed",
                    self.router.cache_ttl_secs
                ),
            );
        }

        warnings
    }
}
