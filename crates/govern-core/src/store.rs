//! Access to the shared relational store.
//!
//! The engine reads active threshold rows and appends compliance alerts. Both
//! seams are traits so the router and the drift detector can be driven by
//! in-memory doubles; [`RestStore`] is the production implementation that
//! speaks the PostgREST dialect exposed by the hosted database.

use crate::drift::ComplianceAlert;
use crate::error::{GovernError, Result};
use crate::router::ThresholdConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const URL_ENV: &str = "SUPABASE_URL";
pub const KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const TIMEOUT_ENV: &str = "GOVERN_STORE_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

pub trait ThresholdSource: Send + Sync {
    /// Every row currently flagged active. Zero, one, or many rows are all
    /// valid answers; interpreting them is the router's job.
    fn fetch_active(&self) -> Result<Vec<ThresholdConfig>>;
}

pub trait AlertSink: Send + Sync {
    fn record(&self, alert: &ComplianceAlert) -> Result<()>;
}

/// A threshold source for when no store is configured. Every fetch fails,
/// which the router answers with its built-in fallback.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    pub reason: String,
}

impl ThresholdSource for UnavailableSource {
    fn fetch_active(&self) -> Result<Vec<ThresholdConfig>> {
        Err(GovernError::Store(self.reason.clone()))
    }
}

/// Discards alerts. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AlertSink for NullSink {
    fn record(&self, alert: &ComplianceAlert) -> Result<()> {
        tracing::debug!(alert_type = %alert.alert_type, "dry run: alert not persisted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_thresholds_table")]
    pub thresholds_table: String,
    #[serde(default = "default_alerts_table")]
    pub alerts_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_thresholds_table() -> String {
    "work_item_thresholds".to_string()
}

fn default_alerts_table() -> String {
    "compliance_alerts".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            thresholds_table: default_thresholds_table(),
            alerts_table: default_alerts_table(),
            timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// StoreCredentials
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StoreCredentials {
    pub base_url: String,
    pub api_key: String,
    /// Timeout from the environment, overriding the config file.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl StoreCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = non_empty(lookup(URL_ENV)).ok_or(GovernError::MissingEnv(URL_ENV))?;
        let api_key = non_empty(lookup(KEY_ENV))
            .or_else(|| non_empty(lookup(ANON_KEY_ENV)))
            .ok_or(GovernError::MissingEnv(KEY_ENV))?;
        let timeout = match non_empty(lookup(TIMEOUT_ENV)) {
            Some(raw) => Some(Duration::from_secs(parse_timeout(&raw)?)),
            None => None,
        };
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }
}

fn parse_timeout(raw: &str) -> Result<u64> {
    let secs: u64 = raw.parse().map_err(|_| {
        GovernError::InvalidConfig(format!("{TIMEOUT_ENV} must be a whole number of seconds, got '{raw}'"))
    })?;
    Ok(secs.clamp(1, MAX_TIMEOUT_SECS))
}

// ---------------------------------------------------------------------------
// RestStore
// ---------------------------------------------------------------------------

/// Raw threshold row as the store returns it. Accepts snake_case columns and
/// the camelCase shape external scripts use.
#[derive(Debug, Deserialize)]
struct ThresholdRow {
    id: serde_json::Value,
    #[serde(alias = "tier1MaxLoc", alias = "tier_1_max_loc")]
    tier1_max_loc: u32,
    #[serde(alias = "tier2MaxLoc", alias = "tier_2_max_loc")]
    tier2_max_loc: u32,
}

impl From<ThresholdRow> for ThresholdConfig {
    fn from(row: ThresholdRow) -> Self {
        let id = match row.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        ThresholdConfig {
            id,
            tier1_max_loc: row.tier1_max_loc,
            tier2_max_loc: row.tier2_max_loc,
        }
    }
}

pub struct RestStore {
    base_url: String,
    api_key: String,
    config: StoreConfig,
    client: reqwest::blocking::Client,
}

impl RestStore {
    pub fn new(credentials: StoreCredentials, config: StoreConfig) -> Result<Self> {
        let timeout = credentials.timeout.unwrap_or_else(|| {
            Duration::from_secs(
                config
                    .timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS)
                    .clamp(1, MAX_TIMEOUT_SECS),
            )
        });
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: credentials.base_url,
            api_key: credentials.api_key,
            config,
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(GovernError::StoreStatus {
            status: status.as_u16(),
            body,
        })
    }
}

impl ThresholdSource for RestStore {
    fn fetch_active(&self) -> Result<Vec<ThresholdConfig>> {
        let url = format!(
            "{}?select=id,tier1_max_loc,tier2_max_loc&is_active=eq.true",
            self.table_url(&self.config.thresholds_table)
        );
        let resp = self.authorized(self.client.get(&url)).send()?;
        let rows: Vec<ThresholdRow> = Self::check(resp)?.json()?;
        tracing::debug!(rows = rows.len(), "fetched active threshold rows");
        Ok(rows.into_iter().map(ThresholdConfig::from).collect())
    }
}

impl AlertSink for RestStore {
    fn record(&self, alert: &ComplianceAlert) -> Result<()> {
        let url = self.table_url(&self.config.alerts_table);
        let resp = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(alert)
            .send()?;
        Self::check(resp)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
