//! Work-item tier routing.
//!
//! Every submitted unit of work is classified into one of three tiers from its
//! estimated size, then escalated to Tier 3 when its type, tags, or description
//! carry risk. Thresholds come from the store through a [`ThresholdSource`];
//! when the store is unreachable or misconfigured the router falls back to
//! conservative values instead of failing.

pub mod cache;

pub use cache::ThresholdCache;

use crate::store::ThresholdSource;
use crate::types::Tier;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub const FALLBACK_ID: &str = "fallback";
pub const AMBIGUOUS_ID: &str = "ambiguous";
pub const FALLBACK_TIER1_MAX_LOC: u32 = 30;
pub const FALLBACK_TIER2_MAX_LOC: u32 = 75;
pub const TIER2_MIN_COMPLIANCE_SCORE: u32 = 70;

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// One active threshold row from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub id: String,
    #[serde(alias = "tier1_max_loc")]
    pub tier1_max_loc: u32,
    #[serde(alias = "tier2_max_loc")]
    pub tier2_max_loc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOrigin {
    /// Exactly one active row.
    Store,
    /// No active rows, or the query failed.
    Fallback,
    /// More than one active row.
    Ambiguous,
}

/// The thresholds a routing decision was made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedThresholds {
    pub id: String,
    pub tier1_max_loc: u32,
    pub tier2_max_loc: u32,
    pub origin: ThresholdOrigin,
}

impl ResolvedThresholds {
    pub fn fallback() -> Self {
        Self {
            id: FALLBACK_ID.to_string(),
            tier1_max_loc: FALLBACK_TIER1_MAX_LOC,
            tier2_max_loc: FALLBACK_TIER2_MAX_LOC,
            origin: ThresholdOrigin::Fallback,
        }
    }

    /// Collapse to 0/0 so any item with a nonzero estimate lands in Tier 3.
    pub fn ambiguous() -> Self {
        Self {
            id: AMBIGUOUS_ID.to_string(),
            tier1_max_loc: 0,
            tier2_max_loc: 0,
            origin: ThresholdOrigin::Ambiguous,
        }
    }

    /// Interpret a successful fetch of the active rows.
    pub fn from_rows(mut rows: Vec<ThresholdConfig>) -> Self {
        match rows.len() {
            0 => {
                tracing::warn!("no active threshold configuration; using fallback thresholds");
                Self::fallback()
            }
            1 => {
                let row = rows.remove(0);
                if row.tier1_max_loc >= row.tier2_max_loc {
                    tracing::warn!(
                        id = %row.id,
                        tier1 = row.tier1_max_loc,
                        tier2 = row.tier2_max_loc,
                        "active thresholds are not increasing; Tier 2 is unreachable"
                    );
                }
                Self {
                    id: row.id,
                    tier1_max_loc: row.tier1_max_loc,
                    tier2_max_loc: row.tier2_max_loc,
                    origin: ThresholdOrigin::Store,
                }
            }
            n => {
                let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
                tracing::warn!(
                    count = n,
                    ids = ?ids,
                    "multiple active threshold configurations; routing fail-closed"
                );
                Self::ambiguous()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor and decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkItemDescriptor {
    pub estimated_loc: u32,
    #[serde(rename = "type")]
    pub item_type: String,
    pub risk_tags: Vec<String>,
    pub description: String,
    pub entry_point: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub tier: Tier,
    pub tier_label: String,
    pub work_item_type: String,
    pub requires_compliance_rubric: bool,
    pub compliance_min_score: Option<u32>,
    pub requires_lead_review: bool,
    pub sd_type: Option<String>,
    pub threshold_id: String,
    pub tier1_max_loc: u32,
    pub tier2_max_loc: u32,
    pub escalation_reason: Option<String>,
    pub decision_latency_ms: f64,
}

// ---------------------------------------------------------------------------
// Risk detection
// ---------------------------------------------------------------------------

const RISK_PHRASES: &[&str] = &[
    // schema mutation
    "alter table",
    "drop table",
    "drop column",
    "create table",
    "add column",
    "truncate",
    "migration",
    "schema change",
    "rls policy",
    // authentication
    "auth",
    "authentication",
    "authorization",
    "login",
    "password",
    "credential",
    "oauth",
    "jwt",
    "session token",
];

static RISK_RE: OnceLock<Regex> = OnceLock::new();

fn risk_re() -> &'static Regex {
    RISK_RE.get_or_init(|| {
        let alternatives: Vec<String> = RISK_PHRASES
            .iter()
            .map(|p| {
                p.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).unwrap()
    })
}

/// The first risk phrase in `description`, normalized to lowercase with
/// single spaces.
pub fn find_risk_phrase(description: &str) -> Option<String> {
    risk_re().find(description).map(|m| {
        m.as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    })
}

/// Reasons the item must go to Tier 3 regardless of size.
fn risk_triggers(item: &WorkItemDescriptor) -> Vec<String> {
    let mut triggers = Vec::new();
    if item.item_type.trim().eq_ignore_ascii_case("feature") {
        triggers.push("type 'feature' always requires a strategic directive".to_string());
    }
    if item
        .risk_tags
        .iter()
        .any(|t| t.trim().eq_ignore_ascii_case("security"))
    {
        triggers.push("risk tag 'security'".to_string());
    }
    if let Some(phrase) = find_risk_phrase(&item.description) {
        triggers.push(format!("description mentions high-risk keyword '{phrase}'"));
    }
    triggers
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

fn base_tier(loc: u32, thresholds: &ResolvedThresholds) -> Tier {
    if loc <= thresholds.tier1_max_loc {
        Tier::AutoApprove
    } else if loc <= thresholds.tier2_max_loc {
        Tier::Standard
    } else {
        Tier::Directive
    }
}

/// Classify `item` against already-resolved thresholds. Pure apart from the
/// latency stamp, which [`TierRouter::route`] overwrites with the full cost.
pub fn decide(item: &WorkItemDescriptor, thresholds: &ResolvedThresholds) -> RoutingDecision {
    let started = Instant::now();
    let loc = item.estimated_loc;
    let mut reasons = Vec::new();

    let mut tier = base_tier(loc, thresholds);
    if tier == Tier::Directive {
        reasons.push(match thresholds.origin {
            ThresholdOrigin::Ambiguous => format!(
                "multiple active threshold configurations; estimated {loc} LOC routed fail-closed"
            ),
            _ => format!(
                "estimated {loc} LOC exceeds Tier 2 ceiling of {}",
                thresholds.tier2_max_loc
            ),
        });
    }

    let triggers = risk_triggers(item);
    if !triggers.is_empty() {
        tier = Tier::Directive;
        reasons.extend(triggers);
    }

    let (requires_compliance_rubric, compliance_min_score, requires_lead_review) = match tier {
        Tier::AutoApprove => (false, None, false),
        Tier::Standard => (true, Some(TIER2_MIN_COMPLIANCE_SCORE), false),
        Tier::Directive => (false, None, true),
    };
    let sd_type = (tier == Tier::Directive).then(|| {
        let t = item.item_type.trim();
        if t.is_empty() {
            "feature".to_string()
        } else {
            t.to_string()
        }
    });

    RoutingDecision {
        tier,
        tier_label: tier.label().to_string(),
        work_item_type: tier.work_item_type().to_string(),
        requires_compliance_rubric,
        compliance_min_score,
        requires_lead_review,
        sd_type,
        threshold_id: thresholds.id.clone(),
        tier1_max_loc: thresholds.tier1_max_loc,
        tier2_max_loc: thresholds.tier2_max_loc,
        escalation_reason: (!reasons.is_empty()).then(|| reasons.join("; ")),
        decision_latency_ms: elapsed_ms(started),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

// ---------------------------------------------------------------------------
// TierRouter
// ---------------------------------------------------------------------------

pub struct TierRouter<S> {
    source: S,
    cache: Arc<ThresholdCache>,
}

impl<S: ThresholdSource> TierRouter<S> {
    pub fn new(source: S) -> Self {
        Self::with_cache(source, Arc::new(ThresholdCache::default()))
    }

    pub fn with_cache(source: S, cache: Arc<ThresholdCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<ThresholdCache> {
        &self.cache
    }

    /// Drop the cached thresholds so the next call fetches again.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Thresholds for the next decision: cached when fresh, otherwise fetched.
    /// Store errors yield the fallback and are not cached.
    pub fn thresholds(&self) -> ResolvedThresholds {
        let generation = self.cache.generation();
        if let Some(cached) = self.cache.get() {
            tracing::debug!(id = %cached.id, "threshold cache hit");
            return cached;
        }
        match self.source.fetch_active() {
            Ok(rows) => {
                let resolved = ResolvedThresholds::from_rows(rows);
                if !self.cache.put(generation, resolved.clone()) {
                    tracing::debug!(id = %resolved.id, "cache invalidated during fetch; not storing");
                }
                resolved
            }
            Err(e) => {
                tracing::warn!(error = %e, "threshold fetch failed; using fallback thresholds");
                ResolvedThresholds::fallback()
            }
        }
    }

    pub fn route(&self, item: &WorkItemDescriptor) -> RoutingDecision {
        let started = Instant::now();
        let thresholds = self.thresholds();
        let mut decision = decide(item, &thresholds);
        decision.decision_latency_ms = elapsed_ms(started);
        tracing::info!(
            tier = %decision.tier,
            loc = item.estimated_loc,
            threshold_id = %decision.threshold_id,
            entry_point = %item.entry_point,
            escalated = decision.escalation_reason.is_some(),
            "routed work item"
        );
        decision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GovernError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Rows(Vec<ThresholdConfig>),
        Fail,
    }

    struct FakeSource {
        reply: Mutex<Reply>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn rows(rows: Vec<ThresholdConfig>) -> Self {
            Self {
                reply: Mutex::new(Reply::Rows(rows)),
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Mutex::new(Reply::Fail),
                fetches: AtomicUsize::new(0),
            }
        }

        fn set_rows(&self, rows: Vec<ThresholdConfig>) {
            *self.reply.lock().unwrap() = Reply::Rows(rows);
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ThresholdSource for &FakeSource {
        fn fetch_active(&self) -> Result<Vec<ThresholdConfig>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &*self.reply.lock().unwrap() {
                Reply::Rows(rows) => Ok(rows.clone()),
                Reply::Fail => Err(GovernError::Store("connection refused".to_string())),
            }
        }
    }

    fn row(id: &str, t1: u32, t2: u32) -> ThresholdConfig {
        ThresholdConfig {
            id: id.to_string(),
            tier1_max_loc: t1,
            tier2_max_loc: t2,
        }
    }

    fn item(loc: u32, item_type: &str) -> WorkItemDescriptor {
        WorkItemDescriptor {
            estimated_loc: loc,
            item_type: item_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn loc_bands_with_inclusive_ceilings() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);
        for (loc, tier) in [
            (0, Tier::AutoApprove),
            (10, Tier::AutoApprove),
            (30, Tier::AutoApprove),
            (31, Tier::Standard),
            (50, Tier::Standard),
            (75, Tier::Standard),
            (76, Tier::Directive),
            (100, Tier::Directive),
        ] {
            assert_eq!(router.route(&item(loc, "bug")).tier, tier, "loc={loc}");
        }
    }

    #[test]
    fn tier_outcomes_carry_workflow_requirements() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);

        let t1 = router.route(&item(10, "bug"));
        assert_eq!(t1.tier_label, "Tier 1: Auto-Approve Quick Fix");
        assert_eq!(t1.work_item_type, "quick-fix");
        assert!(!t1.requires_compliance_rubric);
        assert!(!t1.requires_lead_review);
        assert!(t1.sd_type.is_none());
        assert!(t1.escalation_reason.is_none());
        assert_eq!(t1.threshold_id, "cfg-1");

        let t2 = router.route(&item(50, "bug"));
        assert!(t2.requires_compliance_rubric);
        assert_eq!(t2.compliance_min_score, Some(70));
        assert!(!t2.requires_lead_review);

        let t3 = router.route(&item(100, "enhancement"));
        assert_eq!(t3.tier, Tier::Directive);
        assert_eq!(t3.work_item_type, "directive");
        assert!(t3.requires_lead_review);
        assert_eq!(t3.sd_type.as_deref(), Some("enhancement"));
        assert!(t3.escalation_reason.unwrap().contains("100 LOC"));
    }

    #[test]
    fn feature_type_always_escalates() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);
        let d = router.route(&item(5, "feature"));
        assert_eq!(d.tier, Tier::Directive);
        assert_eq!(d.sd_type.as_deref(), Some("feature"));
        assert!(d.escalation_reason.unwrap().contains("feature"));
    }

    #[test]
    fn security_tag_always_escalates() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);
        let mut wi = item(5, "bug");
        wi.risk_tags = vec!["ui".to_string(), "security".to_string()];
        let d = router.route(&wi);
        assert_eq!(d.tier, Tier::Directive);
        assert!(d.escalation_reason.unwrap().contains("security"));
    }

    #[test]
    fn risk_phrases_in_description_escalate() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);
        let mut wi = item(5, "bug");
        wi.description = "Fix typo, then ALTER  TABLE users add a flag".to_string();
        let d = router.route(&wi);
        assert_eq!(d.tier, Tier::Directive);
        assert_eq!(d.sd_type.as_deref(), Some("bug"));
        assert!(d.escalation_reason.unwrap().contains("'alter table'"));
    }

    #[test]
    fn risk_phrases_are_word_bounded() {
        assert_eq!(find_risk_phrase("update the author list"), None);
        assert_eq!(find_risk_phrase("rotate JWT signing"), Some("jwt".to_string()));
        assert_eq!(
            find_risk_phrase("Authentication flow cleanup"),
            Some("authentication".to_string())
        );
        assert_eq!(find_risk_phrase("polish button colors"), None);
    }

    #[test]
    fn escalation_never_lowers_a_tier() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);
        let mut wi = item(500, "polish");
        wi.description = "rename the login page".to_string();
        let d = router.route(&wi);
        assert_eq!(d.tier, Tier::Directive);
        let reason = d.escalation_reason.unwrap();
        assert!(reason.contains("500 LOC"));
        assert!(reason.contains("login"));
    }

    #[test]
    fn second_call_hits_cache_until_invalidated() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let router = TierRouter::new(&source);
        assert_eq!(router.route(&item(50, "bug")).tier, Tier::Standard);
        assert_eq!(router.route(&item(50, "bug")).tier, Tier::Standard);
        assert_eq!(source.fetches(), 1);

        source.set_rows(vec![row("cfg-2", 60, 120)]);
        router.invalidate_cache();
        let d = router.route(&item(50, "bug"));
        assert_eq!(source.fetches(), 2);
        assert_eq!(d.tier, Tier::AutoApprove);
        assert_eq!(d.threshold_id, "cfg-2");
    }

    struct GatedSource {
        rows: Mutex<Vec<ThresholdConfig>>,
        started: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl ThresholdSource for &GatedSource {
        fn fetch_active(&self) -> Result<Vec<ThresholdConfig>> {
            let rows = self.rows.lock().unwrap().clone();
            self.started.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(rows)
        }
    }

    #[test]
    fn invalidation_during_fetch_discards_the_stale_answer() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let source = GatedSource {
            rows: Mutex::new(vec![row("old", 30, 75)]),
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        let router = TierRouter::new(&source);

        std::thread::scope(|s| {
            let in_flight = s.spawn(|| router.thresholds());
            started_rx.recv().unwrap();
            *source.rows.lock().unwrap() = vec![row("new", 60, 120)];
            router.invalidate_cache();
            release_tx.send(()).unwrap();
            assert_eq!(in_flight.join().unwrap().id, "old");
        });
        assert!(router.cache().get().is_none());

        release_tx.send(()).unwrap();
        assert_eq!(router.thresholds().id, "new");
        started_rx.recv().unwrap();
        assert_eq!(router.cache().get().map(|t| t.id), Some("new".to_string()));
    }

    #[test]
    fn zero_rows_use_fallback() {
        let source = FakeSource::rows(vec![]);
        let d = TierRouter::new(&source).route(&item(50, "bug"));
        assert_eq!(d.threshold_id, "fallback");
        assert_eq!((d.tier1_max_loc, d.tier2_max_loc), (30, 75));
        assert_eq!(d.tier, Tier::Standard);
    }

    #[test]
    fn store_error_uses_fallback_and_is_not_cached() {
        let source = FakeSource::failing();
        let router = TierRouter::new(&source);
        let d = router.route(&item(10, "bug"));
        assert_eq!(d.threshold_id, "fallback");
        assert_eq!((d.tier1_max_loc, d.tier2_max_loc), (30, 75));
        assert!(!router.cache().is_fresh());

        source.set_rows(vec![row("cfg-1", 5, 8)]);
        let d = router.route(&item(10, "bug"));
        assert_eq!(source.fetches(), 2);
        assert_eq!(d.threshold_id, "cfg-1");
        assert_eq!(d.tier, Tier::Directive);
    }

    #[test]
    fn multiple_active_rows_route_any_nonzero_loc_to_tier_three() {
        let source = FakeSource::rows(vec![row("a", 30, 75), row("b", 40, 90)]);
        let router = TierRouter::new(&source);
        for loc in [1, 2, 10, 30, 75, 10_000] {
            let d = router.route(&item(loc, "bug"));
            assert_eq!(d.tier, Tier::Directive, "loc={loc}");
            assert_eq!(d.threshold_id, "ambiguous");
            assert_eq!((d.tier1_max_loc, d.tier2_max_loc), (0, 0));
            assert!(d.escalation_reason.unwrap().contains("multiple active"));
        }
    }

    #[test]
    fn shared_cache_serves_independent_routers() {
        let source = FakeSource::rows(vec![row("cfg-1", 30, 75)]);
        let cache = Arc::new(ThresholdCache::default());
        let a = TierRouter::with_cache(&source, Arc::clone(&cache));
        let b = TierRouter::with_cache(&source, Arc::clone(&cache));
        a.route(&item(1, "bug"));
        b.route(&item(1, "bug"));
        assert_eq!(source.fetches(), 1);
    }

    #[test]
    fn empty_type_on_tier_three_defaults_sd_type() {
        let d = decide(&item(200, ""), &ResolvedThresholds::fallback());
        assert_eq!(d.sd_type.as_deref(), Some("feature"));
    }

    #[test]
    fn decision_serializes_camel_case() {
        let d = decide(&item(10, "bug"), &ResolvedThresholds::fallback());
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["tier"], 1);
        assert_eq!(json["thresholdId"], "fallback");
        assert_eq!(json["tier1MaxLoc"], 30);
        assert!(json["sdType"].is_null());
        assert!(json["complianceMinScore"].is_null());
        assert!(json.get("decisionLatencyMs").is_some());
    }

    #[test]
    fn descriptor_defaults_missing_fields() {
        let wi: WorkItemDescriptor =
            serde_json::from_str(r#"{"type":"bug","riskTags":["perf"]}"#).unwrap();
        assert_eq!(wi.estimated_loc, 0);
        assert_eq!(wi.item_type, "bug");
        assert_eq!(wi.risk_tags, vec!["perf"]);
    }
}
