use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use govern_core::config::Config;
use govern_core::error::GovernError;
use govern_core::router::{RoutingDecision, ThresholdCache, TierRouter, WorkItemDescriptor};
use govern_core::store::{RestStore, StoreCredentials, ThresholdSource, UnavailableSource};
use std::path::Path;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Estimated lines of code the change touches
    #[arg(long, default_value_t = 0)]
    pub loc: u32,

    /// Work item category (bug, feature, polish, enhancement, ...)
    #[arg(long = "type", value_name = "TYPE", default_value = "")]
    pub item_type: String,

    /// Risk tag; repeat for several (e.g. --risk-tag security)
    #[arg(long = "risk-tag", value_name = "TAG")]
    pub risk_tags: Vec<String>,

    /// Free-text description scanned for risk keywords
    #[arg(long, default_value = "")]
    pub description: String,

    /// Who is submitting the item
    #[arg(long, default_value = "cli")]
    pub entry_point: String,
}

impl From<RouteArgs> for WorkItemDescriptor {
    fn from(args: RouteArgs) -> Self {
        WorkItemDescriptor {
            estimated_loc: args.loc,
            item_type: args.item_type,
            risk_tags: args.risk_tags,
            description: args.description,
            entry_point: args.entry_point,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, args: RouteArgs, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(root).context("failed to load config")?;
    let cache = Arc::new(ThresholdCache::from_ttl_secs(config.router.cache_ttl_secs));
    let item = WorkItemDescriptor::from(args);

    // Missing credentials are not fatal here: the router answers with its
    // fallback thresholds.
    let decision = match StoreCredentials::from_env() {
        Ok(credentials) => {
            let store = RestStore::new(credentials, config.store.clone())
                .context("failed to build store client")?;
            route_with(store, cache, &item)
        }
        Err(e @ GovernError::MissingEnv(_)) => route_with(
            UnavailableSource {
                reason: e.to_string(),
            },
            cache,
            &item,
        ),
        Err(e) => return Err(e).context("invalid store configuration"),
    };

    if json {
        print_json(&decision)?;
    } else {
        print_decision(&decision);
    }
    Ok(0)
}

fn route_with<S: ThresholdSource>(
    source: S,
    cache: Arc<ThresholdCache>,
    item: &WorkItemDescriptor,
) -> RoutingDecision {
    TierRouter::with_cache(source, cache).route(item)
}

fn print_decision(d: &RoutingDecision) {
    println!("{}", d.tier_label);
    println!();

    let mut rows = vec![
        vec!["tier".to_string(), d.tier.to_string()],
        vec!["work item type".to_string(), d.work_item_type.clone()],
        vec![
            "compliance rubric".to_string(),
            match d.compliance_min_score {
                Some(min) => format!("required (min score {min})"),
                None => yes_no(d.requires_compliance_rubric).to_string(),
            },
        ],
        vec!["lead review".to_string(), yes_no(d.requires_lead_review).to_string()],
    ];
    if let Some(sd_type) = &d.sd_type {
        rows.push(vec!["directive type".to_string(), sd_type.clone()]);
    }
    rows.push(vec![
        "thresholds".to_string(),
        format!(
            "{} (tier1 <= {}, tier2 <= {})",
            d.threshold_id, d.tier1_max_loc, d.tier2_max_loc
        ),
    ]);
    if let Some(reason) = &d.escalation_reason {
        rows.push(vec!["escalation".to_string(), reason.clone()]);
    }
    print_table(&["FIELD", "VALUE"], rows);
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
