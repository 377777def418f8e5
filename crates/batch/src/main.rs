//! Nightly batch: load a catalog dump, run the daily analysis for one date,
//! print the results as JSON.

mod cli;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;

use bookwise_analytics::{OptimalStockRecommendation, OptimizationConstraints, OptimizationResult};
use bookwise_catalog::InMemoryDataAccessor;
use bookwise_infra::{DailyAnalysisReport, InMemoryAggregationCache, IntelligenceConfig, InventoryIntelligence};

use cli::BatchArgs;

#[derive(Debug, Serialize)]
struct BatchOutput {
    report: DailyAnalysisReport,
    reorder: Vec<OptimalStockRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimization: Option<OptimizationResult>,
}

fn main() -> anyhow::Result<()> {
    bookwise_observability::init();

    let args = BatchArgs::parse(std::env::args().skip(1))?;
    let config = IntelligenceConfig::from_env().context("loading configuration")?;

    let raw = std::fs::read_to_string(&args.catalog)
        .with_context(|| format!("reading catalog {}", args.catalog))?;
    let accessor = InMemoryDataAccessor::from_json(&raw)?;

    let horizon = config.windows.horizon_periods;
    let svc = InventoryIntelligence::new(accessor, config)?
        .with_cache(Arc::new(InMemoryAggregationCache::new()));

    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    tracing::info!(catalog = %args.catalog, as_of = %as_of, "batch run starting");

    let report = svc.run_daily_analysis(as_of)?;
    let reorder = svc.reorder_list(as_of)?;
    let optimization = match args.budget {
        Some(budget) => {
            let constraints = OptimizationConstraints::new(budget, args.max_items);
            Some(svc.optimize(as_of, horizon, &constraints)?)
        }
        None => None,
    };

    let output = BatchOutput {
        report,
        reorder,
        optimization,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
