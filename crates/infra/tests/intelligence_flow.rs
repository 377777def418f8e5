//! End-to-end flow: accessor -> engines -> cache -> repositories.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, TimeZone, Utc};

use bookwise_analytics::{OptimizationConstraints, RiskLevel, StockStatus};
use bookwise_catalog::{Book, Category, InMemoryDataAccessor, InventorySnapshot, SalesObservation, TechnologyLevel};
use bookwise_core::BookId;
use bookwise_infra::{
    AggregationCache, AggregationKey, AnalysisPool, CacheEntry, CacheError, InMemoryAggregationCache,
    IntelligenceConfig, InventoryFilter, InventoryIntelligence, ManualClock,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn as_of() -> NaiveDate {
    d(2026, 1, 15)
}

fn book(n: u128, category: Category, price: f64) -> Book {
    Book {
        id: BookId::from_u128(n),
        title: format!("Book {n}"),
        publisher: "Acme Press".to_string(),
        category,
        technology_level: TechnologyLevel::Established,
        price,
        publication_date: d(2023, 3, 1),
    }
}

/// Two stocked titles (one short, one overstocked) and one without inventory.
fn catalog() -> InMemoryDataAccessor {
    let accessor = InMemoryDataAccessor::new();
    accessor.upsert_book(book(1, Category::Databases, 40.0));
    accessor.upsert_book(book(2, Category::Security, 60.0));
    accessor.upsert_book(book(3, Category::ComputerScience, 80.0));
    for month in 1..=12 {
        accessor.record_sale(SalesObservation::new(BookId::from_u128(1), d(2025, month, 10), 30));
        accessor.record_sale(SalesObservation::new(BookId::from_u128(2), d(2025, month, 12), 2));
        accessor.record_sale(SalesObservation::new(BookId::from_u128(3), d(2025, month, 20), 5));
    }
    accessor.set_inventory(InventorySnapshot::new(BookId::from_u128(1), 2, 0));
    accessor.set_inventory(InventorySnapshot::new(BookId::from_u128(2), 400, 0));
    accessor
}

fn service() -> InventoryIntelligence<InMemoryDataAccessor> {
    InventoryIntelligence::new(catalog(), IntelligenceConfig::default()).unwrap()
}

/// Every operation fails, as if the backend were down.
struct BrokenCache;

impl AggregationCache for BrokenCache {
    fn get(&self, _key: &AggregationKey) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    fn put(&self, _: &AggregationKey, _: NaiveDate, _: String, _: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    fn invalidate(&self, _key: &AggregationKey) -> Result<bool, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    fn sweep_expired(&self) -> Result<usize, CacheError> {
        Err(CacheError::backend("sweep timed out"))
    }
}

#[test]
fn daily_analysis_covers_the_catalog() {
    let svc = service();
    let report = svc.run_daily_analysis(as_of()).unwrap();

    assert_eq!(report.as_of, as_of());
    assert_eq!(report.forecasts.processed, 3);
    assert_eq!(report.classification.total_books, 3);
    assert_eq!(report.risk_levels.values().sum::<usize>(), 3);
    // Book 3 has no inventory record, so no recommendation.
    assert_eq!(report.recommendations, 2);
    assert_eq!(report.stock.processed, 2);
    assert_eq!(report.stock.skipped, 1);
    assert_eq!(report.stock.failed, 0);

    let reorder = svc.reorder_list(as_of()).unwrap();
    assert_eq!(reorder.len(), 1);
    assert_eq!(reorder[0].book_id, BookId::from_u128(1));

    let over = svc.recommendations_by_status(as_of(), StockStatus::Overstock).unwrap();
    assert_eq!(over.len(), 1);
    assert_eq!(over[0].book_id, BookId::from_u128(2));
}

#[test]
fn repeating_a_daily_run_replaces_results() {
    let svc = service();
    svc.run_daily_analysis(as_of()).unwrap();
    svc.run_daily_analysis(as_of()).unwrap();

    assert_eq!(svc.latest_forecasts(BookId::from_u128(1)).unwrap().len(), 5);
    assert_eq!(svc.classifications_in_cell(as_of(), None, None).unwrap().len(), 3);
    let assessed: usize = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High]
        .into_iter()
        .map(|level| svc.assessments_by_risk(as_of(), level).unwrap().len())
        .sum();
    assert_eq!(assessed, 3);
}

#[test]
fn broken_cache_degrades_to_recomputation() {
    let svc = service().with_cache(Arc::new(BrokenCache));

    let report = svc.run_daily_analysis(as_of()).unwrap();
    assert_eq!(report.recommendations, 2);
    assert_eq!(svc.sweep_cache(), 0);

    let purged = svc.purge_older_than(d(2020, 1, 1)).unwrap();
    assert_eq!(purged.cache_entries, 0);
}

#[test]
fn shared_cache_serves_a_second_instance() {
    let cache = Arc::new(InMemoryAggregationCache::new());
    let first = service().with_cache(cache.clone());
    first.forecast_book(BookId::from_u128(1), as_of(), 3).unwrap();
    assert!(!cache.is_empty());

    let second = service().with_cache(cache.clone());
    let run = second.forecast_book(BookId::from_u128(1), as_of(), 3).unwrap();
    assert_eq!(run.results.len(), 5);
    // Served from cache: the second instance computed nothing itself.
    assert!(second.latest_forecasts(BookId::from_u128(1)).unwrap().is_empty());
}

#[test]
fn expired_entries_are_recomputed() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 6, 0, 0).unwrap()));
    let cache = Arc::new(InMemoryAggregationCache::with_clock(clock.clone()));
    let first = service().with_cache(cache.clone());
    first.forecast_book(BookId::from_u128(1), as_of(), 3).unwrap();

    clock.advance(chrono::Duration::hours(7));

    let second = service().with_cache(cache.clone());
    second.forecast_book(BookId::from_u128(1), as_of(), 3).unwrap();
    assert_eq!(second.latest_forecasts(BookId::from_u128(1)).unwrap().len(), 5);
}

#[test]
fn optimization_selects_only_reorder_candidates() {
    let svc = service();
    let result = svc
        .optimize(as_of(), 3, &OptimizationConstraints::new(1_000_000.0, 10))
        .unwrap();

    assert_eq!(result.selected_books.len(), 1);
    assert_eq!(result.selected_books[0].book_id, BookId::from_u128(1));
    assert!(result.total_profit > 0.0);
    assert!(result.constraint_violations.is_empty());
}

#[test]
fn tiny_budget_reports_why_nothing_fits() {
    let svc = service();
    let result = svc
        .optimize(as_of(), 3, &OptimizationConstraints::new(1.0, 10))
        .unwrap();

    assert!(result.selected_books.is_empty());
    assert_eq!(result.total_cost, 0.0);
    assert!(!result.constraint_violations.is_empty());
}

#[test]
fn report_combines_filter_and_optimization() {
    let svc = service();
    let filter = InventoryFilter {
        category: Some(Category::Databases),
        optimize: Some(OptimizationConstraints::new(1_000_000.0, 5)),
        ..InventoryFilter::default()
    };
    let report = svc.inventory_report(&filter, as_of()).unwrap();

    assert_eq!(report.recommendations.len(), 1);
    let optimization = report.optimization.expect("optimization requested");
    assert_eq!(optimization.selected_books.len(), 1);
    assert!(report.total_estimated_cost > 0.0);
}

#[test]
fn optimization_runs_on_the_pool() {
    let svc = service();
    let job = svc
        .optimization_job(as_of(), 3, OptimizationConstraints::new(1_000_000.0, 10))
        .unwrap();

    let pool = AnalysisPool::new("optimizer", 2).unwrap();
    let result = pool.submit(job).wait().unwrap();
    pool.shutdown();

    assert_eq!(result.selected_books.len(), 1);
}

#[test]
fn forecasts_run_on_the_pool() {
    let svc = service();
    let jobs: Vec<_> = (1..=3)
        .map(|n| svc.forecast_job(BookId::from_u128(n), as_of(), 3).unwrap())
        .collect();

    let pool = AnalysisPool::new("forecaster", 2).unwrap();
    let tickets: Vec<_> = jobs.into_iter().map(|job| pool.submit(job)).collect();
    let runs: Vec<_> = tickets.into_iter().map(|t| t.wait().unwrap()).collect();
    pool.shutdown();

    assert_eq!(runs.len(), 3);
    let direct = svc.forecast_book(BookId::from_u128(1), as_of(), 3).unwrap();
    assert_eq!(runs[0].results, direct.results);
}

#[test]
fn purge_drops_history_before_cutoff() {
    let svc = service();
    svc.run_daily_analysis(as_of()).unwrap();

    let cutoff = as_of().checked_add_days(Days::new(1)).unwrap();
    let purged = svc.purge_older_than(cutoff).unwrap();

    assert_eq!(purged.forecasts, 15);
    assert_eq!(purged.classifications, 3);
    assert!(svc.latest_forecasts(BookId::from_u128(1)).unwrap().is_empty());
    assert!(svc.reorder_list(as_of()).unwrap().is_empty());
}
