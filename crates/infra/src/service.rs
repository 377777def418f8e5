//! Inventory intelligence service.
//!
//! Wires the data accessor, the analytical engines, the aggregation cache and
//! the analysis repositories together. Every "run for date D" entry point is
//! idempotent: results are saved by natural key, so repeating a run replaces
//! rather than duplicates. All data a computation needs is fetched before it
//! starts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;

use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bookwise_analytics::{
    AbcCategory, AnalysisJob, AbcXyzClassification, AbcXyzClassifier, ClassificationSummary, ConstraintOptimizer,
    DemandForecastResult, DemandForecaster, DemandProfile, ForecastJob, ForecastRun, ObsolescenceAssessment,
    ObsolescenceAssessor, OptimalStockCalculator, OptimalStockRecommendation, OptimizationConstraints,
    OptimizationJob, OptimizationResult, RiskLevel, StockInputs, StockStatus, XyzCategory,
};
use bookwise_catalog::{Book, Category, DataAccessor, DemandSeries, TechnologyLevel};
use bookwise_core::{AnalysisRunId, AnalyticsError, AnalyticsResult, BookId};

use crate::cache::{
    AggregationCache, AggregationKey, AggregationKeyBuilder, AggregationType, InMemoryAggregationCache,
};
use crate::config::{ConfigError, IntelligenceConfig};
use crate::locks::KeyedLocks;
use crate::repository::{AnalysisRepository, InMemoryAnalysisRepository};

/// Repositories for every persisted analysis record.
#[derive(Clone)]
pub struct AnalysisStores {
    pub forecasts: Arc<dyn AnalysisRepository<DemandForecastResult>>,
    pub classifications: Arc<dyn AnalysisRepository<AbcXyzClassification>>,
    pub assessments: Arc<dyn AnalysisRepository<ObsolescenceAssessment>>,
    pub recommendations: Arc<dyn AnalysisRepository<OptimalStockRecommendation>>,
}

impl AnalysisStores {
    pub fn in_memory() -> Self {
        Self {
            forecasts: Arc::new(InMemoryAnalysisRepository::new()),
            classifications: Arc::new(InMemoryAnalysisRepository::new()),
            assessments: Arc::new(InMemoryAnalysisRepository::new()),
            recommendations: Arc::new(InMemoryAnalysisRepository::new()),
        }
    }
}

impl Default for AnalysisStores {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Outcome counts of a per-book batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    /// Processed, but flagged as computed from sparse data.
    pub sparse: usize,
    /// Not enough data to compute anything.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub analysis_date: NaiveDate,
    pub classifications: Vec<AbcXyzClassification>,
    pub summary: ClassificationSummary,
}

/// Filter for the inventory report. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryFilter {
    pub category: Option<Category>,
    pub technology_level: Option<TechnologyLevel>,
    pub publisher: Option<String>,
    pub stock_status: Option<StockStatus>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub publication_year: Option<i32>,
    /// Forecast horizon in periods; the configured default when unset.
    pub horizon: Option<u32>,
    /// When set, the report also selects what to reorder under these constraints.
    pub optimize: Option<OptimizationConstraints>,
}

impl InventoryFilter {
    fn matches(&self, book: &Book, rec: &OptimalStockRecommendation) -> bool {
        self.category.is_none_or(|c| book.category == c)
            && self.technology_level.is_none_or(|l| book.technology_level == l)
            && self
                .publisher
                .as_deref()
                .is_none_or(|p| book.publisher.eq_ignore_ascii_case(p))
            && self.stock_status.is_none_or(|s| rec.stock_status == s)
            && self.min_price.is_none_or(|min| book.price >= min)
            && self.max_price.is_none_or(|max| book.price <= max)
            && self
                .publication_year
                .is_none_or(|y| book.publication_date.year() == y)
    }

    fn cache_key(&self, as_of: NaiveDate, horizon: u32) -> AggregationKey {
        let mut key = AggregationKey::builder(AggregationType::InventoryReport)
            .analysis_date(as_of)
            .horizon(horizon)
            .optimize(self.optimize.is_some());
        if let Some(c) = self.category {
            key = key.category(c);
        }
        if let Some(l) = self.technology_level {
            key = key.technology_level(l);
        }
        if let Some(p) = &self.publisher {
            key = key.publisher(&p.to_ascii_lowercase());
        }
        if let Some(s) = self.stock_status {
            key = key.stock_status(s);
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            key = key.price_range(self.min_price, self.max_price);
        }
        if let Some(y) = self.publication_year {
            key = key.publication_year(y);
        }
        if let Some(constraints) = &self.optimize {
            key = constraint_params(key, constraints);
        }
        key.build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub as_of: NaiveDate,
    pub filter: InventoryFilter,
    pub recommendations: Vec<OptimalStockRecommendation>,
    pub total_estimated_cost: f64,
    pub total_estimated_revenue: f64,
    pub optimization: Option<OptimizationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalysisReport {
    pub run_id: AnalysisRunId,
    pub as_of: NaiveDate,
    pub forecasts: BatchSummary,
    pub classification: ClassificationSummary,
    pub risk_levels: BTreeMap<String, usize>,
    pub recommendations: usize,
    pub stock_status: BTreeMap<String, usize>,
    pub stock: BatchSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub forecasts: usize,
    pub classifications: usize,
    pub assessments: usize,
    pub recommendations: usize,
    pub cache_entries: usize,
}

pub struct InventoryIntelligence<A> {
    accessor: A,
    config: IntelligenceConfig,
    forecaster: DemandForecaster,
    classifier: AbcXyzClassifier,
    assessor: ObsolescenceAssessor,
    calculator: OptimalStockCalculator,
    optimizer: ConstraintOptimizer,
    cache: Arc<dyn AggregationCache>,
    stores: AnalysisStores,
    locks: KeyedLocks,
}

impl<A: DataAccessor> InventoryIntelligence<A> {
    /// Build with an in-memory cache and in-memory repositories.
    pub fn new(accessor: A, config: IntelligenceConfig) -> AnalyticsResult<Self> {
        config.validate().map_err(|ConfigError::Invalid(e)| e)?;
        Ok(Self {
            accessor,
            forecaster: DemandForecaster::new(config.forecast.clone())?,
            classifier: AbcXyzClassifier::new(config.classification.clone())?,
            assessor: ObsolescenceAssessor::new(config.obsolescence.clone())?,
            calculator: OptimalStockCalculator::new(config.stock.clone())?,
            optimizer: ConstraintOptimizer::new(config.optimizer.clone())?,
            cache: Arc::new(InMemoryAggregationCache::new()),
            stores: AnalysisStores::in_memory(),
            locks: KeyedLocks::new(),
            config,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn AggregationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_stores(mut self, stores: AnalysisStores) -> Self {
        self.stores = stores;
        self
    }

    pub fn config(&self) -> &IntelligenceConfig {
        &self.config
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn stores(&self) -> &AnalysisStores {
        &self.stores
    }

    // ---- forecasting -------------------------------------------------------

    /// Forecast one book with every algorithm plus the ensemble.
    pub fn forecast_book(
        &self,
        book_id: BookId,
        as_of: NaiveDate,
        horizon: u32,
    ) -> AnalyticsResult<ForecastRun> {
        let book = self.accessor.get_book_metadata(book_id)?;
        let granularity = self.config.forecast.granularity;
        let key = AggregationKey::builder(AggregationType::DemandForecast)
            .book(book_id)
            .analysis_date(as_of)
            .horizon(horizon)
            .granularity(granularity)
            .build();

        self.cached(&key, as_of, || {
            self.locks.with_lock(&format!("forecast:{book_id}:{as_of}"), || -> AnalyticsResult<ForecastRun> {
                let run = self.forecast_job_for(&book, as_of, horizon)?.run()?;
                self.stores.forecasts.save_all(run.results.clone())?;
                Ok(run)
            })
        })
    }

    /// Snapshot one book's history into a job, e.g. for a worker pool. The
    /// job's output is not persisted.
    pub fn forecast_job(&self, book_id: BookId, as_of: NaiveDate, horizon: u32) -> AnalyticsResult<ForecastJob> {
        let book = self.accessor.get_book_metadata(book_id)?;
        self.forecast_job_for(&book, as_of, horizon)
    }

    fn forecast_job_for(&self, book: &Book, as_of: NaiveDate, horizon: u32) -> AnalyticsResult<ForecastJob> {
        Ok(ForecastJob {
            forecaster: self.forecaster.clone(),
            series: self.series_for(book, as_of, self.config.forecast.history_periods)?,
            category: book.category,
            as_of,
            horizon,
        })
    }

    /// Forecast every active book. Books that cannot be forecast are counted,
    /// not fatal.
    pub fn run_forecasts(&self, as_of: NaiveDate, horizon: u32) -> AnalyticsResult<BatchSummary> {
        let books = self.accessor.list_active_books()?;
        let mut summary = BatchSummary::default();

        for book in &books {
            match self.forecast_book(book.id, as_of, horizon) {
                Ok(run) => {
                    summary.processed += 1;
                    if run.ensemble().is_some_and(|e| e.data_quality.is_sparse()) {
                        summary.sparse += 1;
                    }
                }
                Err(AnalyticsError::InsufficientData(reason)) => {
                    debug!(book = %book.id, %reason, "forecast skipped");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(book = %book.id, as_of = %as_of, error = %e, "forecast failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            as_of = %as_of,
            horizon,
            processed = summary.processed,
            sparse = summary.sparse,
            skipped = summary.skipped,
            failed = summary.failed,
            "forecast run finished"
        );
        Ok(summary)
    }

    // ---- classification ----------------------------------------------------

    /// Classify the whole active catalog for `as_of`.
    pub fn classify_catalog(&self, as_of: NaiveDate) -> AnalyticsResult<ClassificationOutcome> {
        let periods = self.config.windows.classification_periods;
        let key = AggregationKey::builder(AggregationType::Classification)
            .analysis_date(as_of)
            .param("periods", periods)
            .granularity(self.config.forecast.granularity)
            .build();

        self.cached(&key, as_of, || {
            self.locks.with_lock(&format!("classification:{as_of}"), || -> AnalyticsResult<ClassificationOutcome> {
                let books = self.accessor.list_active_books()?;
                let mut profiles = Vec::with_capacity(books.len());
                for book in &books {
                    let series = self.series_for(book, as_of, periods)?;
                    profiles.push(DemandProfile {
                        book_id: book.id,
                        revenue: series.total() * book.price,
                        period_demand: series.values,
                    });
                }

                let classifications: Vec<AbcXyzClassification> =
                    self.classifier.classify(as_of, &profiles).into_values().collect();
                self.stores.classifications.save_all(classifications.clone())?;
                let summary = ClassificationSummary::from_classifications(&classifications);

                info!(as_of = %as_of, books = summary.total_books, "catalog classified");
                Ok(ClassificationOutcome {
                    analysis_date: as_of,
                    classifications,
                    summary,
                })
            })
        })
    }

    // ---- obsolescence ------------------------------------------------------

    pub fn assess_book(&self, book_id: BookId, as_of: NaiveDate) -> AnalyticsResult<ObsolescenceAssessment> {
        let book = self.accessor.get_book_metadata(book_id)?;
        self.assess(&book, as_of)
    }

    /// Assess every active book for `as_of`.
    pub fn run_obsolescence(&self, as_of: NaiveDate) -> AnalyticsResult<Vec<ObsolescenceAssessment>> {
        let key = AggregationKey::builder(AggregationType::Obsolescence)
            .analysis_date(as_of)
            .param("periods", self.config.windows.trend_periods)
            .build();

        self.cached(&key, as_of, || {
            let books = self.accessor.list_active_books()?;
            let assessments = books
                .iter()
                .map(|book| self.assess(book, as_of))
                .collect::<AnalyticsResult<Vec<_>>>()?;

            let high = assessments
                .iter()
                .filter(|a| a.risk_level == RiskLevel::High)
                .count();
            info!(as_of = %as_of, books = assessments.len(), high_risk = high, "obsolescence assessed");
            Ok(assessments)
        })
    }

    /// The assessment already stored for `as_of`, or a fresh one.
    fn assessment_for(&self, book: &Book, as_of: NaiveDate) -> AnalyticsResult<ObsolescenceAssessment> {
        let stored = self.stores.assessments.find_as_of(book.id, as_of)?;
        match stored.into_iter().find(|a| a.assessment_date == as_of) {
            Some(assessment) => Ok(assessment),
            None => self.assess(book, as_of),
        }
    }

    fn assess(&self, book: &Book, as_of: NaiveDate) -> AnalyticsResult<ObsolescenceAssessment> {
        self.locks.with_lock(&format!("obsolescence:{}:{as_of}", book.id), || -> AnalyticsResult<ObsolescenceAssessment> {
            let recent = self.series_for(book, as_of, self.config.windows.trend_periods)?;
            let assessment = self.assessor.assess(book, &recent, as_of);
            self.stores.assessments.save(assessment.clone())?;
            Ok(assessment)
        })
    }

    // ---- stock levels ------------------------------------------------------

    pub fn calculate_optimal_stock(
        &self,
        book_id: BookId,
        as_of: NaiveDate,
        horizon: u32,
    ) -> AnalyticsResult<OptimalStockRecommendation> {
        let key = AggregationKey::builder(AggregationType::StockRecommendation)
            .book(book_id)
            .analysis_date(as_of)
            .horizon(horizon)
            .build();

        self.cached(&key, as_of, || {
            let book = self.accessor.get_book_metadata(book_id)?;
            let inventory = self.accessor.get_inventory_snapshot(book_id)?;
            let run = self.forecast_book(book_id, as_of, horizon)?;
            let forecast = run
                .ensemble()
                .ok_or_else(|| AnalyticsError::degenerate(format!("no ensemble forecast for {book_id}")))?;
            let history = self.series_for(&book, as_of, self.config.forecast.history_periods)?;
            let assessment = self.assessment_for(&book, as_of)?;

            self.locks.with_lock(&format!("stock:{book_id}:{as_of}"), || -> AnalyticsResult<OptimalStockRecommendation> {
                let rec = self.calculator.calculate(StockInputs {
                    book: &book,
                    inventory: &inventory,
                    forecast,
                    demand_history: &history,
                    assessment: Some(&assessment),
                    as_of,
                })?;
                self.stores.recommendations.save(rec.clone())?;
                Ok(rec)
            })
        })
    }

    /// Recommendations for every active book that has an inventory record,
    /// most urgent first.
    pub fn recommendations(
        &self,
        as_of: NaiveDate,
        horizon: u32,
    ) -> AnalyticsResult<Vec<OptimalStockRecommendation>> {
        Ok(self.collect_recommendations(as_of, horizon)?.0)
    }

    /// A book that cannot be recommended is counted and skipped; only a
    /// failure to list the catalog is an error.
    fn collect_recommendations(
        &self,
        as_of: NaiveDate,
        horizon: u32,
    ) -> AnalyticsResult<(Vec<OptimalStockRecommendation>, BatchSummary)> {
        let books = self.accessor.list_active_books()?;
        let mut recs = Vec::with_capacity(books.len());
        let mut summary = BatchSummary::default();

        for book in &books {
            match self.calculate_optimal_stock(book.id, as_of, horizon) {
                Ok(rec) => {
                    summary.processed += 1;
                    if rec.data_quality.is_sparse() {
                        summary.sparse += 1;
                    }
                    recs.push(rec);
                }
                Err(AnalyticsError::NotFound(what)) => {
                    debug!(book = %book.id, %what, "no inventory record; skipping");
                    summary.skipped += 1;
                }
                Err(AnalyticsError::InsufficientData(reason)) => {
                    debug!(book = %book.id, %reason, "not enough data for a stock recommendation");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(book = %book.id, as_of = %as_of, error = %e, "stock recommendation failed");
                    summary.failed += 1;
                }
            }
        }

        sort_by_urgency(&mut recs);
        Ok((recs, summary))
    }

    // ---- optimization ------------------------------------------------------

    /// Build the optimization for `as_of` as a job, e.g. for a worker pool.
    pub fn optimization_job(
        &self,
        as_of: NaiveDate,
        horizon: u32,
        constraints: OptimizationConstraints,
    ) -> AnalyticsResult<OptimizationJob> {
        constraints.validate()?;
        let candidates: Vec<OptimalStockRecommendation> = self
            .recommendations(as_of, horizon)?
            .into_iter()
            .filter(|r| r.stock_status.needs_order())
            .collect();
        Ok(OptimizationJob {
            optimizer: self.optimizer.clone(),
            candidates,
            constraints,
            as_of,
        })
    }

    /// Choose which reorders to place under `constraints`.
    pub fn optimize(
        &self,
        as_of: NaiveDate,
        horizon: u32,
        constraints: &OptimizationConstraints,
    ) -> AnalyticsResult<OptimizationResult> {
        constraints.validate()?;
        let key = constraint_params(
            AggregationKey::builder(AggregationType::Optimization)
                .analysis_date(as_of)
                .horizon(horizon),
            constraints,
        )
        .build();

        self.cached(&key, as_of, || {
            let job = self.optimization_job(as_of, horizon, constraints.clone())?;
            self.optimizer.optimize(&job.candidates, &job.constraints)
        })
    }

    /// Filtered recommendations, optionally with an optimized selection.
    pub fn inventory_report(
        &self,
        filter: &InventoryFilter,
        as_of: NaiveDate,
    ) -> AnalyticsResult<InventoryReport> {
        if let Some(constraints) = &filter.optimize {
            constraints.validate()?;
        }
        let horizon = filter.horizon.unwrap_or(self.config.windows.horizon_periods);
        let key = filter.cache_key(as_of, horizon);

        self.cached(&key, as_of, || {
            let books: HashMap<BookId, Book> = self
                .accessor
                .list_active_books()?
                .into_iter()
                .map(|b| (b.id, b))
                .collect();

            let recommendations: Vec<OptimalStockRecommendation> = self
                .recommendations(as_of, horizon)?
                .into_iter()
                .filter(|r| books.get(&r.book_id).is_some_and(|b| filter.matches(b, r)))
                .collect();

            let optimization = match &filter.optimize {
                Some(constraints) => {
                    let candidates: Vec<OptimalStockRecommendation> = recommendations
                        .iter()
                        .filter(|r| r.stock_status.needs_order())
                        .cloned()
                        .collect();
                    Some(self.optimizer.optimize(&candidates, constraints)?)
                }
                None => None,
            };

            Ok(InventoryReport {
                as_of,
                filter: filter.clone(),
                total_estimated_cost: recommendations.iter().map(|r| r.estimated_cost).sum(),
                total_estimated_revenue: recommendations.iter().map(|r| r.estimated_revenue).sum(),
                recommendations,
                optimization,
            })
        })
    }

    // ---- batch entry point -------------------------------------------------

    /// Idempotent whole-catalog analysis for `as_of`.
    ///
    /// Classification and obsolescence run in parallel over the same history;
    /// forecasts and stock recommendations follow.
    pub fn run_daily_analysis(&self, as_of: NaiveDate) -> AnalyticsResult<DailyAnalysisReport> {
        let run_id = AnalysisRunId::new();
        let horizon = self.config.windows.horizon_periods;
        info!(run = %run_id, as_of = %as_of, "daily analysis started");

        let (classification, assessments) = thread::scope(|s| {
            let classification = s.spawn(|| self.classify_catalog(as_of));
            let assessments = s.spawn(|| self.run_obsolescence(as_of));
            (join_worker(classification), join_worker(assessments))
        });
        let classification = classification?;
        let assessments = assessments?;

        let forecasts = self.run_forecasts(as_of, horizon)?;
        let (recs, stock) = self.collect_recommendations(as_of, horizon)?;

        let mut risk_levels = BTreeMap::new();
        for a in &assessments {
            *risk_levels.entry(format!("{:?}", a.risk_level)).or_insert(0) += 1;
        }
        let mut stock_status = BTreeMap::new();
        for r in &recs {
            *stock_status.entry(format!("{:?}", r.stock_status)).or_insert(0) += 1;
        }

        info!(
            run = %run_id,
            as_of = %as_of,
            forecasts = forecasts.processed,
            classified = classification.summary.total_books,
            recommendations = recs.len(),
            stock_failed = stock.failed,
            "daily analysis finished"
        );

        Ok(DailyAnalysisReport {
            run_id,
            as_of,
            forecasts,
            classification: classification.summary,
            risk_levels,
            recommendations: recs.len(),
            stock_status,
            stock,
        })
    }

    // ---- queries -----------------------------------------------------------

    pub fn latest_forecasts(&self, book_id: BookId) -> AnalyticsResult<Vec<DemandForecastResult>> {
        Ok(self.stores.forecasts.find_latest_for(book_id)?)
    }

    pub fn forecasts_as_of(
        &self,
        book_id: BookId,
        as_of: NaiveDate,
    ) -> AnalyticsResult<Vec<DemandForecastResult>> {
        Ok(self.stores.forecasts.find_as_of(book_id, as_of)?)
    }

    pub fn forecasts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AnalyticsResult<Vec<DemandForecastResult>> {
        Ok(self.stores.forecasts.find_by_date_range(from, to)?)
    }

    pub fn latest_classification(&self, book_id: BookId) -> AnalyticsResult<Option<AbcXyzClassification>> {
        Ok(self.stores.classifications.find_latest_for(book_id)?.into_iter().next())
    }

    /// Classifications in effect on `as_of`, optionally restricted to one ABC
    /// and/or XYZ class.
    pub fn classifications_in_cell(
        &self,
        as_of: NaiveDate,
        abc: Option<AbcCategory>,
        xyz: Option<XyzCategory>,
    ) -> AnalyticsResult<Vec<AbcXyzClassification>> {
        Ok(self
            .stores
            .classifications
            .snapshot_as_of(as_of)?
            .into_iter()
            .filter(|c| abc.is_none_or(|a| c.abc_category == a))
            .filter(|c| xyz.is_none_or(|x| c.xyz_category == x))
            .collect())
    }

    pub fn assessments_by_risk(
        &self,
        as_of: NaiveDate,
        level: RiskLevel,
    ) -> AnalyticsResult<Vec<ObsolescenceAssessment>> {
        let mut found: Vec<ObsolescenceAssessment> = self
            .stores
            .assessments
            .snapshot_as_of(as_of)?
            .into_iter()
            .filter(|a| a.risk_level == level)
            .collect();
        found.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        Ok(found)
    }

    pub fn recommendations_by_status(
        &self,
        as_of: NaiveDate,
        status: StockStatus,
    ) -> AnalyticsResult<Vec<OptimalStockRecommendation>> {
        self.stored_recommendations(as_of, |r| r.stock_status == status)
    }

    pub fn recommendations_by_category(
        &self,
        as_of: NaiveDate,
        category: Category,
    ) -> AnalyticsResult<Vec<OptimalStockRecommendation>> {
        self.stored_recommendations(as_of, |r| r.category == category)
    }

    /// Stored recommendations that need an order, most urgent first.
    pub fn reorder_list(&self, as_of: NaiveDate) -> AnalyticsResult<Vec<OptimalStockRecommendation>> {
        self.stored_recommendations(as_of, |r| r.stock_status.needs_order())
    }

    fn stored_recommendations(
        &self,
        as_of: NaiveDate,
        keep: impl Fn(&OptimalStockRecommendation) -> bool,
    ) -> AnalyticsResult<Vec<OptimalStockRecommendation>> {
        let mut recs: Vec<OptimalStockRecommendation> = self
            .stores
            .recommendations
            .snapshot_as_of(as_of)?
            .into_iter()
            .filter(|r| keep(r))
            .collect();
        sort_by_urgency(&mut recs);
        Ok(recs)
    }

    // ---- housekeeping ------------------------------------------------------

    /// Delete analysis rows dated before `cutoff` and sweep expired cache
    /// entries. Cache failures are logged, never returned.
    pub fn purge_older_than(&self, cutoff: NaiveDate) -> AnalyticsResult<PurgeReport> {
        let report = PurgeReport {
            forecasts: self.stores.forecasts.delete_older_than(cutoff)?,
            classifications: self.stores.classifications.delete_older_than(cutoff)?,
            assessments: self.stores.assessments.delete_older_than(cutoff)?,
            recommendations: self.stores.recommendations.delete_older_than(cutoff)?,
            cache_entries: self.sweep_cache(),
        };
        info!(
            cutoff = %cutoff,
            forecasts = report.forecasts,
            classifications = report.classifications,
            assessments = report.assessments,
            recommendations = report.recommendations,
            cache_entries = report.cache_entries,
            "analysis history purged"
        );
        Ok(report)
    }

    pub fn sweep_cache(&self) -> usize {
        match self.cache.sweep_expired() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    // ---- internals ---------------------------------------------------------

    fn series_for(&self, book: &Book, as_of: NaiveDate, periods: u32) -> AnalyticsResult<DemandSeries> {
        let granularity = self.config.forecast.granularity;
        let (from, to) = granularity.history_window(as_of, periods);
        // No demand can predate publication.
        let from = from.max(book.publication_date);
        let observations = self.accessor.list_sales_observations(book.id, from, to)?;
        Ok(DemandSeries::from_observations(
            book.id,
            &observations,
            from,
            to,
            granularity,
        ))
    }

    /// Serve from cache or compute and store. Cache failures of any kind
    /// degrade to recomputation.
    fn cached<T, F>(&self, key: &AggregationKey, date: NaiveDate, compute: F) -> AnalyticsResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> AnalyticsResult<T>,
    {
        let enabled = self.config.cache.enabled;
        if enabled {
            match self.cache.get(key) {
                Ok(Some(entry)) => match serde_json::from_str::<T>(&entry.payload) {
                    Ok(value) => {
                        debug!(key = %key, "cache hit");
                        return Ok(value);
                    }
                    Err(e) => warn!(key = %key, error = %e, "undecodable cache entry; recomputing"),
                },
                Ok(None) => debug!(key = %key, "cache miss"),
                Err(e) => warn!(key = %key, error = %e, "cache read failed; recomputing"),
            }
        }

        let value = compute()?;

        if enabled {
            match serde_json::to_string(&value) {
                Ok(payload) => {
                    if let Err(e) = self.cache.put(key, date, payload, self.config.cache.ttl) {
                        warn!(key = %key, error = %e, "cache write failed");
                    }
                }
                Err(e) => warn!(key = %key, error = %e, "cache payload serialization failed"),
            }
        }
        Ok(value)
    }
}

fn constraint_params(key: AggregationKeyBuilder, constraints: &OptimizationConstraints) -> AggregationKeyBuilder {
    let mut key = key
        .param("budget", constraints.max_budget)
        .param("max_items", constraints.max_items);
    if let Some(n) = constraints.max_per_category {
        key = key.param("per_category", n);
    }
    if let Some(share) = constraints.max_high_risk_budget_share {
        key = key.param("high_risk_share", share);
    }
    if let Some(budget) = constraints.time_budget {
        key = key.param("time_budget_ms", budget.as_millis());
    }
    key
}

fn sort_by_urgency(recs: &mut [OptimalStockRecommendation]) {
    recs.sort_by(|a, b| {
        b.stock_status
            .urgency()
            .cmp(&a.stock_status.urgency())
            .then_with(|| a.book_id.cmp(&b.book_id))
    });
}

fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, AnalyticsResult<T>>) -> AnalyticsResult<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(AnalyticsError::unavailable("analysis worker panicked")))
}
