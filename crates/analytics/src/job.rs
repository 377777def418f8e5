use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookwise_catalog::{Category, DemandSeries};
use bookwise_core::{AnalyticsResult, BookId};

use crate::forecast::{DemandForecaster, ForecastRun};
use crate::optimization::{ConstraintOptimizer, OptimizationConstraints, OptimizationResult};
use crate::stock::OptimalStockRecommendation;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Forecast,
    Optimization,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Forecast => "forecast",
            JobKind::Optimization => "optimization",
        }
    }
}

/// A self-contained unit of analytical work.
///
/// Jobs own their inputs so they can be shipped to worker threads. Running a
/// job is pure: it reads its snapshot and returns a value, never touching
/// storage.
pub trait AnalysisJob: Send + 'static {
    type Output: Send + 'static;

    fn kind(&self) -> JobKind;

    /// The analysis date the output is valid for.
    fn as_of(&self) -> NaiveDate;

    fn run(&self) -> AnalyticsResult<Self::Output>;
}

#[derive(Debug, Clone)]
pub struct ForecastJob {
    pub forecaster: DemandForecaster,
    pub series: DemandSeries,
    pub category: Category,
    pub as_of: NaiveDate,
    pub horizon: u32,
}

impl ForecastJob {
    pub fn book_id(&self) -> BookId {
        self.series.book_id
    }
}

impl AnalysisJob for ForecastJob {
    type Output = ForecastRun;

    fn kind(&self) -> JobKind {
        JobKind::Forecast
    }

    fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    fn run(&self) -> AnalyticsResult<ForecastRun> {
        self.forecaster
            .forecast(&self.series, self.category, self.as_of, self.horizon)
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationJob {
    pub optimizer: ConstraintOptimizer,
    pub candidates: Vec<OptimalStockRecommendation>,
    pub constraints: OptimizationConstraints,
    pub as_of: NaiveDate,
}

impl AnalysisJob for OptimizationJob {
    type Output = OptimizationResult;

    fn kind(&self) -> JobKind {
        JobKind::Optimization
    }

    fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    fn run(&self) -> AnalyticsResult<OptimizationResult> {
        self.optimizer.optimize(&self.candidates, &self.constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwise_catalog::PeriodGranularity;

    #[test]
    fn forecast_job_runs_the_forecaster() {
        let as_of = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let series = DemandSeries::new(
            BookId::from_u128(7),
            PeriodGranularity::Monthly,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            vec![10.0; 12],
        );
        let job = ForecastJob {
            forecaster: DemandForecaster::default(),
            series,
            category: Category::Databases,
            as_of,
            horizon: 2,
        };

        assert_eq!(job.kind(), JobKind::Forecast);
        assert_eq!(job.book_id(), BookId::from_u128(7));
        let run = job.run().unwrap();
        assert_eq!(run.ensemble().unwrap().horizon_periods, 2);
    }

    #[test]
    fn optimization_job_with_no_candidates_is_empty() {
        let job = OptimizationJob {
            optimizer: ConstraintOptimizer::default(),
            candidates: Vec::new(),
            constraints: OptimizationConstraints::new(100.0, 3),
            as_of: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
        };
        assert_eq!(job.kind().as_str(), "optimization");
        let result = job.run().unwrap();
        assert!(result.is_empty());
    }
}
