//! Demand forecast engine.
//!
//! Produces one result per component algorithm plus an ENSEMBLE result for a
//! book's bucketed demand series. Inputs are fetched by callers; this module
//! performs no IO.

pub mod accuracy;
pub mod algorithms;
pub mod ensemble;
pub mod seasonal;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bookwise_catalog::{Category, DemandSeries, PeriodGranularity};
use bookwise_core::{AnalyticsError, AnalyticsResult, BookId, DataQuality};

use crate::stats::mean;

pub use accuracy::{ForecastAccuracy, backtest};
pub use algorithms::ComponentForecast;
pub use ensemble::{combine, ensemble_weights};
pub use seasonal::{SeasonalIndices, SeasonalSource};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForecastAlgorithm {
    MovingAverage,
    ExponentialSmoothing,
    LinearRegression,
    SeasonalAdjusted,
    Ensemble,
}

impl ForecastAlgorithm {
    /// The algorithms the ensemble combines, in output order.
    pub const COMPONENTS: [ForecastAlgorithm; 4] = [
        ForecastAlgorithm::MovingAverage,
        ForecastAlgorithm::ExponentialSmoothing,
        ForecastAlgorithm::LinearRegression,
        ForecastAlgorithm::SeasonalAdjusted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ForecastAlgorithm::MovingAverage => "MOVING_AVERAGE",
            ForecastAlgorithm::ExponentialSmoothing => "EXPONENTIAL_SMOOTHING",
            ForecastAlgorithm::LinearRegression => "LINEAR_REGRESSION",
            ForecastAlgorithm::SeasonalAdjusted => "SEASONAL_ADJUSTED",
            ForecastAlgorithm::Ensemble => "ENSEMBLE",
        }
    }
}

impl core::fmt::Display for ForecastAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecasting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub granularity: PeriodGranularity,
    /// Number of complete periods of history fetched per book.
    pub history_periods: u32,
    /// Trailing window of the moving average.
    pub moving_average_window: usize,
    /// Trailing window used to estimate the deseasonalized level.
    pub seasonal_window: usize,
    /// Smoothing constant α, strictly between 0 and 1.
    pub smoothing_alpha: f64,
    /// Below this many periods every algorithm falls back to the sparse default.
    pub min_history_points: usize,
    /// Periods at which history counts as complete for confidence purposes.
    pub full_confidence_points: usize,
    /// Periods held out by the accuracy backtest.
    pub backtest_holdout: usize,
    /// Confidence reported by sparse-history fallbacks.
    pub sparse_confidence: f64,
    /// Per-period demand floor used by the sparse fallback.
    pub minimum_demand: f64,
    pub max_horizon: u32,
    /// Weight the ensemble by backtest accuracy (equal weights when off).
    pub accuracy_weighting: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            granularity: PeriodGranularity::Monthly,
            history_periods: 24,
            moving_average_window: 3,
            seasonal_window: 3,
            smoothing_alpha: 0.3,
            min_history_points: 3,
            full_confidence_points: 12,
            backtest_holdout: 3,
            sparse_confidence: 0.1,
            minimum_demand: 0.0,
            max_horizon: 12,
            accuracy_weighting: true,
        }
    }
}

impl ForecastConfig {
    pub fn with_moving_average_window(mut self, window: usize) -> Self {
        self.moving_average_window = window;
        self
    }

    pub fn with_smoothing_alpha(mut self, alpha: f64) -> Self {
        self.smoothing_alpha = alpha;
        self
    }

    pub fn with_granularity(mut self, granularity: PeriodGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_accuracy_weighting(mut self, enabled: bool) -> Self {
        self.accuracy_weighting = enabled;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha < 1.0) {
            return Err(AnalyticsError::validation(
                "smoothing_alpha must be strictly between 0 and 1",
            ));
        }
        if self.moving_average_window == 0 || self.seasonal_window == 0 {
            return Err(AnalyticsError::validation("forecast windows must be >= 1"));
        }
        if self.min_history_points == 0 {
            return Err(AnalyticsError::validation("min_history_points must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.sparse_confidence) {
            return Err(AnalyticsError::validation(
                "sparse_confidence must be within [0, 1]",
            ));
        }
        if !(self.minimum_demand.is_finite() && self.minimum_demand >= 0.0) {
            return Err(AnalyticsError::validation(
                "minimum_demand must be a finite non-negative number",
            ));
        }
        if self.max_horizon == 0 || self.history_periods == 0 {
            return Err(AnalyticsError::validation(
                "max_horizon and history_periods must be >= 1",
            ));
        }
        Ok(())
    }
}

/// One algorithm's demand prediction for a book, made on `forecast_date`.
///
/// Created fresh on each run and never mutated; later runs supersede it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecastResult {
    pub book_id: BookId,
    pub forecast_date: NaiveDate,
    pub algorithm: ForecastAlgorithm,
    /// Total demand over the horizon (sum of `period_forecasts`), `>= 0`.
    pub predicted_demand: f64,
    pub period_forecasts: Vec<f64>,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub horizon_periods: u32,
    pub horizon_days: u32,
    pub data_quality: DataQuality,
}

impl DemandForecastResult {
    /// Average demand per day over the horizon.
    pub fn daily_demand(&self) -> f64 {
        if self.horizon_days == 0 {
            return 0.0;
        }
        self.predicted_demand / self.horizon_days as f64
    }
}

/// Everything produced by one forecast call for one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    /// Four component results followed by the ENSEMBLE result.
    pub results: Vec<DemandForecastResult>,
    pub accuracy: Vec<ForecastAccuracy>,
    pub weights: Vec<(ForecastAlgorithm, f64)>,
    pub seasonal_source: SeasonalSource,
}

impl ForecastRun {
    pub fn ensemble(&self) -> Option<&DemandForecastResult> {
        self.result_for(ForecastAlgorithm::Ensemble)
    }

    pub fn result_for(&self, algorithm: ForecastAlgorithm) -> Option<&DemandForecastResult> {
        self.results.iter().find(|r| r.algorithm == algorithm)
    }
}

/// Multi-algorithm forecaster with ensemble combination.
#[derive(Debug, Clone, Default)]
pub struct DemandForecaster {
    config: ForecastConfig,
}

impl DemandForecaster {
    pub fn new(config: ForecastConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `horizon` periods following the end of `series`.
    ///
    /// A series with no sales at all is `InsufficientData`. One with fewer than
    /// `min_history_points` periods, or fewer selling periods than that, still
    /// yields results, all flagged [`DataQuality::Sparse`] with
    /// `sparse_confidence`.
    pub fn forecast(
        &self,
        series: &DemandSeries,
        category: Category,
        as_of: NaiveDate,
        horizon: u32,
    ) -> AnalyticsResult<ForecastRun> {
        if horizon == 0 || horizon > self.config.max_horizon {
            return Err(AnalyticsError::validation(format!(
                "horizon must be within 1..={}, got {horizon}",
                self.config.max_horizon
            )));
        }
        if series.is_empty() {
            return Err(AnalyticsError::insufficient_data(format!(
                "book {} has no demand history",
                series.book_id
            )));
        }
        if series.total() <= 0.0 {
            return Err(AnalyticsError::insufficient_data(format!(
                "book {} has no sales in {} periods of history",
                series.book_id,
                series.len()
            )));
        }

        let h = horizon as usize;
        let cfg = &self.config;
        let indices = SeasonalIndices::from_series(series, category);
        let sparse =
            series.len() < cfg.min_history_points || series.selling_periods() < cfg.min_history_points;

        let (components, accuracy, quality) = if sparse {
            let level = mean(&series.values).max(cfg.minimum_demand);
            let components: Vec<ComponentForecast> = ForecastAlgorithm::COMPONENTS
                .iter()
                .map(|a| ComponentForecast::new(*a, vec![level; h], cfg.sparse_confidence))
                .collect();
            (components, Vec::new(), DataQuality::Sparse)
        } else {
            let full = cfg.full_confidence_points;
            let components = vec![
                algorithms::moving_average(&series.values, cfg.moving_average_window, h, full),
                algorithms::exponential_smoothing(&series.values, cfg.smoothing_alpha, h, full),
                algorithms::linear_regression(&series.values, h, full),
                algorithms::seasonal_adjusted(series, &indices, cfg.seasonal_window, h, full),
            ];
            let accuracy = if cfg.accuracy_weighting {
                backtest(series, category, cfg)
            } else {
                Vec::new()
            };
            (components, accuracy, DataQuality::Sufficient)
        };

        let weights = ensemble_weights(&components, &accuracy);
        let ensemble = combine(&components, &weights);

        let horizon_days = horizon * cfg.granularity.days();
        let results = components
            .iter()
            .chain(std::iter::once(&ensemble))
            .map(|c| DemandForecastResult {
                book_id: series.book_id,
                forecast_date: as_of,
                algorithm: c.algorithm,
                predicted_demand: c.total(),
                period_forecasts: c.periods.clone(),
                confidence: c.confidence,
                horizon_periods: horizon,
                horizon_days,
                data_quality: quality,
            })
            .collect();

        debug!(
            book = %series.book_id,
            as_of = %as_of,
            periods = series.len(),
            ensemble = ensemble.total(),
            quality = ?quality,
            "demand forecast computed"
        );

        Ok(ForecastRun {
            results,
            accuracy,
            weights,
            seasonal_source: indices.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(values: Vec<f64>) -> DemandSeries {
        DemandSeries::new(
            BookId::from_u128(1),
            PeriodGranularity::Monthly,
            d(2026, 1, 1),
            values,
        )
    }

    #[test]
    fn produces_four_components_and_an_ensemble() {
        let f = DemandForecaster::default();
        let run = f
            .forecast(
                &series(vec![10.0, 12.0, 11.0, 13.0, 12.0, 14.0]),
                Category::ProgrammingLanguages,
                d(2026, 7, 1),
                1,
            )
            .unwrap();

        assert_eq!(run.results.len(), 5);
        let ma = run.result_for(ForecastAlgorithm::MovingAverage).unwrap();
        assert!((ma.predicted_demand - 13.0).abs() < 1e-9);
        let lr = run.result_for(ForecastAlgorithm::LinearRegression).unwrap();
        assert!(lr.predicted_demand > 13.0);

        let ensemble = run.ensemble().unwrap();
        let components: Vec<f64> = run
            .results
            .iter()
            .filter(|r| r.algorithm != ForecastAlgorithm::Ensemble)
            .map(|r| r.predicted_demand)
            .collect();
        let lo = components.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = components.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(ensemble.predicted_demand >= lo - 1e-9 && ensemble.predicted_demand <= hi + 1e-9);
        assert_eq!(ensemble.horizon_days, 30);
        assert_eq!(ensemble.data_quality, DataQuality::Sufficient);
    }

    #[test]
    fn empty_history_is_insufficient_data() {
        let f = DemandForecaster::default();
        let err = f
            .forecast(&series(vec![]), Category::General, d(2026, 7, 1), 3)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    }

    #[test]
    fn sparse_history_is_flagged_with_low_confidence() {
        let f = DemandForecaster::default();
        let run = f
            .forecast(&series(vec![4.0, 6.0]), Category::General, d(2026, 3, 1), 2)
            .unwrap();

        for r in &run.results {
            assert_eq!(r.data_quality, DataQuality::Sparse);
            assert!((r.confidence - 0.1).abs() < 1e-12);
            assert_eq!(r.period_forecasts, vec![5.0, 5.0]);
        }
        assert!(run.accuracy.is_empty());
    }

    #[test]
    fn all_zero_history_is_insufficient_data() {
        let f = DemandForecaster::default();
        let err = f
            .forecast(&series(vec![0.0; 24]), Category::Databases, d(2028, 1, 1), 3)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    }

    #[test]
    fn one_sale_in_a_long_window_is_sparse() {
        let mut values = vec![0.0; 24];
        values[20] = 12.0;
        let run = DemandForecaster::default()
            .forecast(&series(values), Category::Databases, d(2028, 1, 1), 3)
            .unwrap();

        for r in &run.results {
            assert_eq!(r.data_quality, DataQuality::Sparse);
            assert!((r.confidence - 0.1).abs() < 1e-12);
            assert!((r.predicted_demand - 1.5).abs() < 1e-9);
        }
        assert!(run.accuracy.is_empty());
    }

    #[test]
    fn horizon_is_validated() {
        let f = DemandForecaster::default();
        let s = series(vec![1.0, 2.0, 3.0]);
        assert!(f.forecast(&s, Category::General, d(2026, 4, 1), 0).is_err());
        assert!(f.forecast(&s, Category::General, d(2026, 4, 1), 13).is_err());
    }

    #[test]
    fn invalid_alpha_is_rejected() {
        let config = ForecastConfig::default().with_smoothing_alpha(1.0);
        assert!(DemandForecaster::new(config).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: predictions are non-negative and confidences are in [0, 1].
            #[test]
            fn forecasts_are_non_negative_and_bounded(
                values in prop::collection::vec(0.0f64..500.0, 1..36),
                horizon in 1u32..=12,
            ) {
                prop_assume!(values.iter().any(|v| *v > 0.0));
                let f = DemandForecaster::default();
                let run = f.forecast(&series(values), Category::WebDevelopment, d(2029, 1, 1), horizon).unwrap();
                for r in &run.results {
                    prop_assert!(r.predicted_demand >= 0.0);
                    prop_assert!(r.period_forecasts.iter().all(|p| *p >= 0.0 && p.is_finite()));
                    prop_assert!((0.0..=1.0).contains(&r.confidence));
                    prop_assert_eq!(r.period_forecasts.len(), horizon as usize);
                }
            }

            /// Property: the ensemble lies within the component envelope.
            #[test]
            fn ensemble_within_component_range(
                values in prop::collection::vec(0.0f64..500.0, 3..36),
                horizon in 1u32..=6,
            ) {
                prop_assume!(values.iter().any(|v| *v > 0.0));
                let f = DemandForecaster::default();
                let run = f.forecast(&series(values), Category::DataScience, d(2029, 1, 1), horizon).unwrap();
                let ensemble = run.ensemble().unwrap().predicted_demand;
                let totals: Vec<f64> = run.results.iter()
                    .filter(|r| r.algorithm != ForecastAlgorithm::Ensemble)
                    .map(|r| r.predicted_demand)
                    .collect();
                let lo = totals.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = totals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(ensemble >= lo - 1e-6 && ensemble <= hi + 1e-6);
            }
        }
    }
}
