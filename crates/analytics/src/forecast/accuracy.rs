//! Rolling-origin backtest used to weight the ensemble.

use serde::{Deserialize, Serialize};

use bookwise_catalog::{Category, DemandSeries};

use super::algorithms::{
    exponential_smoothing, linear_regression, moving_average, seasonal_adjusted,
};
use super::seasonal::SeasonalIndices;
use super::{ForecastAlgorithm, ForecastConfig};
use crate::stats::mean;

/// Historical one-step-ahead error of one algorithm for one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    pub algorithm: ForecastAlgorithm,
    /// Mean absolute error relative to actual demand (actuals below one unit
    /// count as one unit so zero-sale periods stay finite).
    pub mean_percentage_error: f64,
    pub samples: usize,
}

/// Backtest every component algorithm over the last `config.backtest_holdout`
/// periods.
///
/// Returns an empty vector when the series is too short to hold out anything
/// while keeping `config.min_history_points` of training data.
pub fn backtest(
    series: &DemandSeries,
    category: Category,
    config: &ForecastConfig,
) -> Vec<ForecastAccuracy> {
    let n = series.len();
    let holdout = config.backtest_holdout;
    if holdout == 0 || n < config.min_history_points + holdout {
        return Vec::new();
    }

    let mut errors: Vec<(ForecastAlgorithm, Vec<f64>)> = ForecastAlgorithm::COMPONENTS
        .iter()
        .map(|a| (*a, Vec::with_capacity(holdout)))
        .collect();

    for origin in (n - holdout)..n {
        let train = DemandSeries {
            book_id: series.book_id,
            granularity: series.granularity,
            start: series.start,
            values: series.values[..origin].to_vec(),
        };
        let actual = series.values[origin];
        let indices = SeasonalIndices::from_series(&train, category);
        let full = config.full_confidence_points;

        let predictions = [
            moving_average(&train.values, config.moving_average_window, 1, full),
            exponential_smoothing(&train.values, config.smoothing_alpha, 1, full),
            linear_regression(&train.values, 1, full),
            seasonal_adjusted(&train, &indices, config.seasonal_window, 1, full),
        ];

        for (slot, prediction) in errors.iter_mut().zip(predictions.iter()) {
            let predicted = prediction.periods.first().copied().unwrap_or(0.0);
            slot.1.push((actual - predicted).abs() / actual.max(1.0));
        }
    }

    errors
        .into_iter()
        .map(|(algorithm, errs)| ForecastAccuracy {
            algorithm,
            mean_percentage_error: mean(&errs),
            samples: errs.len(),
        })
        .collect()
}
