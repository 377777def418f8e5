//! Component forecasting algorithms.
//!
//! Each algorithm projects `horizon` future periods from a demand series and
//! reports its own confidence. Projections are floored at zero.

use serde::{Deserialize, Serialize};

use bookwise_catalog::DemandSeries;

use super::seasonal::{SeasonalIndices, SeasonalSource};
use super::ForecastAlgorithm;
use crate::stats::{coefficient_of_variation, finite_or, linear_fit, mean};

/// Output of one algorithm before it is wrapped into a dated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentForecast {
    pub algorithm: ForecastAlgorithm,
    /// Demand per future period, `periods.len() == horizon`.
    pub periods: Vec<f64>,
    pub confidence: f64,
}

impl ComponentForecast {
    pub(crate) fn new(algorithm: ForecastAlgorithm, periods: Vec<f64>, confidence: f64) -> Self {
        Self {
            algorithm,
            periods: periods
                .into_iter()
                .map(|p| finite_or(p, 0.0).max(0.0))
                .collect(),
            confidence: finite_or(confidence, 0.0).clamp(0.0, 1.0),
        }
    }

    pub fn total(&self) -> f64 {
        self.periods.iter().sum()
    }
}

/// Fraction of "full" history available, in `[0, 1]`.
pub(crate) fn sufficiency(points: usize, full_points: usize) -> f64 {
    if full_points == 0 {
        return 1.0;
    }
    (points as f64 / full_points as f64).min(1.0)
}

/// Mean of the trailing `window` observations, projected flat.
pub fn moving_average(
    values: &[f64],
    window: usize,
    horizon: usize,
    full_points: usize,
) -> ComponentForecast {
    let window = window.max(1).min(values.len().max(1));
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    let level = mean(tail);
    let cv = coefficient_of_variation(tail).unwrap_or(0.0);
    let confidence = sufficiency(values.len(), full_points) / (1.0 + cv);

    ComponentForecast::new(
        ForecastAlgorithm::MovingAverage,
        vec![level; horizon],
        confidence,
    )
}

/// Simple exponential smoothing: `s_t = α·x_t + (1-α)·s_{t-1}`, `s_0 = x_0`.
///
/// Confidence shrinks with the mean absolute one-step error relative to the
/// mean demand.
pub fn exponential_smoothing(
    values: &[f64],
    alpha: f64,
    horizon: usize,
    full_points: usize,
) -> ComponentForecast {
    let Some(first) = values.first() else {
        return ComponentForecast::new(
            ForecastAlgorithm::ExponentialSmoothing,
            vec![0.0; horizon],
            0.0,
        );
    };

    let mut level = *first;
    let mut abs_errors = Vec::with_capacity(values.len());
    for actual in &values[1..] {
        abs_errors.push((actual - level).abs());
        level = alpha * actual + (1.0 - alpha) * level;
    }

    let m = mean(values);
    let relative_error = if m > f64::EPSILON {
        mean(&abs_errors) / m
    } else {
        0.0
    };
    let confidence = sufficiency(values.len(), full_points) / (1.0 + relative_error);

    ComponentForecast::new(
        ForecastAlgorithm::ExponentialSmoothing,
        vec![level; horizon],
        confidence,
    )
}

/// Least-squares trend extrapolated past the end of the series.
///
/// Confidence is the fit's R² scaled by history sufficiency.
pub fn linear_regression(values: &[f64], horizon: usize, full_points: usize) -> ComponentForecast {
    let fit = linear_fit(values);
    let last_x = values.len() as f64 - 1.0;
    let periods = (1..=horizon).map(|h| fit.at(last_x + h as f64)).collect();
    let confidence = fit.r_squared * sufficiency(values.len(), full_points);

    ComponentForecast::new(ForecastAlgorithm::LinearRegression, periods, confidence)
}

/// Deseasonalized level (mean of the trailing `window` deseasonalized values)
/// re-seasonalized with the index of each target month.
pub fn seasonal_adjusted(
    series: &DemandSeries,
    indices: &SeasonalIndices,
    window: usize,
    horizon: usize,
    full_points: usize,
) -> ComponentForecast {
    let n = series.len();
    let window = window.max(1).min(n.max(1));
    let deseasonalized: Vec<f64> = (n.saturating_sub(window)..n)
        .map(|i| {
            let idx = indices.for_month(series.period_month(i));
            if idx > f64::EPSILON {
                series.values[i] / idx
            } else {
                series.values[i]
            }
        })
        .collect();
    let level = mean(&deseasonalized);

    let periods = (0..horizon)
        .map(|h| level * indices.for_month(series.period_month(n + h)))
        .collect();

    let source_weight = match indices.source {
        SeasonalSource::History => 0.85,
        SeasonalSource::CategoryDefault => 0.6,
    };
    let cv = coefficient_of_variation(&deseasonalized).unwrap_or(0.0);
    let confidence = source_weight * sufficiency(n, full_points) / (1.0 + cv);

    ComponentForecast::new(ForecastAlgorithm::SeasonalAdjusted, periods, confidence)
}
