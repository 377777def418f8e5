//! Weighted combination of component forecasts.

use super::ForecastAlgorithm;
use super::accuracy::ForecastAccuracy;
use super::algorithms::ComponentForecast;

/// Errors below this are treated as this, so a perfect backtest cannot take
/// all the weight with an infinite inverse.
const ERROR_FLOOR: f64 = 0.01;

/// Per-algorithm weights summing to 1.
///
/// Inverse backtest error when every component has accuracy history, equal
/// weighting otherwise.
pub fn ensemble_weights(
    components: &[ComponentForecast],
    accuracy: &[ForecastAccuracy],
) -> Vec<(ForecastAlgorithm, f64)> {
    if components.is_empty() {
        return Vec::new();
    }

    let inverse_errors: Option<Vec<f64>> = components
        .iter()
        .map(|c| {
            accuracy
                .iter()
                .find(|a| a.algorithm == c.algorithm && a.samples > 0)
                .map(|a| 1.0 / a.mean_percentage_error.max(ERROR_FLOOR))
                .filter(|w| w.is_finite())
        })
        .collect();

    match inverse_errors {
        Some(raw) => {
            let total: f64 = raw.iter().sum();
            components
                .iter()
                .zip(raw)
                .map(|(c, w)| (c.algorithm, w / total))
                .collect()
        }
        None => {
            let w = 1.0 / components.len() as f64;
            components.iter().map(|c| (c.algorithm, w)).collect()
        }
    }
}

/// Weighted average of the components, period by period, and of their
/// confidences.
///
/// Because the weights are a convex combination, every ensemble period lies
/// within the min/max of the component periods.
pub fn combine(
    components: &[ComponentForecast],
    weights: &[(ForecastAlgorithm, f64)],
) -> ComponentForecast {
    let horizon = components.first().map(|c| c.periods.len()).unwrap_or(0);
    let mut periods = vec![0.0; horizon];
    let mut confidence = 0.0;

    for (component, (_, w)) in components.iter().zip(weights) {
        for (slot, p) in periods.iter_mut().zip(&component.periods) {
            *slot += w * p;
        }
        confidence += w * component.confidence;
    }

    // Clamp rounding drift back into the component envelope.
    for (h, slot) in periods.iter_mut().enumerate() {
        let lo = components
            .iter()
            .filter_map(|c| c.periods.get(h))
            .fold(f64::INFINITY, |a, b| a.min(*b));
        let hi = components
            .iter()
            .filter_map(|c| c.periods.get(h))
            .fold(f64::NEG_INFINITY, |a, b| a.max(*b));
        if lo.is_finite() && hi.is_finite() {
            *slot = slot.clamp(lo, hi);
        }
    }

    ComponentForecast::new(ForecastAlgorithm::Ensemble, periods, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(algorithm: ForecastAlgorithm, value: f64, confidence: f64) -> ComponentForecast {
        ComponentForecast::new(algorithm, vec![value; 2], confidence)
    }

    fn components() -> Vec<ComponentForecast> {
        vec![
            component(ForecastAlgorithm::MovingAverage, 10.0, 0.8),
            component(ForecastAlgorithm::ExponentialSmoothing, 12.0, 0.6),
            component(ForecastAlgorithm::LinearRegression, 14.0, 0.9),
            component(ForecastAlgorithm::SeasonalAdjusted, 8.0, 0.5),
        ]
    }

    #[test]
    fn equal_weights_without_accuracy_history() {
        let c = components();
        let w = ensemble_weights(&c, &[]);
        assert!(w.iter().all(|(_, w)| (*w - 0.25).abs() < 1e-12));

        let e = combine(&c, &w);
        assert_eq!(e.algorithm, ForecastAlgorithm::Ensemble);
        assert!((e.periods[0] - 11.0).abs() < 1e-12);
        assert!((e.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn lower_error_gets_higher_weight() {
        let c = components();
        let acc: Vec<ForecastAccuracy> = [
            (ForecastAlgorithm::MovingAverage, 0.4),
            (ForecastAlgorithm::ExponentialSmoothing, 0.2),
            (ForecastAlgorithm::LinearRegression, 0.1),
            (ForecastAlgorithm::SeasonalAdjusted, 0.4),
        ]
        .into_iter()
        .map(|(algorithm, e)| ForecastAccuracy {
            algorithm,
            mean_percentage_error: e,
            samples: 3,
        })
        .collect();

        let w = ensemble_weights(&c, &acc);
        let weight = |a| w.iter().find(|(x, _)| *x == a).unwrap().1;
        assert!(weight(ForecastAlgorithm::LinearRegression) > weight(ForecastAlgorithm::ExponentialSmoothing));
        assert!(weight(ForecastAlgorithm::ExponentialSmoothing) > weight(ForecastAlgorithm::MovingAverage));
        assert!((w.iter().map(|(_, w)| w).sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn partial_accuracy_history_falls_back_to_equal_weights() {
        let c = components();
        let acc = vec![ForecastAccuracy {
            algorithm: ForecastAlgorithm::MovingAverage,
            mean_percentage_error: 0.1,
            samples: 3,
        }];
        let w = ensemble_weights(&c, &acc);
        assert!(w.iter().all(|(_, w)| (*w - 0.25).abs() < 1e-12));
    }
}
