//! Small deterministic statistics helpers.
//!
//! Every helper maps empty input and non-finite intermediates to a documented
//! default instead of returning NaN or infinity.

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    finite_or(xs.iter().sum::<f64>() / (xs.len() as f64), 0.0)
}

/// Population standard deviation (n); `0.0` for fewer than two points.
pub fn stddev_population(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() as f64);
    finite_or(var.sqrt(), 0.0)
}

/// Sample standard deviation (n-1); `0.0` for fewer than two points.
pub fn stddev_sample(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / ((xs.len() - 1) as f64);
    finite_or(var.sqrt(), 0.0)
}

/// Coefficient of variation (population stddev / mean).
///
/// `None` when the mean is zero or negative: the variability is undefined.
pub fn coefficient_of_variation(xs: &[f64]) -> Option<f64> {
    let m = mean(xs);
    if m <= f64::EPSILON {
        return None;
    }
    let cv = stddev_population(xs) / m;
    cv.is_finite().then_some(cv)
}

/// Least-squares line `y = intercept + slope * x` over `x = 0..n`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination in `[0, 1]`.
    pub r_squared: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least squares over the series index.
///
/// A single point (or none) yields a flat line through the mean. A constant
/// series fits perfectly (`r_squared = 1`).
pub fn linear_fit(ys: &[f64]) -> LinearFit {
    let n = ys.len();
    if n < 2 {
        return LinearFit {
            slope: 0.0,
            intercept: mean(ys),
            r_squared: 0.0,
        };
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = mean(ys);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean) * (y - y_mean)).sum();
    let ss_res: f64 = ys
        .iter()
        .enumerate()
        .map(|(i, y)| {
            let e = y - (intercept + slope * i as f64);
            e * e
        })
        .sum();

    let r_squared = if ss_tot <= f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    LinearFit {
        slope: finite_or(slope, 0.0),
        intercept: finite_or(intercept, y_mean),
        r_squared: finite_or(r_squared, 0.0),
    }
}

/// Approximate inverse CDF of the standard normal distribution.
///
/// Abramowitz & Stegun 26.2.23 (absolute error < 4.5e-4). Probabilities at or
/// beyond the open interval are capped at ±5 sigma.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if !p.is_finite() {
        return 0.0;
    }
    if p >= 1.0 {
        return 5.0;
    }
    if p <= 0.0 {
        return -5.0;
    }
    if p == 0.5 {
        return 0.0;
    }

    let q = if p < 0.5 { p } else { 1.0 - p };
    let t = (-2.0 * q.ln()).sqrt();

    let (c0, c1, c2) = (2.515517, 0.802853, 0.010328);
    let (d1, d2, d3) = (1.432788, 0.189269, 0.001308);

    let x = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    if p < 0.5 { -x } else { x }
}

/// `value` when it is finite, `fallback` otherwise.
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// `value` when it is finite and strictly positive, `fallback` otherwise.
pub fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_stddev_of_known_series() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&xs), 5.0);
        assert!((stddev_population(&xs) - 2.0).abs() < 1e-12);
        assert!((stddev_sample(&xs) - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_have_defined_results() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(stddev_population(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[]), None);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_fit(&ys);
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.at(4.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_is_a_perfect_flat_fit() {
        let fit = linear_fit(&[3.0, 3.0, 3.0]);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_squared, 1.0);
    }

    #[test]
    fn inverse_normal_matches_table_values() {
        assert!((inverse_normal_cdf(0.95) - 1.645).abs() < 1e-3);
        assert!((inverse_normal_cdf(0.975) - 1.960).abs() < 1e-3);
        assert!((inverse_normal_cdf(0.05) + 1.645).abs() < 1e-3);
        assert_eq!(inverse_normal_cdf(1.0), 5.0);
        assert_eq!(inverse_normal_cdf(f64::NAN), 0.0);
    }
}
