//! Environment-driven configuration.
//!
//! Every knob has a default. A variable that is present but malformed logs a
//! warning and falls back to the default; the assembled configuration is then
//! validated as a whole.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use bookwise_analytics::{
    ClassificationConfig, ForecastConfig, ObsolescenceConfig, OptimizerConfig, StockPolicyConfig,
};
use bookwise_core::AnalyticsError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] AnalyticsError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Look-back and look-ahead windows used by the service, in periods of the
/// forecast granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindows {
    pub horizon_periods: u32,
    /// History used for ABC revenue and XYZ variability.
    pub classification_periods: u32,
    /// Recent history used for the obsolescence sales trend.
    pub trend_periods: u32,
}

impl Default for AnalysisWindows {
    fn default() -> Self {
        Self {
            horizon_periods: 3,
            classification_periods: 12,
            trend_periods: 6,
        }
    }
}

impl AnalysisWindows {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.horizon_periods == 0 || self.classification_periods == 0 || self.trend_periods < 2 {
            return Err(AnalyticsError::validation(
                "horizon and classification windows must be > 0 and the trend window >= 2",
            ));
        }
        Ok(())
    }
}

/// Scheduling of the background analysis runner.
///
/// The daily analysis runs once per calendar day (by the runner's clock);
/// `check_interval` only bounds how late a new day is noticed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub check_interval: Duration,
    /// Cadence of expired-cache sweeps between daily runs.
    pub sweep_interval: Duration,
    /// Retries of a failed daily run before giving up on that day.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Analysis rows older than this many days are purged after each run.
    pub retention_days: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15 * 60),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            retention_days: 400,
        }
    }
}

impl RunnerConfig {
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Delay before retry number `attempt` (1-based): doubles from
    /// `base_backoff`, capped at `max_backoff`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.check_interval.is_zero() || self.sweep_interval.is_zero() {
            return Err(AnalyticsError::validation(
                "runner check and sweep intervals must be > 0",
            ));
        }
        if self.max_backoff < self.base_backoff {
            return Err(AnalyticsError::validation("max_backoff must be >= base_backoff"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceConfig {
    pub forecast: ForecastConfig,
    pub classification: ClassificationConfig,
    pub obsolescence: ObsolescenceConfig,
    pub stock: StockPolicyConfig,
    pub optimizer: OptimizerConfig,
    pub cache: CacheConfig,
    pub windows: AnalysisWindows,
    pub runner: RunnerConfig,
}

impl IntelligenceConfig {
    /// Read `BOOKWISE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        cfg.forecast.moving_average_window = read(&lookup, "BOOKWISE_FORECAST_WINDOW", cfg.forecast.moving_average_window);
        cfg.forecast.smoothing_alpha = read(&lookup, "BOOKWISE_SMOOTHING_ALPHA", cfg.forecast.smoothing_alpha);
        cfg.windows.horizon_periods = read(&lookup, "BOOKWISE_FORECAST_HORIZON", cfg.windows.horizon_periods);

        cfg.stock.service_level = read(&lookup, "BOOKWISE_SERVICE_LEVEL", cfg.stock.service_level);
        cfg.stock.default_lead_time_days = read(&lookup, "BOOKWISE_LEAD_TIME_DAYS", cfg.stock.default_lead_time_days);
        cfg.stock.order_cost = read(&lookup, "BOOKWISE_ORDER_COST", cfg.stock.order_cost);
        cfg.stock.holding_cost_rate = read(&lookup, "BOOKWISE_HOLDING_RATE", cfg.stock.holding_cost_rate);

        cfg.classification.a_threshold = read(&lookup, "BOOKWISE_ABC_A_THRESHOLD", cfg.classification.a_threshold);
        cfg.classification.b_threshold = read(&lookup, "BOOKWISE_ABC_B_THRESHOLD", cfg.classification.b_threshold);
        cfg.classification.x_threshold = read(&lookup, "BOOKWISE_XYZ_X_THRESHOLD", cfg.classification.x_threshold);
        cfg.classification.y_threshold = read(&lookup, "BOOKWISE_XYZ_Y_THRESHOLD", cfg.classification.y_threshold);

        cfg.cache.enabled = read(&lookup, "BOOKWISE_CACHE_ENABLED", cfg.cache.enabled);
        let ttl_secs = read(&lookup, "BOOKWISE_CACHE_TTL_SECS", cfg.cache.ttl.as_secs());
        cfg.cache.ttl = Duration::from_secs(ttl_secs);

        let budget_ms = read(
            &lookup,
            "BOOKWISE_OPTIMIZER_BUDGET_MS",
            cfg.optimizer.default_time_budget.as_millis() as u64,
        );
        cfg.optimizer.default_time_budget = Duration::from_millis(budget_ms);

        let check_secs = read(&lookup, "BOOKWISE_RUNNER_INTERVAL_SECS", cfg.runner.check_interval.as_secs());
        cfg.runner.check_interval = Duration::from_secs(check_secs);
        let sweep_secs = read(&lookup, "BOOKWISE_CACHE_SWEEP_SECS", cfg.runner.sweep_interval.as_secs());
        cfg.runner.sweep_interval = Duration::from_secs(sweep_secs);
        cfg.runner.retention_days = read(&lookup, "BOOKWISE_RETENTION_DAYS", cfg.runner.retention_days);

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forecast.validate()?;
        self.classification.validate()?;
        self.obsolescence.validate()?;
        self.stock.validate()?;
        self.optimizer.validate()?;
        self.windows.validate()?;
        self.runner.validate()?;
        if self.windows.horizon_periods > self.forecast.max_horizon {
            return Err(AnalyticsError::validation(format!(
                "horizon_periods {} exceeds the forecaster maximum {}",
                self.windows.horizon_periods, self.forecast.max_horizon
            ))
            .into());
        }
        Ok(())
    }
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(var = name, value = %raw, default = ?default, "malformed configuration value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = IntelligenceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, IntelligenceConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = IntelligenceConfig::from_lookup(lookup(&[
            ("BOOKWISE_SMOOTHING_ALPHA", "0.5"),
            ("BOOKWISE_SERVICE_LEVEL", "0.99"),
            ("BOOKWISE_LEAD_TIME_DAYS", "21"),
            ("BOOKWISE_ABC_A_THRESHOLD", "80"),
            ("BOOKWISE_ABC_B_THRESHOLD", "95"),
            ("BOOKWISE_CACHE_TTL_SECS", "120"),
            ("BOOKWISE_OPTIMIZER_BUDGET_MS", "50"),
        ]))
        .unwrap();

        assert_eq!(cfg.forecast.smoothing_alpha, 0.5);
        assert_eq!(cfg.stock.service_level, 0.99);
        assert_eq!(cfg.stock.default_lead_time_days, 21);
        assert_eq!(cfg.classification.a_threshold, 80.0);
        assert_eq!(cfg.cache.ttl, Duration::from_secs(120));
        assert_eq!(cfg.optimizer.default_time_budget, Duration::from_millis(50));
    }

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let runner = RunnerConfig::default().with_base_backoff(Duration::from_millis(100));
        assert_eq!(runner.retry_delay(1), Duration::from_millis(100));
        assert_eq!(runner.retry_delay(2), Duration::from_millis(200));
        assert_eq!(runner.retry_delay(4), Duration::from_millis(800));
        assert_eq!(runner.retry_delay(40), runner.max_backoff);
    }

    #[test]
    fn zero_runner_intervals_are_rejected() {
        let err = IntelligenceConfig::from_lookup(lookup(&[("BOOKWISE_CACHE_SWEEP_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(AnalyticsError::Validation(_))));
    }

    #[test]
    fn malformed_value_falls_back_to_default() {
        let cfg = IntelligenceConfig::from_lookup(lookup(&[("BOOKWISE_LEAD_TIME_DAYS", "two weeks")])).unwrap();
        assert_eq!(cfg.stock.default_lead_time_days, StockPolicyConfig::default().default_lead_time_days);
    }

    #[test]
    fn contradictory_values_are_rejected() {
        let err = IntelligenceConfig::from_lookup(lookup(&[
            ("BOOKWISE_ABC_A_THRESHOLD", "95"),
            ("BOOKWISE_ABC_B_THRESHOLD", "90"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(AnalyticsError::Validation(_))));
    }
}
