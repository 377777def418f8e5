//! Optimal stock calculator.
//!
//! Standard inventory theory (safety stock, reorder point, EOQ) adjusted by
//! obsolescence, trend and seasonality factors.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use bookwise_catalog::{Book, Category, DemandSeries, InventorySnapshot};
use bookwise_core::{AnalyticsError, AnalyticsResult, BookId, DataQuality};

use crate::forecast::{DemandForecastResult, ForecastAlgorithm, SeasonalIndices};
use crate::obsolescence::{ObsolescenceAssessment, RiskLevel};
use crate::stats::{finite_or, inverse_normal_cdf, linear_fit, mean, positive_or, stddev_sample};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Optimal,
    Overstock,
    Understock,
    ReorderNeeded,
}

impl StockStatus {
    /// Business priority: REORDER_NEEDED > UNDERSTOCK > OVERSTOCK > OPTIMAL.
    pub fn urgency(self) -> u8 {
        match self {
            StockStatus::ReorderNeeded => 3,
            StockStatus::Understock => 2,
            StockStatus::Overstock => 1,
            StockStatus::Optimal => 0,
        }
    }

    pub fn needs_order(self) -> bool {
        matches!(self, StockStatus::ReorderNeeded | StockStatus::Understock)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPolicyConfig {
    /// Target probability of not stocking out during lead time.
    pub service_level: f64,
    /// Used when the inventory snapshot has no supplier lead time.
    pub default_lead_time_days: u32,
    /// Fixed cost of placing one order.
    pub order_cost: f64,
    /// Annual holding cost as a fraction of unit cost.
    pub holding_cost_rate: f64,
    /// Unit cost as a fraction of the selling price.
    pub cost_ratio: f64,
    /// Stock above `optimal * overstock_multiplier` is OVERSTOCK.
    pub overstock_multiplier: f64,
    /// EOQ fallback for degenerate inputs.
    pub min_order_quantity: f64,
    pub trend_floor: f64,
    pub trend_ceiling: f64,
}

impl Default for StockPolicyConfig {
    fn default() -> Self {
        Self {
            service_level: 0.95,
            default_lead_time_days: 14,
            order_cost: 25.0,
            holding_cost_rate: 0.25,
            cost_ratio: 0.6,
            overstock_multiplier: 1.5,
            min_order_quantity: 1.0,
            trend_floor: 0.75,
            trend_ceiling: 1.5,
        }
    }
}

impl StockPolicyConfig {
    pub fn with_service_level(mut self, level: f64) -> Self {
        self.service_level = level;
        self
    }

    pub fn with_default_lead_time_days(mut self, days: u32) -> Self {
        self.default_lead_time_days = days;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if !(self.service_level > 0.0 && self.service_level < 1.0) {
            return Err(AnalyticsError::validation(
                "service_level must be strictly between 0 and 1",
            ));
        }
        let non_negative = [self.order_cost, self.holding_cost_rate, self.cost_ratio];
        if non_negative.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(AnalyticsError::validation(
                "order_cost, holding_cost_rate and cost_ratio must be finite and >= 0",
            ));
        }
        if !(self.overstock_multiplier.is_finite() && self.overstock_multiplier >= 1.0) {
            return Err(AnalyticsError::validation("overstock_multiplier must be >= 1"));
        }
        if !(self.min_order_quantity.is_finite() && self.min_order_quantity >= 1.0) {
            return Err(AnalyticsError::validation("min_order_quantity must be >= 1"));
        }
        if !(0.0 < self.trend_floor && self.trend_floor <= 1.0 && self.trend_ceiling >= 1.0) {
            return Err(AnalyticsError::validation(
                "trend bounds must satisfy 0 < floor <= 1 <= ceiling",
            ));
        }
        Ok(())
    }
}

/// Everything the calculator needs for one book, fetched up front.
#[derive(Debug, Clone, Copy)]
pub struct StockInputs<'a> {
    pub book: &'a Book,
    pub inventory: &'a InventorySnapshot,
    /// The ENSEMBLE forecast.
    pub forecast: &'a DemandForecastResult,
    pub demand_history: &'a DemandSeries,
    pub assessment: Option<&'a ObsolescenceAssessment>,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalStockRecommendation {
    pub book_id: BookId,
    pub category: Category,
    pub risk_level: Option<RiskLevel>,
    pub calculated_on: NaiveDate,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub current_stock: i64,
    pub average_daily_demand: f64,
    pub lead_time_days: u32,
    pub optimal_stock_level: u32,
    pub reorder_point: u32,
    pub safety_stock: u32,
    pub economic_order_quantity: u32,
    pub obsolescence_factor: f64,
    pub trend_factor: f64,
    pub seasonality_factor: f64,
    pub stock_status: StockStatus,
    pub recommended_order_quantity: u32,
    pub estimated_cost: f64,
    pub estimated_revenue: f64,
    pub data_quality: DataQuality,
}

impl OptimalStockRecommendation {
    pub fn expected_profit(&self) -> f64 {
        self.estimated_revenue - self.estimated_cost
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }
}

/// `1 + (slope / mean) * periods`, clamped to `[floor, ceiling]`; `1.0` for
/// flat, empty or all-zero history.
pub fn trend_factor(history: &[f64], periods: u32, floor: f64, ceiling: f64) -> f64 {
    let m = mean(history);
    if history.len() < 2 || m <= f64::EPSILON {
        return 1.0;
    }
    let growth = linear_fit(history).slope / m;
    finite_or(1.0 + growth * periods as f64, 1.0).clamp(floor, ceiling)
}

#[derive(Debug, Clone, Default)]
pub struct OptimalStockCalculator {
    config: StockPolicyConfig,
}

impl OptimalStockCalculator {
    pub fn new(config: StockPolicyConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StockPolicyConfig {
        &self.config
    }

    /// Compute the recommendation for one book.
    ///
    /// Zero or negative demand and cost inputs resolve to a minimal
    /// recommendation; only a non-finite or negative price is rejected. The
    /// optimal level never drops below the reorder point.
    pub fn calculate(&self, inputs: StockInputs<'_>) -> AnalyticsResult<OptimalStockRecommendation> {
        let cfg = &self.config;
        let book = inputs.book;

        if inputs.forecast.algorithm != ForecastAlgorithm::Ensemble {
            return Err(AnalyticsError::validation(format!(
                "stock calculation expects an ENSEMBLE forecast, got {}",
                inputs.forecast.algorithm
            )));
        }
        if !(book.price.is_finite() && book.price >= 0.0) {
            return Err(AnalyticsError::degenerate(format!(
                "book {} has unusable price {}",
                book.id, book.price
            )));
        }

        let unit_cost = book.price * cfg.cost_ratio;
        let lead_time_days = inputs
            .inventory
            .lead_time_days
            .unwrap_or(cfg.default_lead_time_days);
        let lead = lead_time_days as f64;

        let daily = positive_or(inputs.forecast.daily_demand(), 0.0);
        let period_days = inputs.demand_history.granularity.days() as f64;
        let daily_sd = finite_or(stddev_sample(&inputs.demand_history.values) / period_days.sqrt(), 0.0);

        let z = inverse_normal_cdf(cfg.service_level);
        let safety = finite_or(z * daily_sd * lead.sqrt(), 0.0).max(0.0);
        let reorder_point = daily * lead + safety;

        let annual_demand = daily * 365.0;
        let holding = unit_cost * cfg.holding_cost_rate;
        let eoq = if annual_demand > 0.0 && holding > 0.0 && cfg.order_cost > 0.0 {
            positive_or(
                (2.0 * annual_demand * cfg.order_cost / holding).sqrt(),
                cfg.min_order_quantity,
            )
        } else {
            cfg.min_order_quantity
        };

        let obsolescence_factor = inputs.assessment.map(|a| a.stock_factor()).unwrap_or(1.0);
        let trend = trend_factor(
            &inputs.demand_history.values,
            inputs.forecast.horizon_periods,
            cfg.trend_floor,
            cfg.trend_ceiling,
        );
        // The book's own indices once history covers every calendar month.
        let seasonal = SeasonalIndices::from_series(inputs.demand_history, book.category);
        let seasonality = positive_or(seasonal.for_month(inputs.as_of.month()), 1.0);

        let raw_optimal = (reorder_point + eoq / 2.0) * obsolescence_factor * trend * seasonality;

        let safety_stock = to_units(safety);
        let reorder_units = to_units(reorder_point);
        let optimal_units = to_units(raw_optimal).max(reorder_units);
        let eoq_units = to_units(eoq);

        let current = inputs.inventory.available_stock();
        let status = if current < reorder_units as i64 {
            StockStatus::ReorderNeeded
        } else if current < optimal_units as i64 {
            StockStatus::Understock
        } else if (current as f64) > optimal_units as f64 * cfg.overstock_multiplier {
            StockStatus::Overstock
        } else {
            StockStatus::Optimal
        };

        let order_qty = if status.needs_order() {
            let shortfall = (optimal_units as i64).saturating_sub(current).max(0);
            u32::try_from(shortfall).unwrap_or(u32::MAX)
        } else {
            0
        };

        let estimated_cost = order_qty as f64 * unit_cost;
        let estimated_revenue = order_qty as f64 * book.price * obsolescence_factor;

        let valid_to = inputs
            .as_of
            .checked_add_days(Days::new(inputs.forecast.horizon_days as u64))
            .unwrap_or(inputs.as_of);

        debug!(
            book = %book.id,
            status = ?status,
            optimal = optimal_units,
            reorder_point = reorder_units,
            order_qty,
            "optimal stock calculated"
        );

        Ok(OptimalStockRecommendation {
            book_id: book.id,
            category: book.category,
            risk_level: inputs.assessment.map(|a| a.risk_level),
            calculated_on: inputs.as_of,
            valid_from: inputs.as_of,
            valid_to,
            current_stock: current,
            average_daily_demand: daily,
            lead_time_days,
            optimal_stock_level: optimal_units,
            reorder_point: reorder_units,
            safety_stock,
            economic_order_quantity: eoq_units,
            obsolescence_factor,
            trend_factor: trend,
            seasonality_factor: seasonality,
            stock_status: status,
            recommended_order_quantity: order_qty,
            estimated_cost,
            estimated_revenue,
            data_quality: inputs.forecast.data_quality,
        })
    }
}

/// Round a non-negative quantity up to whole units (non-finite → 0).
fn to_units(x: f64) -> u32 {
    let x = finite_or(x, 0.0).max(0.0).ceil();
    if x >= u32::MAX as f64 { u32::MAX } else { x as u32 }
}
