//! ABC/XYZ classification of the active catalog.
//!
//! ABC ranks books by share of catalog revenue (Pareto), XYZ by the
//! coefficient of variation of periodic demand. Thresholds are relative to the
//! whole population for a date, so the catalog is always classified together.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bookwise_core::{AnalyticsError, AnalyticsResult, BookId, DataQuality};

use crate::stats::coefficient_of_variation;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbcCategory {
    A,
    B,
    C,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum XyzCategory {
    X,
    Y,
    Z,
}

/// Thresholds, configurable with conventional defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Cumulative revenue share (percent) covered by class A.
    pub a_threshold: f64,
    /// Cumulative revenue share (percent) covered by classes A and B.
    pub b_threshold: f64,
    /// CV strictly below this is X.
    pub x_threshold: f64,
    /// CV up to and including this is Y; above is Z.
    pub y_threshold: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            a_threshold: 70.0,
            b_threshold: 90.0,
            x_threshold: 0.5,
            y_threshold: 1.0,
        }
    }
}

impl ClassificationConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        let pct = 0.0..=100.0;
        if !(pct.contains(&self.a_threshold) && pct.contains(&self.b_threshold)) {
            return Err(AnalyticsError::validation(
                "ABC thresholds must be percentages within [0, 100]",
            ));
        }
        if self.a_threshold >= self.b_threshold {
            return Err(AnalyticsError::validation(
                "a_threshold must be lower than b_threshold",
            ));
        }
        if !(self.x_threshold > 0.0 && self.x_threshold < self.y_threshold)
            || !self.y_threshold.is_finite()
        {
            return Err(AnalyticsError::validation(
                "XYZ thresholds must satisfy 0 < x_threshold < y_threshold",
            ));
        }
        Ok(())
    }
}

/// Per-book input: revenue and periodic demand over the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandProfile {
    pub book_id: BookId,
    pub revenue: f64,
    pub period_demand: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcXyzClassification {
    pub book_id: BookId,
    pub analysis_date: NaiveDate,
    pub abc_category: AbcCategory,
    pub xyz_category: XyzCategory,
    /// Share of catalog revenue in percent, `[0, 100]`.
    pub sales_contribution: f64,
    /// Coefficient of variation; `0.0` when undefined (no sales).
    pub demand_variability: f64,
    pub recommended_strategy: String,
    /// `Sparse` when the variability is undefined and Z was assigned by default.
    pub data_quality: DataQuality,
}

/// Fixed strategy text for each of the nine ABC×XYZ cells.
pub fn recommended_strategy(abc: AbcCategory, xyz: XyzCategory) -> &'static str {
    use AbcCategory::*;
    use XyzCategory::*;
    match (abc, xyz) {
        (A, X) => "Tight high-frequency reorder management: automate replenishment, keep minimal safety stock",
        (A, Y) => "Frequent review with moderate safety stock; adjust orders to seasonal signals",
        (A, Z) => "High-value erratic demand: maintain higher safety stock and review weekly with manual forecasts",
        (B, X) => "Periodic automated replenishment with standard safety stock",
        (B, Y) => "Periodic review with moderate safety stock; monitor trend shifts",
        (B, Z) => "Order on demand or in small lots; avoid speculative stock",
        (C, X) => "Low-touch bulk ordering at long intervals to minimise ordering cost",
        (C, Y) => "Minimal stock with infrequent review; consider consolidating orders",
        (C, Z) => "Liquidation candidate: stop reordering, clear remaining stock or move to print-on-demand",
    }
}

/// Counts per cell and revenue share per ABC class for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub total_books: usize,
    pub cells: BTreeMap<String, usize>,
    pub revenue_share: BTreeMap<String, f64>,
}

impl ClassificationSummary {
    pub fn from_classifications<'a>(
        items: impl IntoIterator<Item = &'a AbcXyzClassification>,
    ) -> Self {
        let mut summary = Self::default();
        for c in items {
            summary.total_books += 1;
            *summary
                .cells
                .entry(format!("{:?}{:?}", c.abc_category, c.xyz_category))
                .or_insert(0) += 1;
            *summary
                .revenue_share
                .entry(format!("{:?}", c.abc_category))
                .or_insert(0.0) += c.sales_contribution;
        }
        summary
    }
}

#[derive(Debug, Clone, Default)]
pub struct AbcXyzClassifier {
    config: ClassificationConfig,
}

impl AbcXyzClassifier {
    pub fn new(config: ClassificationConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassificationConfig {
        &self.config
    }

    /// Classify the full population for `analysis_date`.
    ///
    /// Every profile receives exactly one classification. Books are ranked by
    /// revenue descending (ties by id); a book belongs to the class whose
    /// threshold had not yet been reached by the books ranked above it, so the
    /// book that crosses 70% is still an A.
    pub fn classify(
        &self,
        analysis_date: NaiveDate,
        profiles: &[DemandProfile],
    ) -> BTreeMap<BookId, AbcXyzClassification> {
        let revenue = |p: &DemandProfile| {
            if p.revenue.is_finite() {
                p.revenue.max(0.0)
            } else {
                0.0
            }
        };
        let total: f64 = profiles.iter().map(revenue).sum();

        let mut ranked: Vec<&DemandProfile> = profiles.iter().collect();
        ranked.sort_by(|a, b| {
            revenue(b)
                .total_cmp(&revenue(a))
                .then_with(|| a.book_id.cmp(&b.book_id))
        });

        let mut out = BTreeMap::new();
        let mut cumulative_before = 0.0;
        for profile in ranked {
            let contribution = if total > 0.0 {
                (revenue(profile) / total * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };

            let abc = if total <= 0.0 || contribution <= 0.0 {
                AbcCategory::C
            } else if cumulative_before < self.config.a_threshold {
                AbcCategory::A
            } else if cumulative_before < self.config.b_threshold {
                AbcCategory::B
            } else {
                AbcCategory::C
            };
            cumulative_before += contribution;

            let (xyz, variability, quality) = self.xyz_for(&profile.period_demand);

            out.insert(
                profile.book_id,
                AbcXyzClassification {
                    book_id: profile.book_id,
                    analysis_date,
                    abc_category: abc,
                    xyz_category: xyz,
                    sales_contribution: contribution,
                    demand_variability: variability,
                    recommended_strategy: recommended_strategy(abc, xyz).to_string(),
                    data_quality: quality,
                },
            );
        }

        debug!(
            analysis_date = %analysis_date,
            books = out.len(),
            total_revenue = total,
            "abc/xyz classification computed"
        );

        out
    }

    fn xyz_for(&self, demand: &[f64]) -> (XyzCategory, f64, DataQuality) {
        match coefficient_of_variation(demand) {
            None => (XyzCategory::Z, 0.0, DataQuality::Sparse),
            Some(cv) if cv < self.config.x_threshold => (XyzCategory::X, cv, DataQuality::Sufficient),
            Some(cv) if cv <= self.config.y_threshold => (XyzCategory::Y, cv, DataQuality::Sufficient),
            Some(cv) => (XyzCategory::Z, cv, DataQuality::Sufficient),
        }
    }
}
