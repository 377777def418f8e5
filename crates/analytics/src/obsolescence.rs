//! Obsolescence risk assessment.
//!
//! Blends book age (scaled by category shelf life and technology level), the
//! decline of recent sales and the lifecycle stage into a score in [0, 100].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bookwise_catalog::{Book, DemandSeries};
use bookwise_core::{AnalyticsError, AnalyticsResult, BookId, DataQuality};

use crate::stats::{finite_or, mean};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStage {
    Emerging,
    Growth,
    Mature,
    Declining,
}

impl LifecycleStage {
    /// Minimum obsolescence contribution of the stage; increases with age.
    pub fn risk_floor(self) -> f64 {
        match self {
            LifecycleStage::Emerging => 10.0,
            LifecycleStage::Growth => 25.0,
            LifecycleStage::Mature => 50.0,
            LifecycleStage::Declining => 85.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsolescenceConfig {
    /// Age (years) at which a title leaves EMERGING.
    pub growth_after_years: f64,
    /// Age (years) at which a title becomes MATURE.
    pub mature_after_years: f64,
    /// Age (years) at which a title becomes DECLINING.
    pub declining_after_years: f64,
    pub age_weight: f64,
    pub trend_weight: f64,
    pub lifecycle_weight: f64,
    /// Scores at or above this are HIGH.
    pub high_cutoff: f64,
    /// Scores at or above this (and below `high_cutoff`) are MEDIUM.
    pub medium_cutoff: f64,
    /// HIGH risk with at most this many months left needs immediate action.
    pub urgent_months: u32,
}

impl Default for ObsolescenceConfig {
    fn default() -> Self {
        Self {
            growth_after_years: 1.0,
            mature_after_years: 3.0,
            declining_after_years: 7.0,
            age_weight: 0.40,
            trend_weight: 0.35,
            lifecycle_weight: 0.25,
            high_cutoff: 70.0,
            medium_cutoff: 40.0,
            urgent_months: 6,
        }
    }
}

impl ObsolescenceConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if !(0.0 <= self.growth_after_years
            && self.growth_after_years < self.mature_after_years
            && self.mature_after_years < self.declining_after_years)
        {
            return Err(AnalyticsError::validation(
                "lifecycle thresholds must be increasing and non-negative",
            ));
        }
        let weights = [self.age_weight, self.trend_weight, self.lifecycle_weight];
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(AnalyticsError::validation("risk weights must be non-negative"));
        }
        if (weights.iter().sum::<f64>() - 1.0).abs() > 1e-6 {
            return Err(AnalyticsError::validation("risk weights must sum to 1"));
        }
        if !(0.0 < self.medium_cutoff && self.medium_cutoff < self.high_cutoff && self.high_cutoff <= 100.0) {
            return Err(AnalyticsError::validation(
                "risk cutoffs must satisfy 0 < medium < high <= 100",
            ));
        }
        Ok(())
    }

    pub fn stage_for_age(&self, age_years: f64) -> LifecycleStage {
        if age_years < self.growth_after_years {
            LifecycleStage::Emerging
        } else if age_years < self.mature_after_years {
            LifecycleStage::Growth
        } else if age_years <= self.declining_after_years {
            LifecycleStage::Mature
        } else {
            LifecycleStage::Declining
        }
    }

    pub fn level_for_score(&self, score: f64) -> RiskLevel {
        if score >= self.high_cutoff {
            RiskLevel::High
        } else if score >= self.medium_cutoff {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsolescenceAssessment {
    pub book_id: BookId,
    pub assessment_date: NaiveDate,
    pub lifecycle_stage: LifecycleStage,
    pub risk_level: RiskLevel,
    /// Composite score in `[0, 100]`.
    pub risk_score: f64,
    pub age_score: f64,
    pub trend_score: f64,
    pub months_to_obsolescence: u32,
    pub mitigation_strategy: String,
    pub data_quality: DataQuality,
}

impl ObsolescenceAssessment {
    /// Multiplier in `(0, 1]` shrinking target stock as risk rises.
    pub fn stock_factor(&self) -> f64 {
        obsolescence_factor(self.risk_score)
    }
}

/// `1 - 0.5 * score / 100`, i.e. `(0.5, 1]` for scores in `[0, 100]`.
pub fn obsolescence_factor(risk_score: f64) -> f64 {
    let score = finite_or(risk_score, 0.0).clamp(0.0, 100.0);
    1.0 - 0.5 * score / 100.0
}

/// Fixed mitigation text for a risk level and remaining shelf life.
pub fn mitigation_strategy(level: RiskLevel, months_to_obsolescence: u32, urgent_months: u32) -> &'static str {
    match level {
        RiskLevel::High if months_to_obsolescence <= urgent_months => {
            "Immediate action: discount remaining stock and arrange return-to-supplier for unsold copies"
        }
        RiskLevel::High => "Reduce inventory: stop reordering and sell down existing stock",
        RiskLevel::Medium => {
            "Promote actively: run a marketing push with bundles and targeted promotions to sustain sell-through"
        }
        RiskLevel::Low => "Continue monitoring: keep normal replenishment and review quarterly",
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObsolescenceAssessor {
    config: ObsolescenceConfig,
}

impl ObsolescenceAssessor {
    pub fn new(config: ObsolescenceConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ObsolescenceConfig {
        &self.config
    }

    /// Assess `book` on `assessment_date` using its recent demand series.
    pub fn assess(
        &self,
        book: &Book,
        recent_demand: &DemandSeries,
        assessment_date: NaiveDate,
    ) -> ObsolescenceAssessment {
        let age_years = book.age_years(assessment_date);
        let shelf_life = book.category.shelf_life_years();
        let multiplier = book.technology_level.aging_multiplier();

        let effective_age = age_years * multiplier;
        let age_score = 100.0 * (1.0 - (-effective_age / shelf_life).exp());

        let (decline, quality) = sales_decline(&recent_demand.values, age_years);
        let trend_score = 100.0 * decline;

        let stage = self.config.stage_for_age(age_years);
        let cfg = &self.config;
        let raw = cfg.age_weight * age_score
            + cfg.trend_weight * trend_score
            + cfg.lifecycle_weight * stage.risk_floor();
        let risk_score = finite_or(raw, 100.0).clamp(0.0, 100.0);

        let remaining = 1.0 - risk_score / 100.0;
        let months = (remaining * shelf_life * 12.0 / multiplier).round().max(0.0) as u32;

        let risk_level = cfg.level_for_score(risk_score);
        let mitigation = mitigation_strategy(risk_level, months, cfg.urgent_months);

        debug!(
            book = %book.id,
            score = risk_score,
            level = ?risk_level,
            stage = ?stage,
            "obsolescence assessed"
        );

        ObsolescenceAssessment {
            book_id: book.id,
            assessment_date,
            lifecycle_stage: stage,
            risk_level,
            risk_score,
            age_score,
            trend_score,
            months_to_obsolescence: months,
            mitigation_strategy: mitigation.to_string(),
            data_quality: quality,
        }
    }
}

/// Relative decline of the recent half of the window versus the earlier half,
/// in `[0, 1]`. No recent sales on a title older than a year is full decline.
fn sales_decline(values: &[f64], age_years: f64) -> (f64, DataQuality) {
    let quality = if values.len() < 2 {
        DataQuality::Sparse
    } else {
        DataQuality::Sufficient
    };

    let mid = values.len() / 2;
    let (earlier, recent) = values.split_at(mid);
    let recent_mean = mean(recent);
    if recent_mean <= 0.0 && age_years > 1.0 {
        return (1.0, quality);
    }

    let earlier_mean = mean(earlier);
    if earlier_mean <= f64::EPSILON {
        return (0.0, quality);
    }
    let decline = ((earlier_mean - recent_mean) / earlier_mean).clamp(0.0, 1.0);
    (finite_or(decline, 0.0), quality)
}
