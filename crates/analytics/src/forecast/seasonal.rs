//! Calendar-month seasonal indices.

use serde::{Deserialize, Serialize};

use bookwise_catalog::{Category, DemandSeries};

use crate::stats::mean;

const BASE_PROFILE: [f64; 12] = [
    1.15, 1.00, 1.00, 0.95, 0.90, 0.85, 0.80, 0.95, 1.20, 1.10, 1.00, 1.10,
];

/// Semester-driven: strong September and January.
const ACADEMIC_PROFILE: [f64; 12] = [
    1.25, 1.05, 1.00, 0.95, 0.85, 0.75, 0.70, 0.95, 1.35, 1.10, 0.95, 1.10,
];

/// Conference and release-cycle driven: flatter, spring and autumn bumps.
const PRACTITIONER_PROFILE: [f64; 12] = [
    1.10, 1.00, 1.05, 1.00, 0.95, 0.90, 0.85, 0.90, 1.05, 1.10, 1.05, 1.05,
];

/// Gift-season driven.
const GENERAL_PROFILE: [f64; 12] = [
    1.00, 0.90, 0.95, 0.95, 0.95, 0.90, 0.90, 0.95, 1.00, 1.05, 1.15, 1.30,
];

/// Smallest index derived from history; keeps deseasonalizing well-defined.
const MIN_INDEX: f64 = 0.05;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalSource {
    /// Derived from the book's own same-month averages.
    History,
    /// Category-level default table (history too short).
    CategoryDefault,
}

/// Twelve multiplicative indices (January first) averaging 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalIndices {
    pub indices: [f64; 12],
    pub source: SeasonalSource,
}

impl SeasonalIndices {
    pub fn category_default(category: Category) -> Self {
        let indices = match category {
            Category::ComputerScience | Category::DataScience => ACADEMIC_PROFILE,
            Category::MachineLearning
            | Category::CloudDevOps
            | Category::WebDevelopment
            | Category::Security => PRACTITIONER_PROFILE,
            Category::General => GENERAL_PROFILE,
            Category::ProgrammingLanguages | Category::Databases => BASE_PROFILE,
        };
        Self {
            indices,
            source: SeasonalSource::CategoryDefault,
        }
    }

    /// Same-month averages relative to the overall mean, when the series
    /// covers every calendar month and has non-zero demand; the category
    /// default otherwise.
    pub fn from_series(series: &DemandSeries, category: Category) -> Self {
        let overall = mean(&series.values);
        if series.len() < 12 || overall <= f64::EPSILON {
            return Self::category_default(category);
        }

        let mut sums = [0.0_f64; 12];
        let mut counts = [0usize; 12];
        for (i, v) in series.values.iter().enumerate() {
            let m = (series.period_month(i) - 1) as usize;
            sums[m] += v;
            counts[m] += 1;
        }
        if counts.iter().any(|c| *c == 0) {
            return Self::category_default(category);
        }

        let mut indices = [1.0_f64; 12];
        for m in 0..12 {
            indices[m] = ((sums[m] / counts[m] as f64) / overall).max(MIN_INDEX);
        }

        // Renormalize so the indices average exactly 1.0 after flooring.
        let avg = indices.iter().sum::<f64>() / 12.0;
        for idx in &mut indices {
            *idx /= avg;
        }

        Self {
            indices,
            source: SeasonalSource::History,
        }
    }

    /// Index for a calendar month (1..=12); out-of-range months are neutral.
    pub fn for_month(&self, month: u32) -> f64 {
        match month {
            1..=12 => self.indices[(month - 1) as usize],
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwise_catalog::PeriodGranularity;
    use bookwise_core::BookId;
    use chrono::NaiveDate;

    #[test]
    fn default_tables_average_to_one() {
        for category in Category::ALL {
            let s = SeasonalIndices::category_default(category);
            let avg = s.indices.iter().sum::<f64>() / 12.0;
            assert!((avg - 1.0).abs() < 1e-9, "{category} averages {avg}");
        }
    }

    #[test]
    fn short_history_uses_category_default() {
        let series = DemandSeries::new(
            BookId::from_u128(1),
            PeriodGranularity::Monthly,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            vec![5.0; 6],
        );
        let s = SeasonalIndices::from_series(&series, Category::General);
        assert_eq!(s.source, SeasonalSource::CategoryDefault);
    }

    #[test]
    fn history_indices_follow_same_month_averages() {
        // Two years: December sells double, everything else flat.
        let mut values = Vec::new();
        for _ in 0..2 {
            for month in 1..=12 {
                values.push(if month == 12 { 20.0 } else { 10.0 });
            }
        }
        let series = DemandSeries::new(
            BookId::from_u128(1),
            PeriodGranularity::Monthly,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            values,
        );

        let s = SeasonalIndices::from_series(&series, Category::Databases);
        assert_eq!(s.source, SeasonalSource::History);
        assert!(s.for_month(12) > 1.5);
        assert!((s.for_month(12) / s.for_month(6) - 2.0).abs() < 1e-9);
        let avg = s.indices.iter().sum::<f64>() / 12.0;
        assert!((avg - 1.0).abs() < 1e-9);
    }
}
