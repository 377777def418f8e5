use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookwise_analytics::StockStatus;
use bookwise_catalog::{Category, PeriodGranularity, TechnologyLevel};
use bookwise_core::BookId;

use super::AggregationType;

/// Deterministic cache key.
///
/// Rendered as `type|name=value;name=value` with parameters sorted by name and
/// reserved characters percent-escaped, so the same logical parameters always
/// produce the same key regardless of the order they were supplied in, and
/// any differing parameter produces a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregationKey {
    aggregation_type: AggregationType,
    rendered: String,
}

impl AggregationKey {
    pub fn builder(aggregation_type: AggregationType) -> AggregationKeyBuilder {
        AggregationKeyBuilder {
            aggregation_type,
            params: BTreeMap::new(),
        }
    }

    pub fn aggregation_type(&self) -> AggregationType {
        self.aggregation_type
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[derive(Debug, Clone)]
pub struct AggregationKeyBuilder {
    aggregation_type: AggregationType,
    params: BTreeMap<String, String>,
}

impl AggregationKeyBuilder {
    /// Set an arbitrary parameter. Setting the same name twice keeps the last value.
    pub fn param(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.params.insert(escape(name), escape(&value.to_string()));
        self
    }

    pub fn book(self, id: BookId) -> Self {
        self.param("book", id)
    }

    pub fn category(self, category: Category) -> Self {
        self.param("category", category.as_str())
    }

    pub fn technology_level(self, level: TechnologyLevel) -> Self {
        self.param("level", format!("{level:?}"))
    }

    pub fn publisher(self, publisher: &str) -> Self {
        self.param("publisher", publisher)
    }

    pub fn stock_status(self, status: StockStatus) -> Self {
        self.param("status", format!("{status:?}"))
    }

    pub fn price_range(self, min: Option<f64>, max: Option<f64>) -> Self {
        let bound = |b: Option<f64>| b.map(canonical_f64).unwrap_or_default();
        self.param("price", format!("{}..{}", bound(min), bound(max)))
    }

    pub fn publication_year(self, year: i32) -> Self {
        self.param("year", year)
    }

    pub fn horizon(self, periods: u32) -> Self {
        self.param("horizon", periods)
    }

    pub fn granularity(self, granularity: PeriodGranularity) -> Self {
        self.param("granularity", format!("{granularity:?}"))
    }

    pub fn optimize(self, enabled: bool) -> Self {
        self.param("optimize", enabled)
    }

    pub fn analysis_date(self, date: NaiveDate) -> Self {
        self.param("date", date.format("%Y-%m-%d"))
    }

    pub fn build(self) -> AggregationKey {
        let body = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        AggregationKey {
            aggregation_type: self.aggregation_type,
            rendered: format!("{}|{}", self.aggregation_type.as_str(), body),
        }
    }
}

/// Shortest round-trip rendering with `-0.0` folded into `0`.
fn canonical_f64(v: f64) -> String {
    if v == 0.0 { "0".to_string() } else { v.to_string() }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            ';' => out.push_str("%3B"),
            '=' => out.push_str("%3D"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let a = AggregationKey::builder(AggregationType::InventoryReport)
            .category(Category::Security)
            .publisher("O'Reilly")
            .analysis_date(d(2026, 5, 1))
            .build();
        let b = AggregationKey::builder(AggregationType::InventoryReport)
            .analysis_date(d(2026, 5, 1))
            .publisher("O'Reilly")
            .category(Category::Security)
            .build();
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "inventory_report|category=security;date=2026-05-01;publisher=O'Reilly"
        );
    }

    #[test]
    fn separators_inside_values_cannot_collide() {
        let tricky = AggregationKey::builder(AggregationType::InventoryReport)
            .publisher("a;year=2020")
            .build();
        let plain = AggregationKey::builder(AggregationType::InventoryReport)
            .publisher("a")
            .publication_year(2020)
            .build();
        assert_ne!(tricky, plain);
    }

    #[test]
    fn aggregation_type_is_part_of_the_key() {
        let a = AggregationKey::builder(AggregationType::Classification)
            .analysis_date(d(2026, 5, 1))
            .build();
        let b = AggregationKey::builder(AggregationType::Obsolescence)
            .analysis_date(d(2026, 5, 1))
            .build();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn unset_and_set_parameters_differ() {
        let base = AggregationKey::builder(AggregationType::InventoryReport).build();
        let with_flag = AggregationKey::builder(AggregationType::InventoryReport)
            .optimize(false)
            .build();
        assert_ne!(base, with_flag);
    }

    #[test]
    fn negative_zero_price_is_canonical() {
        let a = AggregationKey::builder(AggregationType::InventoryReport)
            .price_range(Some(-0.0), None)
            .build();
        let b = AggregationKey::builder(AggregationType::InventoryReport)
            .price_range(Some(0.0), None)
            .build();
        assert_eq!(a, b);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn key(
            publisher: &str,
            year: i32,
            horizon: u32,
            optimize: bool,
            min_price: Option<f64>,
        ) -> AggregationKey {
            AggregationKey::builder(AggregationType::InventoryReport)
                .publisher(publisher)
                .publication_year(year)
                .horizon(horizon)
                .optimize(optimize)
                .price_range(min_price, None)
                .analysis_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
                .build()
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

            #[test]
            fn identical_parameters_give_identical_keys(
                publisher in ".{0,12}",
                year in 1990i32..2030,
                horizon in 1u32..13,
                optimize in any::<bool>(),
                price in prop::option::of(0.0f64..500.0),
            ) {
                prop_assert_eq!(
                    key(&publisher, year, horizon, optimize, price),
                    key(&publisher, year, horizon, optimize, price)
                );
            }

            #[test]
            fn any_single_difference_changes_the_key(
                publisher in "[a-z;=|%]{0,8}",
                other in "[a-z;=|%]{0,8}",
                year in 1990i32..2030,
                horizon in 1u32..13,
            ) {
                let base = key(&publisher, year, horizon, true, None);
                if publisher != other {
                    prop_assert_ne!(&base, &key(&other, year, horizon, true, None));
                }
                prop_assert_ne!(&base, &key(&publisher, year + 1, horizon, true, None));
                prop_assert_ne!(&base, &key(&publisher, year, horizon + 1, true, None));
                prop_assert_ne!(&base, &key(&publisher, year, horizon, false, None));
                prop_assert_ne!(&base, &key(&publisher, year, horizon, true, Some(1.0)));
            }
        }
    }
}
