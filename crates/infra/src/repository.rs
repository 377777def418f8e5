//! Persistence for derived analysis records.
//!
//! Each record type has a natural unique key `(book, date, variant)`; saving
//! a record with an existing key replaces it, which keeps "run analysis for
//! date D" idempotent.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use thiserror::Error;

use bookwise_analytics::{
    AbcXyzClassification, DemandForecastResult, ObsolescenceAssessment, OptimalStockRecommendation,
};
use bookwise_core::{AnalyticsError, BookId};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<RepositoryError> for AnalyticsError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Unavailable(msg) => AnalyticsError::unavailable(msg),
            RepositoryError::InvalidQuery(msg) => AnalyticsError::validation(msg),
        }
    }
}

/// A derived entity that can be stored by its natural key.
pub trait AnalysisRecord: Clone + Send + Sync + 'static {
    fn book_id(&self) -> BookId;

    /// The analysis date the record was produced for.
    fn record_date(&self) -> NaiveDate;

    /// Distinguishes several records for the same book and date.
    fn variant(&self) -> &'static str {
        ""
    }
}

impl AnalysisRecord for DemandForecastResult {
    fn book_id(&self) -> BookId {
        self.book_id
    }

    fn record_date(&self) -> NaiveDate {
        self.forecast_date
    }

    fn variant(&self) -> &'static str {
        self.algorithm.as_str()
    }
}

impl AnalysisRecord for AbcXyzClassification {
    fn book_id(&self) -> BookId {
        self.book_id
    }

    fn record_date(&self) -> NaiveDate {
        self.analysis_date
    }
}

impl AnalysisRecord for ObsolescenceAssessment {
    fn book_id(&self) -> BookId {
        self.book_id
    }

    fn record_date(&self) -> NaiveDate {
        self.assessment_date
    }
}

impl AnalysisRecord for OptimalStockRecommendation {
    fn book_id(&self) -> BookId {
        self.book_id
    }

    fn record_date(&self) -> NaiveDate {
        self.calculated_on
    }
}

pub trait AnalysisRepository<T: AnalysisRecord>: Send + Sync {
    /// Insert or replace by natural key.
    fn save(&self, record: T) -> Result<(), RepositoryError>;

    /// Save several records as one write; readers never observe a partial batch.
    fn save_all(&self, records: Vec<T>) -> Result<(), RepositoryError>;

    /// All records from the most recent date stored for `book`.
    fn find_latest_for(&self, book: BookId) -> Result<Vec<T>, RepositoryError>;

    /// All records from the most recent date on or before `as_of`.
    fn find_as_of(&self, book: BookId, as_of: NaiveDate) -> Result<Vec<T>, RepositoryError>;

    /// Records dated within `from..=to`, ordered by book then date.
    fn find_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<T>, RepositoryError>;

    /// For every book, its records from the latest date on or before `as_of`.
    fn snapshot_as_of(&self, as_of: NaiveDate) -> Result<Vec<T>, RepositoryError>;

    /// Remove records dated strictly before `cutoff`; returns how many.
    fn delete_older_than(&self, cutoff: NaiveDate) -> Result<usize, RepositoryError>;
}

impl<T, S> AnalysisRepository<T> for Arc<S>
where
    T: AnalysisRecord,
    S: AnalysisRepository<T> + ?Sized,
{
    fn save(&self, record: T) -> Result<(), RepositoryError> {
        (**self).save(record)
    }

    fn save_all(&self, records: Vec<T>) -> Result<(), RepositoryError> {
        (**self).save_all(records)
    }

    fn find_latest_for(&self, book: BookId) -> Result<Vec<T>, RepositoryError> {
        (**self).find_latest_for(book)
    }

    fn find_as_of(&self, book: BookId, as_of: NaiveDate) -> Result<Vec<T>, RepositoryError> {
        (**self).find_as_of(book, as_of)
    }

    fn find_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<T>, RepositoryError> {
        (**self).find_by_date_range(from, to)
    }

    fn snapshot_as_of(&self, as_of: NaiveDate) -> Result<Vec<T>, RepositoryError> {
        (**self).snapshot_as_of(as_of)
    }

    fn delete_older_than(&self, cutoff: NaiveDate) -> Result<usize, RepositoryError> {
        (**self).delete_older_than(cutoff)
    }
}

type ByDate<T> = BTreeMap<NaiveDate, BTreeMap<&'static str, T>>;

/// In-memory repository for tests/dev and single-process deployments.
#[derive(Debug)]
pub struct InMemoryAnalysisRepository<T> {
    inner: RwLock<BTreeMap<BookId, ByDate<T>>>,
}

impl<T> InMemoryAnalysisRepository<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T> Default for InMemoryAnalysisRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("repository lock poisoned".to_string())
}

fn insert<T: AnalysisRecord>(map: &mut BTreeMap<BookId, ByDate<T>>, record: T) {
    map.entry(record.book_id())
        .or_default()
        .entry(record.record_date())
        .or_default()
        .insert(record.variant(), record);
}

impl<T: AnalysisRecord> AnalysisRepository<T> for InMemoryAnalysisRepository<T> {
    fn save(&self, record: T) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        insert(&mut map, record);
        Ok(())
    }

    fn save_all(&self, records: Vec<T>) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        for record in records {
            insert(&mut map, record);
        }
        Ok(())
    }

    fn find_latest_for(&self, book: BookId) -> Result<Vec<T>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&book)
            .and_then(|dates| dates.values().next_back())
            .map(|variants| variants.values().cloned().collect())
            .unwrap_or_default())
    }

    fn find_as_of(&self, book: BookId, as_of: NaiveDate) -> Result<Vec<T>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&book)
            .and_then(|dates| dates.range(..=as_of).next_back())
            .map(|(_, variants)| variants.values().cloned().collect())
            .unwrap_or_default())
    }

    fn find_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<T>, RepositoryError> {
        if from > to {
            return Err(RepositoryError::InvalidQuery(format!(
                "date range start {from} is after end {to}"
            )));
        }
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .flat_map(|dates| dates.range(from..=to))
            .flat_map(|(_, variants)| variants.values().cloned())
            .collect())
    }

    fn snapshot_as_of(&self, as_of: NaiveDate) -> Result<Vec<T>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .filter_map(|dates| dates.range(..=as_of).next_back())
            .flat_map(|(_, variants)| variants.values().cloned())
            .collect())
    }

    fn delete_older_than(&self, cutoff: NaiveDate) -> Result<usize, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut removed = 0;
        for dates in map.values_mut() {
            let keep = dates.split_off(&cutoff);
            removed += dates.values().map(|v| v.len()).sum::<usize>();
            *dates = keep;
        }
        map.retain(|_, dates| !dates.is_empty());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwise_analytics::{AbcCategory, XyzCategory};
    use bookwise_core::DataQuality;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, day).unwrap()
    }

    fn classification(book: u128, day: u32, abc: AbcCategory) -> AbcXyzClassification {
        AbcXyzClassification {
            book_id: BookId::from_u128(book),
            analysis_date: d(day),
            abc_category: abc,
            xyz_category: XyzCategory::X,
            sales_contribution: 10.0,
            demand_variability: 0.2,
            recommended_strategy: String::new(),
            data_quality: DataQuality::Sufficient,
        }
    }

    #[test]
    fn save_replaces_by_natural_key() {
        let repo = InMemoryAnalysisRepository::new();
        repo.save(classification(1, 3, AbcCategory::C)).unwrap();
        repo.save(classification(1, 3, AbcCategory::A)).unwrap();

        let latest = repo.find_latest_for(BookId::from_u128(1)).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].abc_category, AbcCategory::A);
    }

    #[test]
    fn as_of_queries_see_history() {
        let repo = InMemoryAnalysisRepository::new();
        repo.save_all(vec![
            classification(1, 1, AbcCategory::C),
            classification(1, 10, AbcCategory::B),
            classification(1, 20, AbcCategory::A),
            classification(2, 5, AbcCategory::C),
        ])
        .unwrap();

        let at_15 = repo.find_as_of(BookId::from_u128(1), d(15)).unwrap();
        assert_eq!(at_15[0].abc_category, AbcCategory::B);
        assert!(repo.find_as_of(BookId::from_u128(2), d(4)).unwrap().is_empty());

        let snapshot = repo.snapshot_as_of(d(12)).unwrap();
        assert_eq!(snapshot.len(), 2);

        let range = repo.find_by_date_range(d(5), d(10)).unwrap();
        assert_eq!(range.len(), 2);
        assert!(repo.find_by_date_range(d(10), d(5)).is_err());
    }

    #[test]
    fn delete_older_than_is_strict() {
        let repo = InMemoryAnalysisRepository::new();
        repo.save_all(vec![
            classification(1, 1, AbcCategory::C),
            classification(1, 10, AbcCategory::B),
            classification(2, 2, AbcCategory::C),
        ])
        .unwrap();

        assert_eq!(repo.delete_older_than(d(10)).unwrap(), 2);
        assert_eq!(repo.find_by_date_range(d(1), d(30)).unwrap().len(), 1);
        assert!(repo.find_latest_for(BookId::from_u128(2)).unwrap().is_empty());
    }
}
