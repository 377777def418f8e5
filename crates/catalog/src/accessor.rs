//! Read-only access to catalog, sales and inventory records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookwise_core::{AnalyticsError, AnalyticsResult, BookId};

use crate::book::Book;
use crate::inventory::InventorySnapshot;
use crate::sales::SalesObservation;

/// Historical data source consumed by the analytical components.
///
/// Implementations are read-only from the engine's point of view. Every call
/// is an explicit fetch; computations never reach back into storage.
pub trait DataAccessor: Send + Sync {
    /// Sales of `book_id` with `from <= date <= to`, ordered by date.
    fn list_sales_observations(
        &self,
        book_id: BookId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AnalyticsResult<Vec<SalesObservation>>;

    fn get_inventory_snapshot(&self, book_id: BookId) -> AnalyticsResult<InventorySnapshot>;

    fn get_book_metadata(&self, book_id: BookId) -> AnalyticsResult<Book>;

    /// Books currently in the active catalog, ordered by id.
    fn list_active_books(&self) -> AnalyticsResult<Vec<Book>>;
}

impl<S> DataAccessor for Arc<S>
where
    S: DataAccessor + ?Sized,
{
    fn list_sales_observations(
        &self,
        book_id: BookId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AnalyticsResult<Vec<SalesObservation>> {
        (**self).list_sales_observations(book_id, from, to)
    }

    fn get_inventory_snapshot(&self, book_id: BookId) -> AnalyticsResult<InventorySnapshot> {
        (**self).get_inventory_snapshot(book_id)
    }

    fn get_book_metadata(&self, book_id: BookId) -> AnalyticsResult<Book> {
        (**self).get_book_metadata(book_id)
    }

    fn list_active_books(&self) -> AnalyticsResult<Vec<Book>> {
        (**self).list_active_books()
    }
}

/// Serializable catalog dump used to seed an [`InMemoryDataAccessor`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFixture {
    pub books: Vec<Book>,
    #[serde(default)]
    pub sales: Vec<SalesObservation>,
    #[serde(default)]
    pub inventory: Vec<InventorySnapshot>,
}

#[derive(Debug, Default)]
struct CatalogState {
    books: HashMap<BookId, Book>,
    sales: HashMap<BookId, Vec<SalesObservation>>,
    inventory: HashMap<BookId, InventorySnapshot>,
}

/// In-memory data accessor for tests/dev and fixture-driven batch runs.
#[derive(Debug, Default)]
pub struct InMemoryDataAccessor {
    inner: RwLock<CatalogState>,
}

impl InMemoryDataAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: CatalogFixture) -> Self {
        let accessor = Self::new();
        for book in fixture.books {
            accessor.upsert_book(book);
        }
        for obs in fixture.sales {
            accessor.record_sale(obs);
        }
        for snapshot in fixture.inventory {
            accessor.set_inventory(snapshot);
        }
        accessor
    }

    pub fn from_json(json: &str) -> AnalyticsResult<Self> {
        let fixture: CatalogFixture = serde_json::from_str(json)
            .map_err(|e| AnalyticsError::validation(format!("catalog fixture: {e}")))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn upsert_book(&self, book: Book) {
        if let Ok(mut state) = self.inner.write() {
            state.books.insert(book.id, book);
        }
    }

    pub fn record_sale(&self, observation: SalesObservation) {
        if let Ok(mut state) = self.inner.write() {
            let series = state.sales.entry(observation.book_id).or_default();
            // Keep per-book observations ordered by date.
            let idx = series.partition_point(|o| o.date <= observation.date);
            series.insert(idx, observation);
        }
    }

    pub fn set_inventory(&self, snapshot: InventorySnapshot) {
        if let Ok(mut state) = self.inner.write() {
            state.inventory.insert(snapshot.book_id, snapshot);
        }
    }

    fn read(&self) -> AnalyticsResult<std::sync::RwLockReadGuard<'_, CatalogState>> {
        self.inner
            .read()
            .map_err(|_| AnalyticsError::unavailable("catalog store lock poisoned"))
    }
}

impl DataAccessor for InMemoryDataAccessor {
    fn list_sales_observations(
        &self,
        book_id: BookId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AnalyticsResult<Vec<SalesObservation>> {
        let state = self.read()?;
        if !state.books.contains_key(&book_id) {
            return Err(AnalyticsError::not_found(format!("book {book_id}")));
        }
        Ok(state
            .sales
            .get(&book_id)
            .map(|all| {
                all.iter()
                    .filter(|o| o.date >= from && o.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_inventory_snapshot(&self, book_id: BookId) -> AnalyticsResult<InventorySnapshot> {
        let state = self.read()?;
        state
            .inventory
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::not_found(format!("inventory for book {book_id}")))
    }

    fn get_book_metadata(&self, book_id: BookId) -> AnalyticsResult<Book> {
        let state = self.read()?;
        state
            .books
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::not_found(format!("book {book_id}")))
    }

    fn list_active_books(&self) -> AnalyticsResult<Vec<Book>> {
        let state = self.read()?;
        let mut books: Vec<Book> = state.books.values().cloned().collect();
        books.sort_by_key(|b| b.id);
        Ok(books)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Category, TechnologyLevel};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn book(n: u128) -> Book {
        Book {
            id: BookId::from_u128(n),
            title: format!("Book {n}"),
            publisher: "Acme Press".to_string(),
            category: Category::Databases,
            technology_level: TechnologyLevel::Established,
            price: 40.0,
            publication_date: d(2022, 5, 1),
        }
    }

    #[test]
    fn sales_are_returned_in_date_order_within_window() {
        let accessor = InMemoryDataAccessor::new();
        let b = book(1);
        accessor.upsert_book(b.clone());
        accessor.record_sale(SalesObservation::new(b.id, d(2026, 3, 1), 3));
        accessor.record_sale(SalesObservation::new(b.id, d(2026, 1, 1), 1));
        accessor.record_sale(SalesObservation::new(b.id, d(2026, 2, 1), 2));

        let sales = accessor
            .list_sales_observations(b.id, d(2026, 1, 15), d(2026, 3, 31))
            .unwrap();
        let qty: Vec<u32> = sales.iter().map(|o| o.quantity).collect();
        assert_eq!(qty, vec![2, 3]);
    }

    #[test]
    fn unknown_book_is_not_found() {
        let accessor = InMemoryDataAccessor::new();
        let err = accessor.get_book_metadata(BookId::from_u128(9)).unwrap_err();
        assert!(err.is_not_found());

        let err = accessor
            .list_sales_observations(BookId::from_u128(9), d(2026, 1, 1), d(2026, 2, 1))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn fixture_json_round_trips_into_accessor() {
        let fixture = CatalogFixture {
            books: vec![book(1), book(2)],
            sales: vec![SalesObservation::new(BookId::from_u128(1), d(2026, 1, 5), 4)],
            inventory: vec![InventorySnapshot::new(BookId::from_u128(2), 3, 7)],
        };
        let json = serde_json::to_string(&fixture).unwrap();
        let accessor = InMemoryDataAccessor::from_json(&json).unwrap();

        assert_eq!(accessor.list_active_books().unwrap().len(), 2);
        assert_eq!(
            accessor
                .get_inventory_snapshot(BookId::from_u128(2))
                .unwrap()
                .available_stock(),
            10
        );
        assert!(accessor.get_inventory_snapshot(BookId::from_u128(1)).is_err());
    }
}
