//! Catalog data model (read-only to the analytics core).
//!
//! Books, sales observations and inventory snapshots are owned by the
//! bookstore's record-keeping layer. This crate only describes them and exposes
//! the read-only [`DataAccessor`] through which the engine fetches them.

pub mod accessor;
pub mod book;
pub mod inventory;
pub mod sales;

pub use accessor::{CatalogFixture, DataAccessor, InMemoryDataAccessor};
pub use book::{Book, Category, TechnologyLevel};
pub use inventory::InventorySnapshot;
pub use sales::{DemandSeries, PeriodGranularity, SalesObservation};
