use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookwise_core::BookId;

/// Point-in-time stock position of a book.
///
/// Mutated by inventory transactions outside the engine; read-only within an
/// analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub book_id: BookId,
    pub store_stock: i64,
    pub warehouse_stock: i64,
    pub reserved_count: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub last_sold_date: Option<NaiveDate>,
    /// Supplier lead time; `None` means "use the configured default".
    pub lead_time_days: Option<u32>,
}

impl InventorySnapshot {
    pub fn new(book_id: BookId, store_stock: i64, warehouse_stock: i64) -> Self {
        Self {
            book_id,
            store_stock,
            warehouse_stock,
            reserved_count: 0,
            reorder_point: 0,
            reorder_quantity: 0,
            last_sold_date: None,
            lead_time_days: None,
        }
    }

    pub fn with_reserved(mut self, reserved: i64) -> Self {
        self.reserved_count = reserved;
        self
    }

    pub fn with_lead_time_days(mut self, days: u32) -> Self {
        self.lead_time_days = Some(days);
        self
    }

    /// `store + warehouse - reserved`.
    ///
    /// Callers must not pass snapshots that make this negative; it is not
    /// clamped here.
    pub fn available_stock(&self) -> i64 {
        self.store_stock + self.warehouse_stock - self.reserved_count
    }
}
