//! Aggregation cache.
//!
//! Memoizes expensive computed aggregates under a deterministic key with an
//! explicit expiry. The cache is never authoritative: callers treat every
//! error as a miss and recompute.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod key;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use key::{AggregationKey, AggregationKeyBuilder};
pub use memory::InMemoryAggregationCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisAggregationCache;

/// Which analytical component produced an entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    DemandForecast,
    Classification,
    Obsolescence,
    StockRecommendation,
    Optimization,
    InventoryReport,
}

impl AggregationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationType::DemandForecast => "demand_forecast",
            AggregationType::Classification => "classification",
            AggregationType::Obsolescence => "obsolescence",
            AggregationType::StockRecommendation => "stock_recommendation",
            AggregationType::Optimization => "optimization",
            AggregationType::InventoryReport => "inventory_report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub aggregation_type: AggregationType,
    pub aggregation_date: NaiveDate,
    /// Serialized JSON.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        key: &AggregationKey,
        aggregation_date: NaiveDate,
        payload: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            key: key.as_str().to_string(),
            aggregation_type: key.aggregation_type(),
            aggregation_date,
            payload,
            created_at: now,
            expires_at: expiry(now, ttl),
        }
    }

    /// Expired once `now > expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// `now + ttl`, saturating far in the future for absurd TTLs.
pub fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let far = chrono::Duration::days(365 * 100);
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(far).min(far);
    now.checked_add_signed(ttl).unwrap_or(now)
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(String),

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Key/value store for computed aggregates.
///
/// A `get` never returns an entry whose expiry has passed. Concurrent writers
/// to the same key resolve as last write wins.
pub trait AggregationCache: Send + Sync {
    /// `Ok(None)` is a miss.
    fn get(&self, key: &AggregationKey) -> Result<Option<CacheEntry>, CacheError>;

    fn put(
        &self,
        key: &AggregationKey,
        aggregation_date: NaiveDate,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    fn invalidate(&self, key: &AggregationKey) -> Result<bool, CacheError>;

    /// Remove every expired entry; returns how many were removed.
    fn sweep_expired(&self) -> Result<usize, CacheError>;
}

impl<S> AggregationCache for Arc<S>
where
    S: AggregationCache + ?Sized,
{
    fn get(&self, key: &AggregationKey) -> Result<Option<CacheEntry>, CacheError> {
        (**self).get(key)
    }

    fn put(
        &self,
        key: &AggregationKey,
        aggregation_date: NaiveDate,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        (**self).put(key, aggregation_date, payload, ttl)
    }

    fn invalidate(&self, key: &AggregationKey) -> Result<bool, CacheError> {
        (**self).invalidate(key)
    }

    fn sweep_expired(&self) -> Result<usize, CacheError> {
        (**self).sweep_expired()
    }
}

/// Cache that stores nothing; every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAggregationCache;

impl AggregationCache for NoopAggregationCache {
    fn get(&self, _key: &AggregationKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }

    fn put(&self, _: &AggregationKey, _: NaiveDate, _: String, _: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn invalidate(&self, _key: &AggregationKey) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn sweep_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn entry_expires_strictly_after_deadline() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let key = AggregationKey::builder(AggregationType::Classification)
            .analysis_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
            .build();
        let entry = CacheEntry::new(
            &key,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            "{}".to_string(),
            now,
            Duration::from_secs(60),
        );

        assert!(!entry.is_expired(now + chrono::Duration::seconds(60)));
        assert!(entry.is_expired(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn absurd_ttl_saturates() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let exp = expiry(now, Duration::from_secs(u64::MAX));
        assert!(exp > now);
    }
}
