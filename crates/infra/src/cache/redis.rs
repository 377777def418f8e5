//! Redis-backed aggregation cache (optional, `redis` feature).
//!
//! Entries are stored as JSON under a prefixed key with server-side expiry
//! (`SET .. EX`), so `sweep_expired` has nothing to do. Expiry is still
//! re-checked on read against the stored `expires_at`.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::debug;

use super::{AggregationCache, AggregationKey, CacheEntry, CacheError};

#[derive(Debug, Clone)]
pub struct RedisAggregationCache {
    client: ::redis::Client,
    prefix: String,
}

impl RedisAggregationCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = ::redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::backend(e.to_string()))?;
        Ok(Self {
            client,
            prefix: "bookwise:cache:".to_string(),
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn redis_key(&self, key: &AggregationKey) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }

    fn connection(&self) -> Result<::redis::Connection, CacheError> {
        self.client
            .get_connection()
            .map_err(|e| CacheError::unavailable(e.to_string()))
    }
}

impl AggregationCache for RedisAggregationCache {
    fn get(&self, key: &AggregationKey) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = ::redis::cmd("GET")
            .arg(self.redis_key(key))
            .query(&mut conn)
            .map_err(|e| CacheError::backend(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        if entry.is_expired(Utc::now()) {
            debug!(key = %key, "redis entry outlived its expiry; treating as miss");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn put(
        &self,
        key: &AggregationKey,
        aggregation_date: NaiveDate,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, aggregation_date, payload, Utc::now(), ttl);
        let body = serde_json::to_string(&entry)?;
        let seconds = ttl.as_secs().max(1);

        let mut conn = self.connection()?;
        ::redis::cmd("SET")
            .arg(self.redis_key(key))
            .arg(body)
            .arg("EX")
            .arg(seconds)
            .query::<()>(&mut conn)
            .map_err(|e| CacheError::backend(e.to_string()))
    }

    fn invalidate(&self, key: &AggregationKey) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        let removed: i64 = ::redis::cmd("DEL")
            .arg(self.redis_key(key))
            .query(&mut conn)
            .map_err(|e| CacheError::backend(e.to_string()))?;
        Ok(removed > 0)
    }

    fn sweep_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}
