use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;

use crate::clock::{Clock, SystemClock};

use super::{AggregationCache, AggregationKey, CacheEntry, CacheError};

/// In-process cache. Expired entries are purged lazily on read and by
/// [`AggregationCache::sweep_expired`].
pub struct InMemoryAggregationCache {
    inner: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAggregationCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAggregationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAggregationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAggregationCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl AggregationCache for InMemoryAggregationCache {
    fn get(&self, key: &AggregationKey) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now();
        {
            let map = self
                .inner
                .read()
                .map_err(|_| CacheError::unavailable("cache lock poisoned"))?;
            match map.get(key.as_str()) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
                Some(_) => {}
            }
        }

        // Expired: purge, unless a fresher write landed in between.
        let mut map = self
            .inner
            .write()
            .map_err(|_| CacheError::unavailable("cache lock poisoned"))?;
        if map.get(key.as_str()).is_some_and(|e| e.is_expired(now)) {
            map.remove(key.as_str());
        }
        Ok(None)
    }

    fn put(
        &self,
        key: &AggregationKey,
        aggregation_date: NaiveDate,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, aggregation_date, payload, self.clock.now(), ttl);
        let mut map = self
            .inner
            .write()
            .map_err(|_| CacheError::unavailable("cache lock poisoned"))?;
        map.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn invalidate(&self, key: &AggregationKey) -> Result<bool, CacheError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| CacheError::unavailable("cache lock poisoned"))?;
        Ok(map.remove(key.as_str()).is_some())
    }

    fn sweep_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut map = self
            .inner
            .write()
            .map_err(|_| CacheError::unavailable("cache lock poisoned"))?;
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        Ok(before - map.len())
    }
}
