// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Short lived in-process cache for aggregate query results.

use std::{any::Any, fmt, future::Future, sync::Arc, time::Duration};

use alloy::primitives::Address;
use moka::{future::Cache, Expiry};
use tokio::time::Instant;

/// Default bound on the number of cached results.
pub const DEFAULT_MAX_ENTRIES: u64 = 4_096;

/// Identifies one query: the contract it reads, the query kind and its parameters.
///
/// Every input that changes the result must be part of `params`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub contract: Address,
    pub query: &'static str,
    pub params: String,
}

impl CacheKey {
    pub fn new(contract: Address, query: &'static str, params: impl Into<String>) -> Self {
        Self { contract, query, params: params.into() }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.query, self.contract, self.params)
    }
}

#[derive(Clone)]
struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// Drops each entry from the store once its own TTL has passed.
struct EntryTtl;

impl Expiry<CacheKey, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// TTL cache keyed by [CacheKey].
///
/// Entries live in a bounded [moka] store that also expires them after their TTL. Freshness is
/// decided on read against the tokio clock and the caller's TTL, so paused-time tests control
/// it. Errors are never cached; callers that want a degraded result cached return it as a
/// value.
pub struct AggregateCache {
    entries: Cache<CacheKey, CacheEntry>,
}

impl Default for AggregateCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl AggregateCache {
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder().max_capacity(max_entries.max(1)).expire_after(EntryTtl).build();
        Self { entries }
    }

    /// Number of stored entries, fresh or not, after pending evictions are applied.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Fresh cached value for `key`, if any.
    pub async fn get<T: Clone + 'static>(&self, key: &CacheKey, ttl: Duration) -> Option<T> {
        let entry = self.entries.get(key).await?;
        if !entry.is_fresh(ttl, Instant::now()) {
            return None;
        }
        let value = entry.value.downcast_ref::<T>().cloned();
        if value.is_none() {
            tracing::debug!("Cache entry {} holds a different type, ignoring", key);
        }
        value
    }

    pub async fn insert<T: Send + Sync + 'static>(&self, key: CacheKey, value: T, ttl: Duration) {
        let entry = CacheEntry { value: Arc::new(value), fetched_at: Instant::now(), ttl };
        self.entries.insert(key, entry).await;
    }

    /// Return the cached value if fresh, otherwise compute, store and return it.
    pub async fn get_or_compute<T, F, Fut>(&self, key: CacheKey, ttl: Duration, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get::<T>(&key, ttl).await {
            tracing::trace!("Cache hit for {}", key);
            return value;
        }
        let value = compute().await;
        self.insert(key, value.clone(), ttl).await;
        value
    }

    /// Like [Self::get_or_compute], but errors are returned without being stored.
    pub async fn try_get_or_compute<T, E, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(&key, ttl).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.insert(key, value.clone(), ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TTL: Duration = Duration::from_millis(15_000);

    fn key(params: &str) -> CacheKey {
        CacheKey::new(Address::ZERO, "test", params)
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_boundary() {
        let cache = AggregateCache::default();
        let counter = AtomicU32::new(0);
        let computed = &counter;
        let compute = move || async move {
            computed.fetch_add(1, Ordering::SeqCst);
            42u64
        };

        assert_eq!(cache.get_or_compute(key("a"), TTL, compute).await, 42);
        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get_or_compute(key("a"), TTL, compute).await, 42);
        assert_eq!(computed.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get_or_compute(key("a"), TTL, compute).await, 42);
        assert_eq!(computed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_not_cached() {
        let cache = AggregateCache::default();
        let result: Result<u64, &str> =
            cache.try_get_or_compute(key("b"), TTL, || async { Err("rpc down") }).await;
        assert_eq!(result, Err("rpc down"));
        assert_eq!(cache.entry_count().await, 0);

        let result: Result<u64, &str> =
            cache.try_get_or_compute(key("b"), TTL, || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(cache.get::<u64>(&key("b"), TTL).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_params_do_not_collide() {
        let cache = AggregateCache::default();
        cache.insert(key("season=1"), 1u64, TTL).await;
        cache.insert(key("season=2"), 2u64, TTL).await;
        assert_eq!(cache.get::<u64>(&key("season=1"), TTL).await, Some(1));
        assert_eq!(cache.get::<u64>(&key("season=2"), TTL).await, Some(2));
        assert_eq!(cache.get::<String>(&key("season=1"), TTL).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_caller_ttl_treats_entry_as_stale() {
        let cache = AggregateCache::default();
        cache.insert(key("a"), 5u64, TTL).await;
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.get::<u64>(&key("a"), Duration::from_millis(10)).await, None);
        assert_eq!(cache.get::<u64>(&key("a"), TTL).await, Some(5));
    }

    #[tokio::test]
    async fn store_is_bounded() {
        let cache = AggregateCache::new(2);
        for i in 0..8u64 {
            cache.insert(key(&i.to_string()), i, TTL).await;
        }
        assert!(cache.entry_count().await <= 2);
    }
}
