//! Process-local result cache

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;

use super::{CacheEntry, ResultCache};

/// Default bound on cached results
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Longest time an entry is kept, whatever its TTL
const MAX_EXPIRY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Expires each entry after its own TTL
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl.min(MAX_EXPIRY))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl.min(MAX_EXPIRY))
    }
}

/// Bounded result cache backed by `moka`.
///
/// Entries are evicted once their TTL has passed, or least recently used
/// first when the cache is full.
#[derive(Debug, Clone)]
pub struct InMemoryResultCache {
    entries: Cache<String, CacheEntry>,
}

impl Default for InMemoryResultCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryResultCache {
    /// Create an empty cache holding up to [`DEFAULT_MAX_ENTRIES`] results
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache holding up to `max_entries` results
    pub fn with_capacity(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries.max(1))
            .expire_after(EntryTtl)
            .build();
        Self { entries }
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).await
    }

    async fn put(&self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry).await;
    }

    async fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key).await
    }

    async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    async fn len(&self) -> usize {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count() as usize
    }

    async fn purge_expired(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let stale: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(max_age, now))
            .map(|(key, _)| key)
            .collect();

        for key in &stale {
            self.entries.invalidate(key.as_str()).await;
        }
        self.entries.run_pending_tasks().await;
        stale.len()
    }
}
