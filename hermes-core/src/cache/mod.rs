//! Ephemeral result cache
//!
//! Results are keyed by a tool's cache key and kept together with the time
//! they were produced and the TTL they were cached under. The pipeline
//! judges freshness on read; backends also evict entries once their TTL
//! has passed.
//!
//! Failed results are cached exactly like successful ones.

mod inmemory;

pub use inmemory::InMemoryResultCache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tools::ToolResult;

/// A cached result and the time it was stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached result, returned unchanged on a hit
    pub result: ToolResult,

    /// When the result was produced
    pub stored_at: DateTime<Utc>,

    /// TTL of the tool that produced the result
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl CacheEntry {
    /// Entry for `result` stored at `stored_at`, kept for `ttl`
    pub fn new(result: ToolResult, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            result,
            stored_at,
            ttl,
        }
    }

    /// Whether the entry is younger than `ttl` at `now`
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        now.signed_duration_since(self.stored_at) < ttl
    }
}

/// Key-value store for ephemeral results
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up an entry
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or replace an entry
    async fn put(&self, key: String, entry: CacheEntry);

    /// Remove an entry, returning it if present
    async fn remove(&self, key: &str) -> Option<CacheEntry>;

    /// Drop every entry
    async fn clear(&self);

    /// Number of entries, fresh or not
    async fn len(&self) -> usize;

    /// Whether the cache holds no entries
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop entries older than `max_age` at `now`; returns how many were removed
    async fn purge_expired(&self, max_age: Duration, now: DateTime<Utc>) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{OutputKind, Payload, ResultMeta};

    fn entry(stored_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry::new(
            ToolResult::success(OutputKind::Dataset, Payload::new(), ResultMeta::new("r", "t")),
            stored_at,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_freshness_boundary() {
        let now = Utc::now();
        let ttl = Duration::from_secs(60);

        assert!(entry(now - chrono::Duration::seconds(59)).is_fresh(ttl, now));
        assert!(!entry(now - chrono::Duration::seconds(60)).is_fresh(ttl, now));
        assert!(!entry(now - chrono::Duration::seconds(3600)).is_fresh(ttl, now));
    }
}
