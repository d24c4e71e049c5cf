//! Persistent result store
//!
//! Store-backed tools keep their latest successful payload under a
//! hierarchical key `data_type/level/identifier`. A stored payload is served
//! without any TTL check and is only replaced by a newer successful run.
//!
//! Backends:
//! - [`InMemoryStore`]: process-local map, the default
//! - [`FileStore`]: one JSON document per key under a root directory

mod file;
mod inmemory;

pub use file::FileStore;
pub use inmemory::InMemoryStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreConfig, StoreMode};
use crate::error::Result;
use crate::tools::{ExecutionContext, Payload};

/// Key-value collaborator for persisted payloads; last write wins
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Payload stored under `key`
    async fn fetch(&self, key: &str) -> Result<Option<Payload>>;

    /// Store `data` under `key`, replacing any previous payload
    async fn save(&self, key: &str, data: &Payload) -> Result<()>;

    /// Remove the payload under `key`; returns whether one existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Every stored key, sorted
    async fn keys(&self) -> Result<Vec<String>>;

    /// Remove every payload
    async fn clear(&self) -> Result<()>;
}

/// Build a hierarchical key `data_type/level/identifier`.
///
/// Each segment is trimmed and any `/` inside it becomes `-`.
pub fn build_key(data_type: &str, level: &str, identifier: &str) -> String {
    fn clean(part: &str) -> String {
        part.trim().replace('/', "-")
    }

    format!("{}/{}/{}", clean(data_type), clean(level), clean(identifier))
}

/// Derive the hierarchical key from a context.
///
/// Reads `data_type`, `level` and `identifier`, falling back to `code` for
/// the identifier. Returns `None` when any of them is absent or empty.
pub fn key_from_context(ctx: &ExecutionContext) -> Option<String> {
    let segment = |key: &str| ctx.get_string(key).filter(|s| !s.trim().is_empty());

    let data_type = segment("data_type")?;
    let level = segment("level")?;
    let identifier = segment("identifier").or_else(|| segment("code"))?;

    Some(build_key(&data_type, &level, &identifier))
}

/// Derives store keys from contexts and delegates to a [`PersistentStore`]
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn PersistentStore>,
}

impl std::fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter").finish_non_exhaustive()
    }
}

impl StoreAdapter {
    /// Wrap a store
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Build the adapter for the configured backend
    pub fn from_config(config: &StoreConfig) -> Self {
        match &config.mode {
            StoreMode::Memory => Self::new(Arc::new(InMemoryStore::new())),
            StoreMode::File { root } => Self::new(Arc::new(FileStore::new(root.clone()))),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    /// Key for `ctx`, if the context carries a complete hierarchy
    pub fn key_for(&self, ctx: &ExecutionContext) -> Option<String> {
        key_from_context(ctx)
    }

    /// Stored payload for `key`
    pub async fn fetch(&self, key: &str) -> Result<Option<Payload>> {
        let found = self.store.fetch(key).await?;
        tracing::trace!(db_key = %key, hit = found.is_some(), "persistent store lookup");
        Ok(found)
    }

    /// Write `data` through under `key`
    pub async fn save(&self, key: &str, data: &Payload) -> Result<()> {
        self.store.save(key, data).await?;
        tracing::debug!(db_key = %key, "saved payload to persistent store");
        Ok(())
    }
}
