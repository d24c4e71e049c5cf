//! In-memory persistent store for tests and single-process deployments

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PersistentStore;
use crate::error::Result;
use crate::tools::Payload;

/// Map-backed store; never fails
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, Payload>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn fetch(&self, key: &str) -> Result<Option<Payload>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, data: &Payload) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), data.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.records.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}
