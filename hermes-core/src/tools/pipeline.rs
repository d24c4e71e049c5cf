//! Policy-gated execution pipeline
//!
//! The pipeline wraps every tool call with, in order:
//! - caller permission check
//! - input validation
//! - persistent-store lookup (store-backed tools with a complete key)
//! - ephemeral cache lookup (TTL > 0)
//! - provider invocation, normalization and snapshot
//! - the tool's `post_execute` hook
//! - cache write and persistent write-through
//!
//! Permission, validation and configuration failures are returned as `Err`
//! before anything is read or written. Upstream and normalization failures
//! become a result with empty data and a single error, cached like a success.

use chrono::Utc;
use std::sync::Arc;

use super::context::ExecutionContext;
use super::result::{Manifest, Payload, ResultMeta, ToolResult, merge_payload};
use super::tool::{SnapshotMeta, ToolContract};
use crate::cache::{CacheEntry, InMemoryResultCache, ResultCache};
use crate::config::HermesConfig;
use crate::error::{HermesError, Result};
use crate::store::StoreAdapter;

/// Executes tools through the two-tier cache
#[derive(Clone)]
pub struct ExecutionPipeline {
    cache: Arc<dyn ResultCache>,
    store: Option<StoreAdapter>,
    cache_enabled: bool,
}

impl std::fmt::Debug for ExecutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPipeline")
            .field("store", &self.store.is_some())
            .field("cache_enabled", &self.cache_enabled)
            .finish()
    }
}

impl Default for ExecutionPipeline {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryResultCache::new()))
    }
}

impl ExecutionPipeline {
    /// Pipeline over `cache` with no persistent store
    pub fn new(cache: Arc<dyn ResultCache>) -> Self {
        Self {
            cache,
            store: None,
            cache_enabled: true,
        }
    }

    /// Pipeline built from configuration: in-process cache plus the
    /// configured persistent store
    pub fn from_config(config: &HermesConfig) -> Self {
        Self::new(Arc::new(InMemoryResultCache::with_capacity(config.cache.max_entries)))
            .with_store(StoreAdapter::from_config(&config.store))
            .with_cache_enabled(config.cache.enabled)
    }

    /// Attach a persistent store
    pub fn with_store(mut self, store: StoreAdapter) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable or disable the ephemeral tier
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Ephemeral cache
    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    /// Persistent store, if attached
    pub fn store(&self) -> Option<&StoreAdapter> {
        self.store.as_ref()
    }

    /// Execute `tool` for `caller_id` under `run_id`.
    ///
    /// # Errors
    ///
    /// Returns fatal errors only: `Permission`, `Validation`,
    /// `Configuration`, and `Storage` from the persistent store. Upstream
    /// failures are reported in `ToolResult::errors`.
    pub async fn execute(
        &self,
        tool: &dyn ToolContract,
        ctx: &ExecutionContext,
        run_id: &str,
        caller_id: &str,
    ) -> Result<ToolResult> {
        let spec = tool.spec();

        if !spec.permits(caller_id) {
            tracing::warn!(tool = %spec.name, caller = %caller_id, "caller not permitted");
            return Err(HermesError::Permission {
                tool: spec.name.clone(),
                caller: caller_id.to_string(),
            });
        }

        if let Err(e) = tool.validate(ctx) {
            tracing::debug!(tool = %spec.name, error = %e, "context rejected");
            return Err(e);
        }

        let db_key = match &self.store {
            Some(_) => tool.store_key(ctx),
            None => None,
        };

        if let (Some(store), Some(key)) = (&self.store, &db_key) {
            if let Some(stored) = store.fetch(key).await? {
                tracing::debug!(tool = %spec.name, run_id = %run_id, db_key = %key, "persistent store hit");
                let meta = ResultMeta::new(run_id, &spec.name).with_db_key(Some(key.clone()));
                return Ok(ToolResult::success(spec.output, stored, meta));
            }
        }

        let ttl = spec.ttl();
        let caching = self.cache_enabled && !ttl.is_zero();
        let cache_key = tool.cache_key(ctx);

        if caching {
            if let Some(entry) = self.cache.get(&cache_key).await {
                if entry.is_fresh(ttl, Utc::now()) {
                    tracing::debug!(tool = %spec.name, run_id = %run_id, "ephemeral cache hit");
                    return Ok(entry.result);
                }
            }
        }

        let stored_at = Utc::now();
        tracing::info!(tool = %spec.name, run_id = %run_id, "invoking providers");

        let mut meta = ResultMeta::new(run_id, &spec.name).with_db_key(db_key.clone());
        let result = match self.invoke(tool, ctx, run_id).await {
            Ok((data, manifest)) => {
                meta.manifests.push(manifest);
                ToolResult::success(spec.output, data, meta)
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(tool = %spec.name, run_id = %run_id, error = %e, "tool execution failed");
                ToolResult::failure(spec.output, meta, e.to_string())
            }
        };

        let result = tool.post_execute(result);

        if caching {
            self.cache
                .put(cache_key, CacheEntry::new(result.clone(), stored_at, ttl))
                .await;
        }

        if result.is_success() {
            if let (Some(store), Some(key)) = (&self.store, &db_key) {
                store.save(key, &result.data).await?;
            }
        }

        Ok(result)
    }

    async fn invoke(
        &self,
        tool: &dyn ToolContract,
        ctx: &ExecutionContext,
        run_id: &str,
    ) -> Result<(Payload, Manifest)> {
        let raw = tool.call_providers(ctx).await?;
        let normalized = tool.normalize(raw, ctx)?;
        let manifest = tool.snapshot(
            &normalized,
            SnapshotMeta {
                run_id,
                tool_name: tool.name(),
            },
        );
        Ok((merge_payload(Payload::new(), normalized), manifest))
    }
}
