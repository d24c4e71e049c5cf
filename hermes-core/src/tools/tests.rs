//! Pipeline tests for the tools module

use super::*;
use crate::cache::{CacheEntry, InMemoryResultCache, ResultCache};
use crate::error::{HermesError, Result};
use crate::store::{InMemoryStore, PersistentStore, StoreAdapter};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    UpstreamDown,
    BadPayload,
    MissingCredential,
}

/// A tool that counts provider calls
struct CountingTool {
    spec: ToolSpec,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl CountingTool {
    fn new(behavior: Behavior) -> Self {
        Self::with_spec(spec_builder().ttl("1h").build().unwrap(), behavior)
    }

    fn with_spec(spec: ToolSpec, behavior: Behavior) -> Self {
        Self {
            spec,
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn spec_builder() -> ToolSpecBuilder {
    ToolSpec::builder("Dummy", "search", Scope::Sector, OutputKind::Dataset)
        .input("series_id")
        .optional_input("frequency")
        .allow_caller("tester")
}

#[async_trait]
impl ToolContract for CountingTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behavior {
            Behavior::Succeed => Ok(RawPayload::Json(json!({
                "observations": [{"date": "2024-01-01", "value": "1.5"}],
                "series": ctx.get_str("series_id"),
                "call": n,
            }))),
            Behavior::UpstreamDown => Err(HermesError::Upstream {
                tool: self.spec.name.clone(),
                url: "https://upstream.test/obs".into(),
                cause: "HTTP 503 Service Unavailable".into(),
            }),
            Behavior::BadPayload => Ok(RawPayload::Json(json!({"unexpected": true}))),
            Behavior::MissingCredential => Err(HermesError::Configuration(
                "[Dummy] missing required env vars: [\"DUMMY_KEY\"]".into(),
            )),
        }
    }

    fn normalize(&self, raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
        let raw = raw.into_json(self.name())?;
        let observations = raw
            .get("observations")
            .and_then(Value::as_array)
            .ok_or_else(|| HermesError::normalization(self.name(), "no observations"))?;

        let mut data = Payload::new();
        data.insert("items".into(), Value::Array(observations.clone()));
        data.insert("call".into(), raw["call"].clone());
        Ok(data)
    }

    fn post_execute(&self, mut result: ToolResult) -> ToolResult {
        result.data.insert("decorated".into(), json!(true));
        result
    }
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new().with("series_id", "GDP")
}

fn stored_ctx() -> ExecutionContext {
    ctx()
        .with("data_type", "dataset")
        .with("level", "sector")
        .with("identifier", "GDP")
}

fn pipeline_with_store() -> (ExecutionPipeline, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = ExecutionPipeline::default().with_store(StoreAdapter::new(store.clone()));
    (pipeline, store)
}

#[tokio::test]
async fn test_cache_hit_preserves_first_run_id() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    let first = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    let second = pipeline.execute(&tool, &ctx(), "run-2", "tester").await.unwrap();

    assert_eq!(tool.calls(), 1);
    assert_eq!(first.meta.run_id, "run-1");
    assert_eq!(second.meta.run_id, "run-1");
    assert_eq!(first.items(), second.items());
    assert_eq!(second.data["call"], json!(1));
}

#[tokio::test]
async fn test_cache_hit_matches_post_executed_result() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    let fresh = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    let cached = pipeline.execute(&tool, &ctx(), "run-2", "tester").await.unwrap();

    assert_eq!(tool.calls(), 1);
    assert_eq!(fresh.data.get("decorated"), Some(&json!(true)));
    assert_eq!(cached.data, fresh.data);
    assert_eq!(
        serde_json::to_string(&cached.data).unwrap(),
        serde_json::to_string(&fresh.data).unwrap()
    );
}

#[tokio::test]
async fn test_write_through_stores_post_executed_data() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::with_spec(
        spec_builder().ttl("1h").store_backed().build().unwrap(),
        Behavior::Succeed,
    );

    let fresh = pipeline.execute(&tool, &stored_ctx(), "run-1", "tester").await.unwrap();
    let saved = store.fetch("dataset/sector/GDP").await.unwrap().unwrap();
    assert_eq!(saved, fresh.data);
    assert_eq!(saved.get("decorated"), Some(&json!(true)));
}

#[tokio::test]
async fn test_fresh_result_shape() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    let result = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.kind, OutputKind::Dataset);
    assert_eq!(result.meta.tool_name, "Dummy");
    assert_eq!(result.meta.db_key, None);
    assert_eq!(result.meta.manifests.len(), 1);
    assert!(result.meta.manifests[0].paths.is_empty());
    assert_eq!(result.meta.manifests[0].checksum.len(), 64);
}

#[tokio::test]
async fn test_missing_input_fails_without_provider_call() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    let err = pipeline
        .execute(&tool, &ExecutionContext::new(), "run-1", "tester")
        .await
        .unwrap_err();

    assert!(matches!(err, HermesError::Validation { ref missing, .. } if missing == &vec!["series_id".to_string()]));
    assert_eq!(tool.calls(), 0);
    assert!(pipeline.cache().is_empty().await);
}

#[tokio::test]
async fn test_permission_denied_touches_nothing() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::new(Behavior::Succeed);

    let err = pipeline
        .execute(&tool, &stored_ctx(), "run-1", "intruder")
        .await
        .unwrap_err();

    assert!(matches!(err, HermesError::Permission { ref caller, .. } if caller == "intruder"));
    assert_eq!(tool.calls(), 0);
    assert!(pipeline.cache().is_empty().await);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_permission_checked_before_validation() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    let err = pipeline
        .execute(&tool, &ExecutionContext::new(), "run-1", "intruder")
        .await
        .unwrap_err();
    assert!(matches!(err, HermesError::Permission { .. }));
}

#[tokio::test]
async fn test_persistent_hit_returns_stored_value_verbatim() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::with_spec(
        spec_builder().ttl("1h").store_backed().build().unwrap(),
        Behavior::Succeed,
    );

    let mut stored = Payload::new();
    stored.insert("items".into(), json!([{"date": "1999-01-01", "value": 7}]));
    store.save("dataset/sector/GDP", &stored).await.unwrap();

    let result = pipeline.execute(&tool, &stored_ctx(), "run-9", "tester").await.unwrap();

    assert_eq!(tool.calls(), 0);
    assert_eq!(result.data, stored);
    assert_eq!(result.meta.run_id, "run-9");
    assert_eq!(result.meta.db_key.as_deref(), Some("dataset/sector/GDP"));
    assert!(result.meta.manifests.is_empty());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_persistent_hit_bypasses_zero_ttl() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::with_spec(
        spec_builder().ttl("0").store_backed().build().unwrap(),
        Behavior::Succeed,
    );

    store.save("dataset/sector/GDP", &Payload::new()).await.unwrap();
    pipeline.execute(&tool, &stored_ctx(), "run-1", "tester").await.unwrap();
    pipeline.execute(&tool, &stored_ctx(), "run-2", "tester").await.unwrap();

    assert_eq!(tool.calls(), 0);
}

#[tokio::test]
async fn test_success_writes_through_to_store() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::with_spec(
        spec_builder().ttl("1h").store_backed().build().unwrap(),
        Behavior::Succeed,
    );

    let fresh = pipeline.execute(&tool, &stored_ctx(), "run-1", "tester").await.unwrap();
    assert_eq!(fresh.meta.db_key.as_deref(), Some("dataset/sector/GDP"));

    let saved = store.fetch("dataset/sector/GDP").await.unwrap().unwrap();
    assert_eq!(saved.get("items"), fresh.data.get("items"));

    pipeline.cache().clear().await;
    let again = pipeline.execute(&tool, &stored_ctx(), "run-2", "tester").await.unwrap();
    assert_eq!(tool.calls(), 1);
    assert_eq!(again.meta.run_id, "run-2");
}

#[tokio::test]
async fn test_incomplete_key_skips_persistent_layer() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::with_spec(
        spec_builder().ttl("1h").store_backed().build().unwrap(),
        Behavior::Succeed,
    );

    let result = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.meta.db_key, None);
    assert!(store.is_empty().await);
    assert_eq!(pipeline.cache().len().await, 1);
}

#[tokio::test]
async fn test_upstream_failure_is_soft_and_cached() {
    let (pipeline, store) = pipeline_with_store();
    let tool = CountingTool::with_spec(
        spec_builder().ttl("1h").store_backed().build().unwrap(),
        Behavior::UpstreamDown,
    );

    let first = pipeline.execute(&tool, &stored_ctx(), "run-1", "tester").await.unwrap();
    assert!(first.data.is_empty());
    assert_eq!(first.errors.len(), 1);
    assert!(first.errors[0].contains("error requesting https://upstream.test/obs"));
    assert!(first.meta.manifests.is_empty());

    let second = pipeline.execute(&tool, &stored_ctx(), "run-2", "tester").await.unwrap();
    assert_eq!(tool.calls(), 1);
    assert_eq!(second.errors, first.errors);
    assert_eq!(second.meta.run_id, "run-1");

    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_normalization_failure_is_soft() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::BadPayload);

    let result = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    assert!(result.data.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("no observations"));
}

#[tokio::test]
async fn test_configuration_error_is_fatal_and_not_cached() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::MissingCredential);

    let err = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap_err();
    assert!(matches!(err, HermesError::Configuration(_)));
    assert!(pipeline.cache().is_empty().await);
}

#[tokio::test]
async fn test_zero_ttl_disables_ephemeral_tier() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::with_spec(spec_builder().ttl("0").build().unwrap(), Behavior::Succeed);

    let first = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    let second = pipeline.execute(&tool, &ctx(), "run-2", "tester").await.unwrap();

    assert_eq!(tool.calls(), 2);
    assert_eq!(second.meta.run_id, "run-2");
    assert_ne!(first.data["call"], second.data["call"]);
    assert!(pipeline.cache().is_empty().await);
}

#[tokio::test]
async fn test_disabled_cache_invokes_every_time() {
    let pipeline = ExecutionPipeline::default().with_cache_enabled(false);
    let tool = CountingTool::new(Behavior::Succeed);

    pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    pipeline.execute(&tool, &ctx(), "run-2", "tester").await.unwrap();

    assert_eq!(tool.calls(), 2);
}

#[tokio::test]
async fn test_expired_entry_is_recomputed() {
    let cache = Arc::new(InMemoryResultCache::new());
    let pipeline = ExecutionPipeline::new(cache.clone());
    let tool = CountingTool::new(Behavior::Succeed);

    let stale = ToolResult::success(
        OutputKind::Dataset,
        Payload::new(),
        ResultMeta::new("ancient-run", "Dummy"),
    );
    cache
        .put(
            tool.cache_key(&ctx()),
            CacheEntry::new(
                stale,
                chrono::Utc::now() - chrono::Duration::hours(2),
                std::time::Duration::from_secs(3600),
            ),
        )
        .await;

    let result = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    assert_eq!(tool.calls(), 1);
    assert_eq!(result.meta.run_id, "run-1");
}

#[tokio::test]
async fn test_distinct_contexts_do_not_share_entries() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    pipeline
        .execute(&tool, &ctx().with("frequency", "m"), "run-1", "tester")
        .await
        .unwrap();

    assert_eq!(tool.calls(), 2);
    assert_eq!(pipeline.cache().len().await, 2);
}

#[tokio::test]
async fn test_unrestricted_tool_admits_any_caller() {
    let pipeline = ExecutionPipeline::default();
    let spec = ToolSpec::builder("Open", "search", Scope::World, OutputKind::Dataset)
        .input("series_id")
        .ttl("1h")
        .build()
        .unwrap();
    let tool = CountingTool::with_spec(spec, Behavior::Succeed);

    let result = pipeline.execute(&tool, &ctx(), "run-1", "anyone").await.unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn test_result_serialization_shape() {
    let pipeline = ExecutionPipeline::default();
    let tool = CountingTool::new(Behavior::Succeed);

    let result = pipeline.execute(&tool, &ctx(), "run-1", "tester").await.unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["kind"], json!("dataset"));
    assert_eq!(value["meta"]["run_id"], json!("run-1"));
    assert_eq!(value["meta"]["tool_name"], json!("Dummy"));
    assert!(value["meta"].get("db_key").is_none());
    assert!(value["meta"]["manifests"].is_array());
    assert_eq!(value["errors"], json!([]));
}
