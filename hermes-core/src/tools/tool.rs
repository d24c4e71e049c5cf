//! Tool contract
//!
//! A concrete tool supplies its [`ToolSpec`], a provider call and a
//! normalization step. Validation, cache keying, snapshotting and the
//! post-execution hook have defaults that most tools keep.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::context::{ExecutionContext, render_value};
use super::result::{Manifest, Payload, ToolResult};
use super::spec::ToolSpec;
use crate::error::{HermesError, Result};
use crate::store;

/// Raw provider output handed to [`ToolContract::normalize`]
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Decoded JSON body (or `{"raw": text}` when the body was not JSON)
    Json(Value),
    /// Undecoded response body
    Bytes(Vec<u8>),
}

impl RawPayload {
    /// JSON body, if this is a JSON payload
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RawPayload::Json(value) => Some(value),
            RawPayload::Bytes(_) => None,
        }
    }

    /// Take the JSON body or fail with a normalization error for `tool`
    pub fn into_json(self, tool: &str) -> Result<Value> {
        match self {
            RawPayload::Json(value) => Ok(value),
            RawPayload::Bytes(_) => Err(HermesError::normalization(
                tool,
                "expected a JSON payload, got bytes",
            )),
        }
    }

    /// Take the byte body or fail with a normalization error for `tool`
    pub fn into_bytes(self, tool: &str) -> Result<Vec<u8>> {
        match self {
            RawPayload::Bytes(bytes) => Ok(bytes),
            RawPayload::Json(_) => Err(HermesError::normalization(
                tool,
                "expected a byte payload, got JSON",
            )),
        }
    }
}

/// Provenance handed to [`ToolContract::snapshot`]
#[derive(Debug, Clone, Copy)]
pub struct SnapshotMeta<'a> {
    /// Run producing the payload
    pub run_id: &'a str,
    /// Tool producing the payload
    pub tool_name: &'a str,
}

/// Contract every research tool implements
#[async_trait]
pub trait ToolContract: Send + Sync {
    /// Immutable declaration of the tool
    fn spec(&self) -> &ToolSpec;

    /// Tool name
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Reject contexts missing any required input.
    ///
    /// The error lists every missing field, sorted.
    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        let missing = self.spec().missing_inputs(ctx);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HermesError::Validation {
                tool: self.spec().name.clone(),
                missing,
            })
        }
    }

    /// Ephemeral cache key: `{name}|{scope}|k1=v1|k2=v2...` over sorted keys
    fn cache_key(&self, ctx: &ExecutionContext) -> String {
        let spec = self.spec();
        let mut key = format!("{}|{}", spec.name, spec.scope);
        for (name, value) in ctx.sorted_entries() {
            key.push('|');
            key.push_str(name);
            key.push('=');
            key.push_str(&render_value(value));
        }
        key
    }

    /// Hierarchical persistent-store key, for store-backed tools
    fn store_key(&self, ctx: &ExecutionContext) -> Option<String> {
        if self.spec().store_backed {
            store::key_from_context(ctx)
        } else {
            None
        }
    }

    /// Fetch the raw payload from the upstream provider(s)
    async fn call_providers(&self, ctx: &ExecutionContext) -> Result<RawPayload>;

    /// Shape the raw payload into the tool's canonical mapping.
    ///
    /// Binary documents are returned as `{rawBytes, filename}` (see
    /// [`binary_payload`](super::binary_payload)).
    fn normalize(&self, raw: RawPayload, ctx: &ExecutionContext) -> Result<Payload>;

    /// Record the normalized payload; the default persists nothing
    fn snapshot(&self, data: &Payload, _meta: SnapshotMeta<'_>) -> Manifest {
        Manifest::for_payload(data)
    }

    /// Hook applied to freshly computed results.
    ///
    /// Its output is what gets cached and written through, so cache hits
    /// and persistent hits already carry it.
    fn post_execute(&self, result: ToolResult) -> ToolResult {
        result
    }
}

/// Boxed tool for dynamic dispatch
pub type BoxedTool = Arc<dyn ToolContract>;
