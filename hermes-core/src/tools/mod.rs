//! Research tool contract and execution pipeline
//!
//! This module provides the policy-gated execution layer every research tool
//! runs through. Key features:
//! - Caller allow-lists checked before any I/O
//! - Required-input validation
//! - Two-tier caching: persistent store (no TTL) over an ephemeral TTL cache
//! - Soft failures captured into the result instead of raised
//!
//! # Example
//!
//! ```rust,no_run
//! use hermes_core::tools::{ExecutionContext, ExecutionPipeline, ToolContract};
//!
//! # async fn run(tool: &dyn ToolContract) -> hermes_core::error::Result<()> {
//! let pipeline = ExecutionPipeline::default();
//! let ctx = ExecutionContext::new().with("country_code", "BR").with("series", "NY.GDP.MKTP.CD");
//! let result = pipeline.execute(tool, &ctx, "run-1", "tester").await?;
//! println!("{} rows", result.items().map(Vec::len).unwrap_or(0));
//! # Ok(())
//! # }
//! ```

mod context;
mod pipeline;
mod registry;
mod result;
mod spec;
mod tool;

pub use context::{ExecutionContext, render_value};
pub use pipeline::ExecutionPipeline;
pub use registry::{DiscoveryResult, RegistryError, ToolRegistry, ToolSummary};
pub use result::{
    FILENAME_KEY, Manifest, Payload, RAW_BYTES_KEY, ResultMeta, ToolResult, binary_payload,
    canonical_json, merge_payload, payload_checksum,
};
pub use spec::{InputField, OutputKind, Scope, SideEffects, ToolSpec, ToolSpecBuilder, parse_ttl};
pub use tool::{BoxedTool, RawPayload, SnapshotMeta, ToolContract};

#[cfg(test)]
mod tests;
