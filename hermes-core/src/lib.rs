//! # Hermes - policy-gated research tools
//!
//! Hermes runs research tools (public datasets, news, filings, ESG metrics)
//! behind one execution pipeline that provides:
//! - Caller allow-lists and required-input validation
//! - A persistent store keyed by `data_type/level/identifier`
//! - An ephemeral TTL cache that also remembers failures
//! - Rate-limited, retrying HTTP for every upstream provider
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hermes_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HermesConfig::load()?;
//!     let registry = default_registry(&config, &EnvSecrets);
//!     let pipeline = ExecutionPipeline::from_config(&config);
//!
//!     let tool = registry.get("search", "DatasetsWorldWorldBank").unwrap();
//!     let ctx = ExecutionContext::new()
//!         .with("country_code", "BR")
//!         .with("series", "NY.GDP.MKTP.CD");
//!
//!     let result = pipeline.execute(tool.as_ref(), &ctx, "run-1", "tester").await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod research;
pub mod secrets;
pub mod store;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheEntry, InMemoryResultCache, ResultCache};
    pub use crate::config::{CacheConfig, HermesConfig, HttpConfig, StoreConfig, StoreMode};
    pub use crate::error::{HermesError, Result};
    pub use crate::http::{ResilientHttpClient, RetryPolicy};
    pub use crate::research::{ResearchToolOptions, default_registry, span_years};
    pub use crate::secrets::{Credentials, EnvSecrets, SecretsProvider, StaticSecrets};
    pub use crate::store::{
        FileStore, InMemoryStore, PersistentStore, StoreAdapter, build_key, key_from_context,
    };
    pub use crate::tools::{
        BoxedTool, ExecutionContext, ExecutionPipeline, InputField, Manifest, OutputKind,
        Payload, RawPayload, ResultMeta, Scope, ToolContract, ToolRegistry, ToolResult, ToolSpec,
        ToolSummary,
    };
}
