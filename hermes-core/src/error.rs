//! Error types for Hermes operations
//!
//! The taxonomy splits into two halves. Caller-side misuse (permissions,
//! inputs, configuration) is fatal and surfaces as `Err` from
//! [`ExecutionPipeline::execute`](crate::tools::ExecutionPipeline::execute).
//! Upstream flakiness (exhausted retries, unparseable payloads) is soft: the
//! pipeline folds it into `ToolResult::errors` instead.

/// Result type for Hermes operations
pub type Result<T> = std::result::Result<T, HermesError>;

/// Error types for the Hermes tool layer
#[derive(Debug, thiserror::Error)]
pub enum HermesError {
    /// Caller is not in the tool's allowed callers
    #[error("caller '{caller}' is not allowed to execute tool '{tool}'")]
    Permission {
        /// Tool that refused the call
        tool: String,
        /// Caller id that was refused
        caller: String,
    },

    /// Required inputs are missing from the execution context
    #[error("[{tool}] missing inputs: {missing:?}")]
    Validation {
        /// Tool that rejected the context
        tool: String,
        /// Every missing required field, sorted
        missing: Vec<String>,
    },

    /// Configuration or credential error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream request failed after all retries
    #[error("[{tool}] error requesting {url}: {cause}")]
    Upstream {
        /// Tool that issued the request
        tool: String,
        /// Requested URL
        url: String,
        /// Last underlying cause
        cause: String,
    },

    /// Provider payload could not be normalized
    #[error("[{tool}] normalization failed: {message}")]
    Normalization {
        /// Tool whose payload was rejected
        tool: String,
        /// What was wrong with it
        message: String,
    },

    /// Registry operation failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Persistent store operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl HermesError {
    /// Build a normalization error for `tool`
    pub fn normalization(tool: impl Into<String>, message: impl Into<String>) -> Self {
        HermesError::Normalization {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error must be raised to the caller rather than captured
    /// into a cached `ToolResult`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HermesError::Permission { .. }
                | HermesError::Validation { .. }
                | HermesError::Configuration(_)
                | HermesError::Registry(_)
                | HermesError::Storage(_)
        )
    }
}

impl From<String> for HermesError {
    fn from(s: String) -> Self {
        HermesError::Other(s)
    }
}

impl From<&str> for HermesError {
    fn from(s: &str) -> Self {
        HermesError::Other(s.to_string())
    }
}
