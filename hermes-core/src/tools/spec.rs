//! Tool contract metadata
//!
//! A [`ToolSpec`] is built once when a tool is constructed and never changes
//! afterwards; every execution reads it through a shared reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use super::context::ExecutionContext;
use crate::error::{HermesError, Result};

/// Granularity of the entity a tool targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Countries, regions, global aggregates
    World,
    /// Industries and sector-level series
    Sector,
    /// Individual companies
    Company,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::World => write!(f, "world"),
            Scope::Sector => write!(f, "sector"),
            Scope::Company => write!(f, "company"),
        }
    }
}

/// Shape of a tool's normalized output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Tabular series (`items` of rows)
    Dataset,
    /// Documents, filings, news and other research material
    ResearchBundle,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Dataset => write!(f, "dataset"),
            OutputKind::ResearchBundle => write!(f, "research_bundle"),
        }
    }
}

/// One declared input of a tool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputField {
    /// Context key
    pub name: String,
    /// Whether the key must be present
    pub required: bool,
}

impl InputField {
    /// A field that must be present in the context
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    /// A field the tool reads when present
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// Documentation-only description of what a tool reads and writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffects {
    /// Resources read
    pub reads: Vec<String>,
    /// Resources written
    pub writes: Vec<String>,
}

/// Parse a TTL declaration into seconds.
///
/// Accepts `{N}h`, `{N}d`, a bare second count, or `0`/empty (caching
/// disabled).
///
/// # Errors
///
/// Returns `HermesError::Configuration` for anything else.
pub fn parse_ttl(ttl: &str) -> Result<u64> {
    let ttl = ttl.trim();
    if ttl.is_empty() {
        return Ok(0);
    }

    let (digits, multiplier) = if let Some(hours) = ttl.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(days) = ttl.strip_suffix('d') {
        (days, 86_400)
    } else {
        (ttl, 1)
    };

    let n = digits
        .parse::<u64>()
        .map_err(|_| HermesError::Configuration(format!("invalid ttl: {:?}", ttl)))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| HermesError::Configuration(format!("ttl out of range: {:?}", ttl)))
}

/// Immutable declaration of a tool's contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,

    /// Registry category (e.g. "search")
    pub category: String,

    /// Target entity granularity
    pub scope: Scope,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared inputs
    pub inputs: Vec<InputField>,

    /// Output kind, copied into every `ToolResult::kind`
    pub output: OutputKind,

    /// Ephemeral cache lifetime in seconds; 0 disables the ephemeral tier
    pub ttl_secs: u64,

    /// Side-effects descriptor
    #[serde(default)]
    pub side_effects: SideEffects,

    /// Callers permitted to execute the tool; empty means unrestricted
    pub allowed_callers: BTreeSet<String>,

    /// Minimum spacing between upstream attempts, as requests per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_sec: Option<f64>,

    /// Credentials the tool cannot run without
    #[serde(default)]
    pub required_credentials: Vec<String>,

    /// Credentials the tool uses when available
    #[serde(default)]
    pub optional_credentials: Vec<String>,

    /// Whether results are read from and written through to the persistent store
    #[serde(default)]
    pub store_backed: bool,
}

impl ToolSpec {
    /// Start building a spec
    pub fn builder(
        name: impl Into<String>,
        category: impl Into<String>,
        scope: Scope,
        output: OutputKind,
    ) -> ToolSpecBuilder {
        ToolSpecBuilder::new(name, category, scope, output)
    }

    /// Ephemeral cache lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Whether `caller` may execute this tool
    pub fn permits(&self, caller: &str) -> bool {
        self.allowed_callers.is_empty() || self.allowed_callers.contains(caller)
    }

    /// Names of every required input
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    /// Required inputs absent from `ctx`, sorted
    pub fn missing_inputs(&self, ctx: &ExecutionContext) -> Vec<String> {
        let mut missing: Vec<String> = self
            .required_inputs()
            .filter(|name| !ctx.contains(name))
            .map(str::to_string)
            .collect();
        missing.sort();
        missing
    }
}

/// Builder for [`ToolSpec`]
#[derive(Debug)]
pub struct ToolSpecBuilder {
    spec: ToolSpec,
    ttl: Option<String>,
}

impl ToolSpecBuilder {
    fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        scope: Scope,
        output: OutputKind,
    ) -> Self {
        Self {
            spec: ToolSpec {
                name: name.into(),
                category: category.into(),
                scope,
                description: None,
                inputs: Vec::new(),
                output,
                ttl_secs: 0,
                side_effects: SideEffects::default(),
                allowed_callers: BTreeSet::new(),
                rate_limit_per_sec: None,
                required_credentials: Vec::new(),
                optional_credentials: Vec::new(),
                store_backed: false,
            },
            ttl: None,
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = Some(description.into());
        self
    }

    /// Declare a required input
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.spec.inputs.push(InputField::required(name));
        self
    }

    /// Declare an optional input
    pub fn optional_input(mut self, name: impl Into<String>) -> Self {
        self.spec.inputs.push(InputField::optional(name));
        self
    }

    /// Set the TTL from its textual form (`12h`, `7d`, `3600`, `0`)
    pub fn ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Set the TTL in seconds
    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.ttl = None;
        self.spec.ttl_secs = secs;
        self
    }

    /// Set the side-effects descriptor
    pub fn side_effects(mut self, side_effects: SideEffects) -> Self {
        self.spec.side_effects = side_effects;
        self
    }

    /// Permit a caller
    pub fn allow_caller(mut self, caller: impl Into<String>) -> Self {
        self.spec.allowed_callers.insert(caller.into());
        self
    }

    /// Replace the allowed callers
    pub fn allowed_callers<I, S>(mut self, callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.allowed_callers = callers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-instance rate limit
    pub fn rate_limit(mut self, per_sec: f64) -> Self {
        self.spec.rate_limit_per_sec = Some(per_sec);
        self
    }

    /// Declare a required credential
    pub fn requires_credential(mut self, name: impl Into<String>) -> Self {
        self.spec.required_credentials.push(name.into());
        self
    }

    /// Declare an optional credential
    pub fn optional_credential(mut self, name: impl Into<String>) -> Self {
        self.spec.optional_credentials.push(name.into());
        self
    }

    /// Read from and write through to the persistent store
    pub fn store_backed(mut self) -> Self {
        self.spec.store_backed = true;
        self
    }

    /// Finish the spec.
    ///
    /// # Errors
    ///
    /// Returns `HermesError::Configuration` for an empty name, a malformed
    /// TTL, a non-positive rate limit or a duplicated input name.
    pub fn build(mut self) -> Result<ToolSpec> {
        if self.spec.name.trim().is_empty() {
            return Err(HermesError::Configuration(
                "tool name must not be empty".to_string(),
            ));
        }

        if let Some(ttl) = self.ttl.take() {
            self.spec.ttl_secs = parse_ttl(&ttl)?;
        }

        if let Some(rate) = self.spec.rate_limit_per_sec {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(HermesError::Configuration(format!(
                    "[{}] rate limit must be positive, got {}",
                    self.spec.name, rate
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for field in &self.spec.inputs {
            if !seen.insert(field.name.as_str()) {
                return Err(HermesError::Configuration(format!(
                    "[{}] input '{}' declared twice",
                    self.spec.name, field.name
                )));
            }
        }

        Ok(self.spec)
    }
}
