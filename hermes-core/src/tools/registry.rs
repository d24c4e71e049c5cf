//! Tool registry keyed by (category, name)
//!
//! The `ToolRegistry` provides:
//! - Registration with duplicate detection
//! - Lookup by category and name, or by name alone
//! - Caller-based filtering against each tool's allowed callers
//! - Substring discovery over names and descriptions
//!
//! # Example
//!
//! ```rust,ignore
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(DatasetsWorldWorldBank::new(&config.http, &EnvSecrets)?))?;
//!
//! let tool = registry.get("search", "DatasetsWorldWorldBank").unwrap();
//! let result = pipeline.execute(tool.as_ref(), &ctx, "run-1", "tester").await?;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::spec::{OutputKind, Scope};
use super::tool::ToolContract;
use crate::error::HermesError;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this category and name already exists
    DuplicateTool {
        /// Category of the existing tool
        category: String,
        /// Name of the existing tool
        name: String,
    },
    /// Tool not found
    NotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateTool { category, name } => {
                write!(f, "Tool '{}/{}' is already registered", category, name)
            }
            RegistryError::NotFound(name) => {
                write!(f, "Tool '{}' not found", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for HermesError {
    fn from(e: RegistryError) -> Self {
        HermesError::Registry(e.to_string())
    }
}

/// Summary of a tool for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Registry category
    pub category: String,
    /// Tool name
    pub name: String,
    /// Target scope
    pub scope: Scope,
    /// Output kind
    pub output: OutputKind,
    /// Description, if declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Required input names
    pub required_inputs: Vec<String>,
    /// Optional input names
    pub optional_inputs: Vec<String>,
    /// Ephemeral TTL in seconds
    pub ttl_secs: u64,
    /// Whether the tool writes through to the persistent store
    pub store_backed: bool,
}

impl From<&dyn ToolContract> for ToolSummary {
    fn from(tool: &dyn ToolContract) -> Self {
        let spec = tool.spec();
        let (required, optional): (Vec<_>, Vec<_>) = spec.inputs.iter().partition(|f| f.required);
        Self {
            category: spec.category.clone(),
            name: spec.name.clone(),
            scope: spec.scope,
            output: spec.output,
            description: spec.description.clone(),
            required_inputs: required.into_iter().map(|f| f.name.clone()).collect(),
            optional_inputs: optional.into_iter().map(|f| f.name.clone()).collect(),
            ttl_secs: spec.ttl_secs,
            store_backed: spec.store_backed,
        }
    }
}

/// Result of a tool discovery search
#[derive(Clone)]
pub struct DiscoveryResult {
    /// The matching tool
    pub tool: Arc<dyn ToolContract>,
    /// Relevance score (0.0 to 1.0)
    pub score: f32,
}

impl std::fmt::Debug for DiscoveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryResult")
            .field("tool_name", &self.tool.name())
            .field("score", &self.score)
            .finish()
    }
}

fn discovery_score(query: &str, tool: &dyn ToolContract) -> f32 {
    let query = query.to_lowercase();
    let spec = tool.spec();
    let name = spec.name.to_lowercase();

    if name == query {
        return 1.0;
    }

    let mut score = 0.0f32;
    if name.contains(&query) {
        score = score.max(0.9);
    }
    if let Some(description) = &spec.description {
        let description = description.to_lowercase();
        if description.contains(&query) {
            score = score.max(0.7);
        }

        let words: Vec<&str> = query.split_whitespace().collect();
        if !words.is_empty() {
            let matches = words
                .iter()
                .filter(|w| w.len() > 2 && description.contains(*w))
                .count();
            score = score.max((matches as f32 / words.len() as f32) * 0.6);
        }
    }
    if spec.scope.to_string() == query || spec.category.to_lowercase() == query {
        score = score.max(0.5);
    }

    score
}

/// Registry of research tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<(String, String), Arc<dyn ToolContract>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// Returns an error if a tool with the same category and name is
    /// already registered.
    pub fn register(&mut self, tool: Arc<dyn ToolContract>) -> Result<(), RegistryError> {
        let spec = tool.spec();
        let key = (spec.category.clone(), spec.name.clone());
        if self.tools.contains_key(&key) {
            return Err(RegistryError::DuplicateTool {
                category: key.0,
                name: key.1,
            });
        }
        self.tools.insert(key, tool);
        Ok(())
    }

    /// Remove a tool
    pub fn unregister(&mut self, category: &str, name: &str) -> Option<Arc<dyn ToolContract>> {
        self.tools.remove(&(category.to_string(), name.to_string()))
    }

    /// Get a tool by category and name
    pub fn get(&self, category: &str, name: &str) -> Option<&Arc<dyn ToolContract>> {
        self.tools.get(&(category.to_string(), name.to_string()))
    }

    /// Get a tool by name in any category.
    ///
    /// Fails if no tool, or more than one, carries the name.
    pub fn get_by_name(&self, name: &str) -> Result<&Arc<dyn ToolContract>, RegistryError> {
        let mut matches = self
            .tools
            .iter()
            .filter(|((_, n), _)| n == name)
            .map(|(_, tool)| tool);

        match (matches.next(), matches.next()) {
            (Some(tool), None) => Ok(tool),
            (Some(first), Some(_)) => Err(RegistryError::DuplicateTool {
                category: first.spec().category.clone(),
                name: name.to_string(),
            }),
            (None, _) => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    /// Every tool, ordered by category then name
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn ToolContract>> {
        self.tools.values()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Summaries of every tool, ordered by category then name
    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.tools
            .values()
            .map(|t| ToolSummary::from(t.as_ref()))
            .collect()
    }

    /// Tools that `caller` is allowed to execute
    pub fn available_to(&self, caller: &str) -> Vec<&Arc<dyn ToolContract>> {
        self.tools
            .values()
            .filter(|tool| tool.spec().permits(caller))
            .collect()
    }

    /// Discover tools matching a query
    ///
    /// Returns tools sorted by relevance score (highest first), keeping
    /// only scores of at least 0.1.
    pub fn discover(&self, query: &str) -> Vec<DiscoveryResult> {
        let mut results: Vec<DiscoveryResult> = self
            .tools
            .values()
            .filter_map(|tool| {
                let score = discovery_score(query, tool.as_ref());
                (score >= 0.1).then(|| DiscoveryResult {
                    tool: Arc::clone(tool),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::tools::{ExecutionContext, Payload, RawPayload, ToolSpec};
    use async_trait::async_trait;

    struct StaticTool {
        spec: ToolSpec,
    }

    impl StaticTool {
        fn new(name: &str, category: &str, callers: &[&str], description: &str) -> Arc<dyn ToolContract> {
            Arc::new(Self {
                spec: ToolSpec::builder(name, category, Scope::World, OutputKind::Dataset)
                    .description(description)
                    .input("country_code")
                    .optional_input("start_year")
                    .allowed_callers(callers.iter().copied())
                    .ttl("7d")
                    .build()
                    .unwrap(),
            })
        }
    }

    #[async_trait]
    impl ToolContract for StaticTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn call_providers(&self, _ctx: &ExecutionContext) -> Result<RawPayload> {
            Ok(RawPayload::Json(serde_json::json!({})))
        }

        fn normalize(&self, _raw: RawPayload, _ctx: &ExecutionContext) -> Result<Payload> {
            Ok(Payload::new())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(StaticTool::new("WorldBank", "search", &["tester"], "World Bank indicators"))
            .unwrap();
        registry
            .register(StaticTool::new("Gdelt", "search", &[], "Global news events"))
            .unwrap();
        registry
            .register(StaticTool::new("Gdelt", "archive", &["analyst"], "Archived news events"))
            .unwrap();
        registry
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = registry();
        let err = registry
            .register(StaticTool::new("WorldBank", "search", &[], "again"))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateTool {
                category: "search".into(),
                name: "WorldBank".into()
            }
        );
        assert_eq!(registry.len(), 3);

        let hermes: HermesError = err.into();
        assert!(hermes.is_fatal());
    }

    #[test]
    fn test_lookup() {
        let registry = registry();
        assert!(registry.get("search", "WorldBank").is_some());
        assert!(registry.get("archive", "WorldBank").is_none());

        assert_eq!(registry.get_by_name("WorldBank").unwrap().name(), "WorldBank");
        assert!(matches!(
            registry.get_by_name("Gdelt"),
            Err(RegistryError::DuplicateTool { .. })
        ));
        assert!(matches!(
            registry.get_by_name("Missing"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_summaries_sorted() {
        let summaries = registry().summaries();
        let keys: Vec<_> = summaries
            .iter()
            .map(|s| format!("{}/{}", s.category, s.name))
            .collect();
        assert_eq!(keys, vec!["archive/Gdelt", "search/Gdelt", "search/WorldBank"]);
        assert_eq!(summaries[2].required_inputs, vec!["country_code"]);
        assert_eq!(summaries[2].optional_inputs, vec!["start_year"]);
        assert_eq!(summaries[2].ttl_secs, 7 * 86_400);
    }

    #[test]
    fn test_available_to() {
        let registry = registry();
        let names = |caller: &str| -> Vec<String> {
            registry
                .available_to(caller)
                .into_iter()
                .map(|t| format!("{}/{}", t.spec().category, t.name()))
                .collect()
        };

        assert_eq!(names("tester"), vec!["search/Gdelt", "search/WorldBank"]);
        assert_eq!(names("analyst"), vec!["archive/Gdelt", "search/Gdelt"]);
    }

    #[test]
    fn test_discover() {
        let registry = registry();
        let results = registry.discover("worldbank");
        assert_eq!(results[0].tool.name(), "WorldBank");
        assert_eq!(results[0].score, 1.0);

        let results = registry.discover("news events");
        assert_eq!(results.len(), 2);
        assert!(registry.discover("zzz").is_empty());
    }

    #[test]
    fn test_unregister() {
        let mut registry = registry();
        assert!(registry.unregister("archive", "Gdelt").is_some());
        assert!(registry.get_by_name("Gdelt").is_ok());
        assert!(registry.unregister("archive", "Gdelt").is_none());
    }
}
