//! Execution context passed to every tool call

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HermesError, Result};

/// String-keyed inputs for one tool execution.
///
/// Read-only from the pipeline's point of view; tools never mutate it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext(Map<String, Value>);

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a context from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `HermesError::Other` if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(HermesError::Other(format!(
                "execution context must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Add a key, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Borrowed string value for `key`, if it is a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Value for `key` rendered as text; strings are returned unquoted
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            value => Some(render_value(value)),
        }
    }

    /// Integer value for `key`, accepting numeric strings
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value for `key`, accepting "true"/"false"
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Entries sorted by key
    pub fn sorted_entries(&self) -> Vec<(&String, &Value)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the context has no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ExecutionContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Render a JSON value as a cache-key component.
///
/// Strings are emitted raw, everything else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let ctx = ExecutionContext::new()
            .with("symbol", "IBM")
            .with("year", 2021)
            .with("year_text", "2019")
            .with("adjusted", true)
            .with("nothing", Value::Null);

        assert_eq!(ctx.get_str("symbol"), Some("IBM"));
        assert_eq!(ctx.get_str("year"), None);
        assert_eq!(ctx.get_string("year").as_deref(), Some("2021"));
        assert_eq!(ctx.get_i64("year"), Some(2021));
        assert_eq!(ctx.get_i64("year_text"), Some(2019));
        assert_eq!(ctx.get_bool("adjusted"), Some(true));
        assert_eq!(ctx.get_string("nothing"), None);
        assert!(ctx.contains("nothing"));
    }

    #[test]
    fn test_from_value_requires_object() {
        let ctx = ExecutionContext::from_value(json!({"a": 1})).unwrap();
        assert_eq!(ctx.len(), 1);
        assert!(ExecutionContext::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_sorted_entries() {
        let ctx = ExecutionContext::new().with("b", 1).with("a", 2).with("c", 3);
        let keys: Vec<_> = ctx.sorted_entries().into_iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("x")), "x");
        assert_eq!(render_value(&json!(5)), "5");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!(["a", 1])), r#"["a",1]"#);
    }
}
