//! Credential lookup for research tools
//!
//! Tools name the credentials they need; a [`SecretsProvider`] supplies the
//! values once, when the tool is constructed. A missing required credential
//! is a configuration error and never reaches the network.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::error::{HermesError, Result};

/// Source of credential values
pub trait SecretsProvider: Send + Sync {
    /// Look up a credential by name
    fn get(&self, name: &str) -> Option<SecretString>;
}

/// Reads credentials from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvSecrets;

impl SecretsProvider for EnvSecrets {
    fn get(&self, name: &str) -> Option<SecretString> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
    }
}

/// Fixed in-memory credentials
#[derive(Default)]
pub struct StaticSecrets {
    values: HashMap<String, SecretString>,
}

impl StaticSecrets {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(name.into(), SecretString::from(value.into()));
        self
    }
}

impl SecretsProvider for StaticSecrets {
    fn get(&self, name: &str) -> Option<SecretString> {
        self.values
            .get(name)
            .map(|v| v.expose_secret())
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.to_string()))
    }
}

/// Credentials resolved for one tool instance
#[derive(Default)]
pub struct Credentials {
    values: HashMap<String, SecretString>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Credentials").field("names", &names).finish()
    }
}

impl Credentials {
    /// Resolve `required` and `optional` credential names for `tool`.
    ///
    /// # Errors
    ///
    /// Returns `HermesError::Configuration` naming every required key the
    /// provider does not have.
    pub fn resolve(
        tool: &str,
        provider: &dyn SecretsProvider,
        required: &[String],
        optional: &[String],
    ) -> Result<Self> {
        let mut values = HashMap::new();
        let mut missing = Vec::new();

        for name in required {
            match provider.get(name) {
                Some(value) => {
                    values.insert(name.clone(), value);
                }
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(HermesError::Configuration(format!(
                "[{}] missing required env vars: {:?}",
                tool, missing
            )));
        }

        for name in optional {
            if let Some(value) = provider.get(name) {
                values.insert(name.clone(), value);
            }
        }

        Ok(Self { values })
    }

    /// Exposed value of a credential, if present
    pub fn expose(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.expose_secret())
    }

    /// Exposed value of a credential that was resolved as required.
    ///
    /// # Errors
    ///
    /// Returns `HermesError::Configuration` if the credential is absent.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.expose(name).ok_or_else(|| {
            HermesError::Configuration(format!("credential '{}' was not resolved", name))
        })
    }
}
