//! Configuration types for the Hermes tool layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HermesError, Result};

/// Upper bound accepted for `http.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Main configuration for Hermes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HermesConfig {
    /// Outbound HTTP behaviour shared by every research tool
    pub http: HttpConfig,

    /// Ephemeral result cache configuration
    pub cache: CacheConfig,

    /// Persistent store configuration
    pub store: StoreConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-attempt request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Additional attempts after the first one
    pub max_retries: u32,

    /// Linear backoff unit; attempt `i` waits `backoff_base * (i + 1)`
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// User-Agent header sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff_base: Duration::from_millis(1200),
            user_agent: None,
        }
    }
}

impl HttpConfig {
    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the linear backoff unit
    pub fn with_backoff_base(mut self, backoff: Duration) -> Self {
        self.backoff_base = backoff;
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Ephemeral cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Disable to bypass the ephemeral tier for every tool
    pub enabled: bool,

    /// Upper bound on cached results; least recently used go first
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// Persistent store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend
    pub mode: StoreMode,
}

/// Persistent store backend
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreMode {
    /// Process-local map, lost on restart
    #[default]
    Memory,

    /// One JSON document per hierarchical key under `root`
    File {
        /// Root directory of the store
        root: PathBuf,
    },
}

impl HermesConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (hermes.toml, then the path in HERMES_CONFIG_PATH)
    /// 3. Environment variable overrides (`HERMES_HTTP__MAX_RETRIES=3`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file("hermes.toml"));

        if let Ok(path) = std::env::var("HERMES_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let figment = figment.merge(Env::prefixed("HERMES_").ignore(&["CONFIG_PATH"]).split("__"));

        let config: HermesConfig = figment.extract().map_err(|e| {
            HermesError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Toml},
        };

        let config: HermesConfig = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                HermesError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.http.timeout.is_zero() {
            return Err(HermesError::Configuration(
                "http.timeout must be greater than zero".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(HermesError::Configuration(
                "cache.max_entries must be greater than zero".to_string(),
            ));
        }
        if self.http.max_retries > MAX_RETRIES_LIMIT {
            return Err(HermesError::Configuration(format!(
                "http.max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.http.max_retries
            )));
        }
        Ok(())
    }
}
