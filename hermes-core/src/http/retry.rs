//! Retry policy for upstream requests
//!
//! Linear backoff: after failed attempt `i` (0-indexed) the caller waits
//! `backoff_base * (i + 1)` before the next one.

use std::time::Duration;

use crate::config::HttpConfig;

/// Retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Linear backoff unit
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Builder: set the retry count
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builder: set the backoff unit
    pub fn with_backoff_base(mut self, backoff: Duration) -> Self {
        self.backoff_base = backoff;
        self
    }

    /// Total attempts, counting the first
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt.saturating_add(1))
    }
}

/// Retry state tracker
#[derive(Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    last_error: Option<String>,
}

impl RetryState {
    /// Create a new retry state
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            last_error: None,
        }
    }

    /// Whether another attempt is allowed
    pub fn should_retry(&self) -> bool {
        self.attempt < self.policy.total_attempts()
    }

    /// Record a failed attempt
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempt += 1;
        self.last_error = Some(error.into());
    }

    /// Delay before the next attempt
    pub fn next_delay(&self) -> Duration {
        self.policy
            .delay_for_attempt(self.attempt.saturating_sub(1))
    }

    /// Failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// The most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
