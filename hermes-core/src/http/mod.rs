//! Outbound HTTP for research tools

mod client;
mod rate_limit;
mod retry;

pub use client::{DEFAULT_USER_AGENT, ResilientHttpClient};
pub use rate_limit::RateLimiter;
pub use retry::{RetryPolicy, RetryState};
