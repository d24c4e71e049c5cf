//! HTTP client with per-tool rate limiting and retries

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::{Value, json};

use super::rate_limit::RateLimiter;
use super::retry::{RetryPolicy, RetryState};
use crate::config::HttpConfig;
use crate::error::{HermesError, Result};

/// Default User-Agent when the configuration does not set one
pub const DEFAULT_USER_AGENT: &str = concat!("hermes/", env!("CARGO_PKG_VERSION"));

/// GET-only client owned by one tool instance.
///
/// Every attempt first waits on the instance's rate limiter. HTTP 429,
/// other non-success statuses and transport failures are retried with
/// linear backoff; once attempts are exhausted the call fails with
/// `HermesError::Upstream` carrying the last cause.
#[derive(Debug)]
pub struct ResilientHttpClient {
    tool: String,
    client: Client,
    retry: RetryPolicy,
    limiter: Option<RateLimiter>,
    default_headers: BTreeMap<String, String>,
}

impl ResilientHttpClient {
    /// Create a client for `tool`.
    ///
    /// # Errors
    ///
    /// Returns `HermesError::Configuration` if the underlying client cannot
    /// be built.
    pub fn new(tool: impl Into<String>, config: &HttpConfig, rate_limit: Option<f64>) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                HermesError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            tool: tool.into(),
            client,
            retry: RetryPolicy::from(config),
            limiter: rate_limit.and_then(RateLimiter::per_second),
            default_headers: BTreeMap::new(),
        })
    }

    /// Add a header sent with every request
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Minimum spacing between attempts, if rate limited
    pub fn min_interval(&self) -> Option<Duration> {
        self.limiter.as_ref().map(RateLimiter::min_interval)
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// A body that is not valid JSON is returned as `{"raw": <text>}`.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        let text = self
            .get_with_retry(url, query, headers, |response| async move {
                response.text().await
            })
            .await?;

        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text })))
    }

    /// GET `url` and return the raw body
    pub async fn get_bytes(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        self.get_with_retry(url, query, headers, |response| async move {
            response.bytes().await.map(|b| b.to_vec())
        })
        .await
    }

    async fn get_with_retry<T, F, Fut>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
        read_body: F,
    ) -> Result<T>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: std::future::Future<Output = reqwest::Result<T>>,
    {
        let target = Url::parse_with_params(url, query.iter().map(|(k, v)| (*k, v.as_str())))
            .map_err(|e| {
                HermesError::Configuration(format!("[{}] invalid url {}: {}", self.tool, url, e))
            })?;

        let mut merged = self.default_headers.clone();
        for (name, value) in headers {
            merged.insert((*name).to_string(), (*value).to_string());
        }

        let mut state = RetryState::new(self.retry.clone());
        while state.should_retry() {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            match self.attempt(&target, &merged).await {
                Ok(response) => match read_body(response).await {
                    Ok(body) => return Ok(body),
                    Err(e) => state.record_failure(e.to_string()),
                },
                Err(cause) => state.record_failure(cause),
            }

            if state.should_retry() {
                let delay = state.next_delay();
                tracing::warn!(
                    tool = %self.tool,
                    url = %url,
                    attempt = state.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = state.last_error().unwrap_or_default(),
                    "upstream attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(HermesError::Upstream {
            tool: self.tool.clone(),
            url: url.to_string(),
            cause: state.last_error().unwrap_or("no attempt made").to_string(),
        })
    }

    async fn attempt(
        &self,
        target: &Url,
        headers: &BTreeMap<String, String>,
    ) -> std::result::Result<reqwest::Response, String> {
        let mut request = self.client.get(target.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::debug!(tool = %self.tool, "upstream throttled the request");
            return Err(format!("HTTP {}", status));
        }
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        tracing::trace!(tool = %self.tool, status = status.as_u16(), "upstream response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(retries: u32) -> HttpConfig {
        HttpConfig::default()
            .with_max_retries(retries)
            .with_backoff_base(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_429_then_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResilientHttpClient::new("Dummy", &fast_config(2), None).unwrap();
        let body = client
            .get_json(&format!("{}/series", server.uri()), &[], &[])
            .await
            .unwrap();

        assert_eq!(body, json!({"value": 1}));
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_last_cause() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = ResilientHttpClient::new("Dummy", &fast_config(2), None).unwrap();
        let url = format!("{}/down", server.uri());
        let err = client.get_json(&url, &[], &[]).await.unwrap_err();

        match err {
            HermesError::Upstream { tool, url: failed, cause } => {
                assert_eq!(tool, "Dummy");
                assert_eq!(failed, url);
                assert!(cause.contains("503"), "cause was {}", cause);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_wrapped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let client = ResilientHttpClient::new("Dummy", &fast_config(0), None).unwrap();
        let body = client.get_json(&server.uri(), &[], &[]).await.unwrap();
        assert_eq!(body, json!({"raw": "<html>nope</html>"}));
    }

    #[tokio::test]
    async fn test_query_and_header_merge() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/obs"))
            .and(query_param("series_id", "GDP"))
            .and(header("x-token", "override"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x00\x01".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResilientHttpClient::new("Dummy", &fast_config(0), None)
            .unwrap()
            .with_default_header("x-token", "default")
            .with_default_header("accept", "application/json");

        let bytes = client
            .get_bytes(
                &format!("{}/obs", server.uri()),
                &[("series_id", "GDP".to_string())],
                &[("x-token", "override")],
            )
            .await
            .unwrap();

        assert_eq!(bytes, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_error() {
        let client = ResilientHttpClient::new("Dummy", &fast_config(0), None).unwrap();
        let err = client.get_json("not a url", &[], &[]).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_rate_limited_calls_are_spaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 1})))
            .expect(4)
            .mount(&server)
            .await;

        // Real clock: a paused one would auto-advance into the request timeout.
        let client = ResilientHttpClient::new("Dummy", &fast_config(0), Some(20.0)).unwrap();
        let url = format!("{}/series", server.uri());
        let started = tokio::time::Instant::now();
        for _ in 0..4 {
            client.get_json(&url, &[], &[]).await.unwrap();
        }

        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_rate_limit_configured() {
        let client = ResilientHttpClient::new("Dummy", &fast_config(0), Some(5.0)).unwrap();
        assert_eq!(client.min_interval(), Some(Duration::from_millis(200)));

        let client = ResilientHttpClient::new("Dummy", &fast_config(0), None).unwrap();
        assert_eq!(client.min_interval(), None);
    }
}
