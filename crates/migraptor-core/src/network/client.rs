//! Authenticated reqwest wrapper for the GitLab REST API.
//!
//! Every request carries the `PRIVATE-TOKEN` header. GitLab reports its
//! budget in `RateLimit-*` headers; once less than a tenth of it is left,
//! requests slow down, and an exhausted budget waits for the reset.

use crate::config::{AppConfig, NetworkConfig};
use crate::{MigraptorError, Result};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Last rate-limit headers seen from the instance.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
    /// Unix time at which `remaining` is refilled.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// Below a tenth of the budget.
    pub fn should_throttle(&self) -> bool {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => remaining < (limit / 10).max(1),
            _ => false,
        }
    }

    /// How long to hold the next request back, if at all.
    ///
    /// An exhausted budget waits for the reset (capped at `ceiling`), a low
    /// one waits `step`.
    pub fn pause(&self, step: Duration, ceiling: Duration) -> Option<Duration> {
        if !self.should_throttle() {
            return None;
        }
        if self.remaining == Some(0) {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            if let Some(reset) = self.reset.filter(|reset| *reset > now) {
                return Some(Duration::from_secs(reset - now).min(ceiling));
            }
        }
        Some(step)
    }
}

/// Authenticated HTTP client for one GitLab API base URL.
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    rate_limit_reset: AtomicU64,
    throttle_delay: Duration,
}

impl HttpClient {
    /// Create a client for `base_url` (e.g. `https://gitlab.com/api/v4`).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| MigraptorError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            rate_limit_reset: AtomicU64::new(0),
            throttle_delay: NetworkConfig::THROTTLE_DELAY,
        })
    }

    /// API base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the current rate limit state.
    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        let reset = self.rate_limit_reset.load(Ordering::SeqCst);
        RateLimitState {
            remaining: (remaining >= 0).then_some(remaining as u64),
            limit: (limit > 0).then_some(limit),
            reset: (reset > 0).then_some(reset),
        }
    }

    /// GET an API path such as `/groups/12/projects`.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let request = self.request(Method::GET, path).query(query);
        self.send(request, path).await
    }

    /// POST a JSON body to an API path.
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response> {
        let request = self.request(Method::POST, path).json(body);
        self.send(request, path).await
    }

    /// PUT a JSON body to an API path.
    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response> {
        let request = self.request(Method::PUT, path).json(body);
        self.send(request, path).await
    }

    /// POST to an API path without a body.
    pub async fn post(&self, path: &str) -> Result<Response> {
        let request = self.request(Method::POST, path);
        self.send(request, path).await
    }

    /// DELETE an API path.
    pub async fn delete(&self, path: &str) -> Result<Response> {
        let request = self.request(Method::DELETE, path);
        self.send(request, path).await
    }

    // Internal methods

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .header(TOKEN_HEADER, &self.token)
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        self.maybe_throttle().await;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MigraptorError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
            } else {
                MigraptorError::Network {
                    message: format!("{} failed: {}", path, e),
                    source: Some(e),
                }
            }
        })?;

        self.update_rate_limits(&response);
        self.check_response_status(response)
    }

    async fn maybe_throttle(&self) {
        let state = self.rate_limit_state();
        if let Some(pause) = state.pause(self.throttle_delay, NetworkConfig::RETRY_MAX_DELAY) {
            warn!(
                "GitLab rate limit low ({:?} of {:?} left), waiting {:?}",
                state.remaining, state.limit, pause
            );
            tokio::time::sleep(pause).await;
        }
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        if let Some(remaining) = read("RateLimit-Remaining") {
            self.rate_limit_remaining
                .store(remaining as i64, Ordering::SeqCst);
        }
        if let Some(limit) = read("RateLimit-Limit") {
            self.rate_limit_limit.store(limit, Ordering::SeqCst);
        }
        if let Some(reset) = read("RateLimit-Reset") {
            self.rate_limit_reset.store(reset, Ordering::SeqCst);
        }

        let state = self.rate_limit_state();
        if let (Some(remaining), Some(limit)) = (state.remaining, state.limit) {
            debug!("Rate limit: {}/{}", remaining, limit);
        }
    }

    fn check_response_status(&self, response: Response) -> Result<Response> {
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            // Callers decide what other statuses mean for their endpoint.
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        Err(MigraptorError::RateLimited {
            service: extract_domain(&self.base_url),
            retry_after_secs: retry_after,
        })
    }
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
