//! Network Adapter Abstraction
//!
//! HTTP requests with per-call timeout and cancellation, JSON fetching backed
//! by a TTL response cache, binary downloads, and connectivity checks.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{NetworkError, NetworkResult};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            cancel: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> NetworkResult<Self> {
        let json = serde_json::to_vec(body)
            .map_err(|e| NetworkError::Unknown(format!("JSON serialization failed: {}", e)))?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Apply per-call options on top of what the builder already holds.
    pub fn with_options(mut self, options: &RequestOptions) -> Self {
        for (key, value) in &options.headers {
            self.headers.insert(key.clone(), value.clone());
        }
        if let Some(timeout) = options.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(cancel) = &options.cancel {
            self.cancel = Some(cancel.clone());
        }
        self
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> NetworkResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| NetworkError::ParseError(format!("JSON deserialization failed: {}", e)))
    }

    /// Get response body as UTF-8 string
    pub fn text(&self) -> NetworkResult<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| NetworkError::ParseError(format!("Invalid UTF-8: {}", e)))
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Turn a non-2xx response into the matching [`NetworkError`].
    pub fn error_for_status(self, url: &str) -> NetworkResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NetworkError::from_status(self.status, url))
        }
    }
}

/// Longest wait between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Largest accepted backoff multiplier.
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Retry policy configuration
///
/// Attempt `n + 1` waits `delay * backoff_factor^(n - 1)` after attempt `n`
/// failed with a retryable error, capped at [`MAX_RETRY_DELAY`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(0.0).powi(exponent);
        let secs = self.delay.as_secs_f64() * factor;
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for [`NetworkAdapter::get_json`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub request: RequestOptions,
    /// Consult and populate the response cache
    pub use_cache: bool,
    /// Read-time freshness override
    pub max_age: Option<Duration>,
    /// TTL stored with a freshly fetched entry
    pub ttl: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request: RequestOptions::default(),
            use_cache: true,
            max_age: None,
            ttl: None,
        }
    }
}

impl FetchOptions {
    pub fn no_cache() -> Self {
        Self {
            use_cache: false,
            ..Self::default()
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }
}

/// Resolve `url` against `base`. Absolute URLs and an empty base pass through.
pub fn resolve_url(base: &str, url: &str) -> String {
    if base.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

/// Network adapter trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{FetchOptions, NetworkAdapter};
///
/// async fn load_books(network: &dyn NetworkAdapter) -> NetworkResult<serde_json::Value> {
///     network
///         .get_json("/bibles/kjv/books.json", FetchOptions::default())
///         .await
/// }
/// ```
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    /// Short adapter name used in logs.
    fn adapter_name(&self) -> &'static str;

    /// Resolve a possibly relative URL against the configured base URL.
    fn resolve(&self, url: &str) -> String;

    /// Execute a request. Non-2xx responses are returned, not turned into errors.
    ///
    /// # Errors
    ///
    /// `TIMEOUT` when the deadline elapses, `ABORTED` when the request's
    /// cancellation token fires, `OFFLINE` / `NETWORK_ERROR` on transport
    /// failure.
    async fn request(&self, request: HttpRequest) -> NetworkResult<HttpResponse>;

    /// Fetch and parse JSON, serving fresh cache hits without a request.
    async fn get_json(&self, url: &str, options: FetchOptions) -> NetworkResult<serde_json::Value> {
        let resolved = self.resolve(url);
        if options.use_cache {
            if let Some(hit) = self.get_cached(&resolved, options.max_age).await {
                return Ok(hit);
            }
        }

        let request = HttpRequest::get(resolved.clone())
            .header("Accept", "application/json")
            .with_options(&options.request);
        let response = self.request(request).await?.error_for_status(&resolved)?;
        let value: serde_json::Value = response.json()?;

        if options.use_cache {
            self.set_cached(&resolved, value.clone(), options.ttl).await;
        }
        Ok(value)
    }

    /// Download a resource into memory.
    async fn download(&self, url: &str, options: RequestOptions) -> NetworkResult<Bytes> {
        let resolved = self.resolve(url);
        let request = HttpRequest::get(resolved.clone()).with_options(&options);
        let response = self.request(request).await?.error_for_status(&resolved)?;
        Ok(response.body)
    }

    /// Cached value for `url` when fresh under `max_age` (or its stored TTL).
    async fn get_cached(&self, url: &str, max_age: Option<Duration>) -> Option<serde_json::Value>;

    /// Store `data` for `url`; `ttl` defaults to the configured max age.
    async fn set_cached(&self, url: &str, data: serde_json::Value, ttl: Option<Duration>);

    async fn clear_cache(&self);

    async fn is_online(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let token = CancellationToken::new();
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .header("User-Agent", "test")
            .bearer_token("secret")
            .timeout(Duration::from_secs(30))
            .with_cancellation(token);

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert!(request.headers.contains_key("Authorization"));
        assert!(request.cancel.is_some());
    }

    #[test]
    fn test_http_response_status_checks() {
        let response = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from("test"),
        };

        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert!(!response.is_server_error());
    }

    #[test]
    fn test_response_json_parse_error() {
        let response = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from("<html>"),
        };
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, NetworkError::ParseError(_)));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://api.example.com/", "/v1/books"),
            "https://api.example.com/v1/books"
        );
        assert_eq!(
            resolve_url("https://api.example.com", "v1/books"),
            "https://api.example.com/v1/books"
        );
        assert_eq!(
            resolve_url("https://api.example.com", "https://cdn.example.com/a"),
            "https://cdn.example.com/a"
        );
        assert_eq!(resolve_url("", "/local"), "/local");
    }

    #[test]
    fn test_retry_backoff_delays() {
        let policy = RetryPolicy {
            max_attempts: 4,
            delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(RetryPolicy::none().attempts(), 1);
        assert_eq!(
            RetryPolicy {
                max_attempts: 0,
                ..RetryPolicy::default()
            }
            .attempts(),
            1
        );
    }

    #[test]
    fn test_retry_delay_saturates() {
        let huge = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            backoff_factor: 1e30,
        };
        assert_eq!(huge.delay_after(1), Duration::from_millis(1000));
        assert_eq!(huge.delay_after(2), MAX_RETRY_DELAY);
        assert_eq!(huge.delay_after(u32::MAX), MAX_RETRY_DELAY);

        let zero_delay = RetryPolicy {
            delay: Duration::ZERO,
            backoff_factor: f64::MAX,
            ..huge.clone()
        };
        assert_eq!(zero_delay.delay_after(3), Duration::ZERO);

        let nan = RetryPolicy {
            backoff_factor: f64::NAN,
            ..huge
        };
        assert_eq!(nan.delay_after(2), Duration::ZERO);
    }

    #[test]
    fn test_request_options_override_builder() {
        let options = RequestOptions::default()
            .header("X-Trace", "1")
            .timeout(Duration::from_millis(5));
        let request = HttpRequest::get("/a")
            .timeout(Duration::from_secs(9))
            .with_options(&options);
        assert_eq!(request.timeout, Some(Duration::from_millis(5)));
        assert_eq!(request.headers.get("X-Trace"), Some(&"1".to_string()));
    }
}
