//! Network adapter implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{NetworkError, NetworkResult},
    http::{resolve_url, HttpMethod, HttpRequest, HttpResponse, NetworkAdapter, RetryPolicy},
    network::NetworkMonitor,
    time::Clock,
};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::TtlCache;

/// Response-cache settings shared by the network adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_age: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age: Duration::from_secs(300),
        }
    }
}

/// Resolved configuration for a network adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    pub cache: CacheSettings,
    pub retry: RetryPolicy,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
            cache: CacheSettings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Cache wrapper honoring [`CacheSettings::enabled`] and keying by resolved URL.
#[derive(Clone)]
pub(crate) struct ResponseCache {
    cache: TtlCache<serde_json::Value>,
    enabled: bool,
    base_url: String,
}

impl ResponseCache {
    pub(crate) fn new(settings: &NetworkSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: TtlCache::new(clock, settings.cache.max_age),
            enabled: settings.cache.enabled,
            base_url: settings.base_url.clone(),
        }
    }

    pub(crate) fn get(&self, url: &str, max_age: Option<Duration>) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }
        self.cache.get(&resolve_url(&self.base_url, url), max_age)
    }

    pub(crate) fn set(&self, url: &str, data: serde_json::Value, ttl: Option<Duration>) {
        if self.enabled {
            self.cache.set(resolve_url(&self.base_url, url), data, ttl);
        }
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }

    pub(crate) fn inner(&self) -> &TtlCache<serde_json::Value> {
        &self.cache
    }
}

/// Reqwest-based network adapter
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Per-request deadline and cancellation token
/// - Retry with exponential backoff on timeouts, transport failures and 5xx
/// - TTL response cache for `get_json`
pub struct FetchNetworkAdapter {
    client: Client,
    settings: NetworkSettings,
    cache: ResponseCache,
    monitor: Option<Arc<dyn NetworkMonitor>>,
}

impl FetchNetworkAdapter {
    /// Create an adapter with a default reqwest client
    pub fn new(settings: NetworkSettings, clock: Arc<dyn Clock>) -> NetworkResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("scripture-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, settings, clock))
    }

    /// Create an adapter around a preconfigured client
    pub fn with_client(client: Client, settings: NetworkSettings, clock: Arc<dyn Clock>) -> Self {
        let cache = ResponseCache::new(&settings, clock);
        Self {
            client,
            settings,
            cache,
            monitor: None,
        }
    }

    /// Use `monitor` to tell `OFFLINE` apart from other connection failures
    pub fn with_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    pub fn cache(&self) -> &TtlCache<serde_json::Value> {
        self.cache.inner()
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Build reqwest request; default headers sit under request headers
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        let mut headers = self.settings.headers.clone();
        headers.extend(request.headers.clone());
        for (key, value) in headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        req
    }

    async fn map_transport_error(&self, err: reqwest::Error, url: &str) -> NetworkError {
        if err.is_timeout() {
            return NetworkError::Timeout(format!("{} timed out", url));
        }
        if err.is_connect() {
            if let Some(monitor) = &self.monitor {
                if !monitor.is_connected().await {
                    return NetworkError::Offline(format!("{} unreachable while offline", url));
                }
            }
            return NetworkError::NetworkError(format!("Connection failed: {}", err));
        }
        if err.is_request() || err.is_body() || err.is_decode() {
            return NetworkError::NetworkError(err.to_string());
        }
        NetworkError::Unknown(err.to_string())
    }

    async fn send(&self, request: &HttpRequest) -> NetworkResult<HttpResponse> {
        let response = match self.build_request(request).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.map_transport_error(e, &request.url).await),
        };

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Err(self.map_transport_error(e, &request.url).await),
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// One attempt bounded by the deadline and the cancellation token
    async fn execute_once(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> NetworkResult<HttpResponse> {
        let deadline = request.timeout.unwrap_or(self.settings.timeout);
        tokio::select! {
            _ = cancel.cancelled() => Err(NetworkError::Aborted(format!("{} cancelled", request.url))),
            result = tokio::time::timeout(deadline, self.send(request)) => match result {
                Ok(result) => result,
                Err(_) => Err(NetworkError::Timeout(format!(
                    "{} exceeded {} ms",
                    request.url,
                    deadline.as_millis()
                ))),
            },
        }
    }

    /// Execute request with retry logic
    async fn execute_with_retry(&self, request: HttpRequest) -> NetworkResult<HttpResponse> {
        let policy = &self.settings.retry;
        let attempts = policy.attempts();
        let cancel = request.cancel.clone().unwrap_or_default();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                attempt = attempt,
                max_attempts = attempts,
                method = request.method.as_str(),
                url = %request.url,
                "Executing HTTP request"
            );

            let result = self.execute_once(&request, &cancel).await;
            let retryable = match &result {
                Ok(response) => response.is_server_error(),
                Err(e) => e.is_retryable(),
            };
            if !retryable || attempt >= attempts {
                return result;
            }

            match &result {
                Ok(response) => warn!(
                    status = response.status,
                    attempt = attempt,
                    "HTTP request failed with retryable status"
                ),
                Err(e) => warn!(error = %e, attempt = attempt, "HTTP request failed"),
            }

            let delay = policy.delay_after(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(NetworkError::Aborted(format!("{} cancelled", request.url)));
                }
                _ = sleep(delay) => {}
            }
        }
    }
}

#[async_trait]
impl NetworkAdapter for FetchNetworkAdapter {
    fn adapter_name(&self) -> &'static str {
        "fetch-based"
    }

    fn resolve(&self, url: &str) -> String {
        resolve_url(&self.settings.base_url, url)
    }

    async fn request(&self, mut request: HttpRequest) -> NetworkResult<HttpResponse> {
        request.url = self.resolve(&request.url);
        self.execute_with_retry(request).await
    }

    async fn get_cached(&self, url: &str, max_age: Option<Duration>) -> Option<serde_json::Value> {
        self.cache.get(url, max_age)
    }

    async fn set_cached(&self, url: &str, data: serde_json::Value, ttl: Option<Duration>) {
        self.cache.set(url, data, ttl);
    }

    async fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn is_online(&self) -> bool {
        match &self.monitor {
            Some(monitor) => monitor.is_connected().await,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::{FetchOptions, RequestOptions};
    use bridge_traits::network::NetworkInfo;
    use bridge_traits::time::ManualClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve canned `(status, body)` responses in order; the last repeats.
    async fn spawn_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[n.min(responses.len() - 1)];
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    /// Accept connections and never answer.
    async fn spawn_silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    fn adapter(base_url: &str, retry: RetryPolicy) -> FetchNetworkAdapter {
        let settings = NetworkSettings {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
            retry,
            ..NetworkSettings::default()
        };
        let client = Client::builder().no_proxy().build().unwrap();
        FetchNetworkAdapter::with_client(client, settings, Arc::new(ManualClock::default()))
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(10),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            FetchNetworkAdapter::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            FetchNetworkAdapter::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[tokio::test]
    async fn test_get_json_is_served_from_cache() {
        let (base, hits) = spawn_server(vec![(200, r#"{"books":66}"#)]).await;
        let adapter = adapter(&base, RetryPolicy::none());

        let first = adapter.get_json("/books", FetchOptions::default()).await.unwrap();
        let second = adapter.get_json("books", FetchOptions::default()).await.unwrap();

        assert_eq!(first, json!({"books": 66}));
        assert_eq!(second, first);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(adapter.cache().peek(&format!("{}/books", base)).is_some());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (base, _) = spawn_server(vec![(404, "{}")]).await;
        let adapter = adapter(&base, RetryPolicy::none());
        let err = adapter
            .get_json("/missing", FetchOptions::no_cache())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let (base, _) = spawn_server(vec![(200, "<html>")]).await;
        let adapter = adapter(&base, RetryPolicy::none());
        let err = adapter
            .get_json("/page", FetchOptions::no_cache())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (base, hits) = spawn_server(vec![(503, "{}"), (502, "{}"), (200, "[1]")]).await;
        let adapter = adapter(&base, quick_retry(3));

        let value = adapter
            .get_json("/flaky", FetchOptions::no_cache())
            .await
            .unwrap();
        assert_eq!(value, json!([1]));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let (base, hits) = spawn_server(vec![(500, "{}")]).await;
        let adapter = adapter(&base, quick_retry(2));

        let err = adapter
            .get_json("/down", FetchOptions::no_cache())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::ServerError(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (base, hits) = spawn_server(vec![(404, "{}")]).await;
        let adapter = adapter(&base, quick_retry(3));
        let _ = adapter.download("/gone", RequestOptions::default()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout() {
        let base = spawn_silent_server().await;
        let adapter = adapter(&base, RetryPolicy::none());
        let options = RequestOptions::default().timeout(Duration::from_millis(100));

        let err = adapter.download("/slow", options).await.unwrap_err();
        assert!(matches!(err, NetworkError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_cancellation_maps_to_aborted() {
        let base = spawn_silent_server().await;
        let adapter = adapter(&base, quick_retry(3));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = adapter
            .download("/slow", RequestOptions::default().with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::Aborted(_)));
    }

    struct Offline;

    #[async_trait]
    impl NetworkMonitor for Offline {
        async fn get_network_info(&self) -> bridge_traits::error::Result<NetworkInfo> {
            Err(BridgeError::NotAvailable("no interfaces".into()))
        }
    }

    #[tokio::test]
    async fn test_refused_connection_offline_vs_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let plain = adapter(&base, RetryPolicy::none());
        let err = plain.download("/", RequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, NetworkError::NetworkError(_)));

        let offline = adapter(&base, RetryPolicy::none()).with_monitor(Arc::new(Offline));
        let err = offline
            .download("/", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::Offline(_)));
        assert!(!offline.is_online().await);
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let settings = NetworkSettings {
            cache: CacheSettings {
                enabled: false,
                max_age: Duration::from_secs(60),
            },
            ..NetworkSettings::default()
        };
        let adapter = FetchNetworkAdapter::new(settings, Arc::new(ManualClock::default())).unwrap();

        adapter.set_cached("https://x.test/a", json!(1), None).await;
        assert_eq!(adapter.get_cached("https://x.test/a", None).await, None);
        assert!(adapter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cache_keys_use_resolved_url() {
        let clock = ManualClock::at_millis(0);
        let settings = NetworkSettings {
            base_url: "https://api.test".into(),
            ..NetworkSettings::default()
        };
        let adapter = FetchNetworkAdapter::new(settings, Arc::new(clock.clone())).unwrap();

        adapter
            .set_cached("/v1/kjv", json!("kjv"), Some(Duration::from_millis(50)))
            .await;
        assert_eq!(
            adapter.get_cached("https://api.test/v1/kjv", None).await,
            Some(json!("kjv"))
        );

        clock.advance(Duration::from_millis(51));
        assert_eq!(adapter.get_cached("/v1/kjv", None).await, None);

        adapter.set_cached("/v1/web", json!("web"), None).await;
        adapter.clear_cache().await;
        assert!(adapter.cache().is_empty());
    }
}
