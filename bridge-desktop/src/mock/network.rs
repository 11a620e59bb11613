//! Scripted network adapter for tests and automated environments.

use async_trait::async_trait;
use bridge_traits::{
    error::{NetworkError, NetworkResult},
    http::{resolve_url, HttpMethod, HttpRequest, HttpResponse, NetworkAdapter},
    time::Clock,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::http::{NetworkSettings, ResponseCache};

#[derive(Debug, Clone)]
enum Canned {
    Response(HttpResponse),
    Failure(NetworkError),
}

/// Network adapter answering from canned responses keyed by method and
/// resolved URL. Unmatched requests get a 404 response.
pub struct MockNetworkAdapter {
    settings: NetworkSettings,
    routes: Mutex<HashMap<(HttpMethod, String), Canned>>,
    requests: Mutex<Vec<HttpRequest>>,
    online: AtomicBool,
    cache: ResponseCache,
}

impl MockNetworkAdapter {
    pub fn new(settings: NetworkSettings, clock: Arc<dyn Clock>) -> Self {
        let cache = ResponseCache::new(&settings, clock);
        Self {
            settings,
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            cache,
        }
    }

    /// Answer `method url` with `status` and `body`.
    pub fn respond(&self, method: HttpMethod, url: &str, status: u16, body: impl Into<Bytes>) {
        let response = HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.into(),
        };
        self.routes
            .lock()
            .insert((method, self.resolve(url)), Canned::Response(response));
    }

    /// Answer `GET url` with `value` serialized as JSON.
    pub fn respond_json(&self, url: &str, value: &serde_json::Value) {
        self.respond(HttpMethod::Get, url, 200, value.to_string());
    }

    /// Fail `method url` with `error`.
    pub fn fail(&self, method: HttpMethod, url: &str, error: NetworkError) {
        self.routes
            .lock()
            .insert((method, self.resolve(url)), Canned::Failure(error));
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Requests seen so far, with resolved URLs and merged headers.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl NetworkAdapter for MockNetworkAdapter {
    fn adapter_name(&self) -> &'static str {
        "mock"
    }

    fn resolve(&self, url: &str) -> String {
        resolve_url(&self.settings.base_url, url)
    }

    async fn request(&self, mut request: HttpRequest) -> NetworkResult<HttpResponse> {
        request.url = self.resolve(&request.url);
        let mut headers = self.settings.headers.clone();
        headers.extend(std::mem::take(&mut request.headers));
        request.headers = headers;

        debug!(method = request.method.as_str(), url = %request.url, "Mock request");
        let key = (request.method, request.url.clone());
        let cancelled = request
            .cancel
            .as_ref()
            .is_some_and(|token| token.is_cancelled());
        self.requests.lock().push(request);

        if cancelled {
            return Err(NetworkError::Aborted(key.1));
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline(key.1));
        }

        match self.routes.lock().get(&key) {
            Some(Canned::Response(response)) => Ok(response.clone()),
            Some(Canned::Failure(error)) => Err(error.clone()),
            None => Ok(HttpResponse {
                status: 404,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
        }
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
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::NetworkErrorCode;
    use bridge_traits::http::{FetchOptions, RequestOptions};
    use bridge_traits::time::ManualClock;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn adapter(clock: &ManualClock) -> MockNetworkAdapter {
        let mut settings = NetworkSettings {
            base_url: "https://bible.test".into(),
            ..NetworkSettings::default()
        };
        settings.headers.insert("X-Client".into(), "tests".into());
        MockNetworkAdapter::new(settings, Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_canned_json_and_cache() {
        let clock = ManualClock::at_millis(0);
        let network = adapter(&clock);
        network.respond_json("/books", &json!(["GEN", "EXO"]));

        let options = FetchOptions::default().ttl(Duration::from_millis(50));
        assert_eq!(
            network.get_json("/books", options.clone()).await.unwrap(),
            json!(["GEN", "EXO"])
        );
        network.get_json("/books", options.clone()).await.unwrap();
        assert_eq!(network.request_count(), 1);

        clock.advance(Duration::from_millis(51));
        network.get_json("/books", options).await.unwrap();
        assert_eq!(network.request_count(), 2);
    }

    #[tokio::test]
    async fn test_request_log_records_merged_headers() {
        let network = adapter(&ManualClock::default());
        network.respond(HttpMethod::Get, "https://cdn.test/a.mp3", 200, "ID3");

        let body = network
            .download(
                "https://cdn.test/a.mp3",
                RequestOptions::default().header("Range", "bytes=0-"),
            )
            .await
            .unwrap();
        assert_eq!(body, Bytes::from("ID3"));

        let logged = network.requests();
        assert_eq!(logged[0].url, "https://cdn.test/a.mp3");
        assert_eq!(logged[0].headers.get("X-Client"), Some(&"tests".to_string()));
        assert_eq!(logged[0].headers.get("Range"), Some(&"bytes=0-".to_string()));
    }

    #[tokio::test]
    async fn test_unmatched_and_offline() {
        let network = adapter(&ManualClock::default());
        let err = network
            .get_json("/nope", FetchOptions::no_cache())
            .await
            .unwrap_err();
        assert_eq!(err.code(), NetworkErrorCode::NotFound);

        network.set_online(false);
        assert!(!network.is_online().await);
        let err = network
            .download("/nope", RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), NetworkErrorCode::Offline);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_cancellation() {
        let network = adapter(&ManualClock::default());
        network.fail(
            HttpMethod::Get,
            "/slow",
            NetworkError::Timeout("scripted".into()),
        );
        let err = network
            .download("/slow", RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), NetworkErrorCode::Timeout);

        let token = CancellationToken::new();
        token.cancel();
        let err = network
            .download("/slow", RequestOptions::default().with_cancellation(token))
            .await
            .unwrap_err();
        assert_eq!(err.code(), NetworkErrorCode::Aborted);
    }
}
