//! Shared fixtures for unit tests: token builders and an in-process transport.

use crate::{ApiEndpoints, ApiRequest, ApiResponse, AuthResult, HttpTransport};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "http://api.test";

pub fn endpoints() -> ApiEndpoints {
    ApiEndpoints::new(BASE_URL)
}

/// Unsigned token carrying `payload`.
pub fn token_with_payload(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

/// Unsigned token expiring `secs` from now (negative for the past).
pub fn token_expiring_in(secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs;
    token_with_payload(&serde_json::json!({ "exp": exp, "sub": "u1" }))
}

pub fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap();
    ApiResponse::new(status, body.to_string())
}

type Handler = Box<dyn Fn(&ApiRequest) -> AuthResult<ApiResponse> + Send + Sync>;

/// Records every request and answers through a closure.
pub struct MockTransport {
    handler: Handler,
    latency: Duration,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> AuthResult<ApiResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_latency(Duration::ZERO, handler)
    }

    /// Every request takes `latency` before answering.
    pub fn with_latency(
        latency: Duration,
        handler: impl Fn(&ApiRequest) -> AuthResult<ApiResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            latency,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Requests sent to URLs ending in `path`.
    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.requests.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.handler)(&request)
    }
}

/// Counts how often a session-expired hook fired.
#[derive(Clone, Default)]
pub struct HookCounter(Arc<std::sync::atomic::AtomicUsize>);

impl HookCounter {
    pub fn hook(&self) -> crate::SessionExpiredHook {
        let counter = self.0.clone();
        Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
    }

    pub fn count(&self) -> usize {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
