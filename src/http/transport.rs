//! HTTP transport seam.
//!
//! [`ApiClient`](super::ApiClient) talks to the network only through
//! [`HttpTransport`], so the rate-limit handling can be exercised against
//! [`MockTransport`] without a server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::error::{PodstoreError, Result};

/// A call as the API layer describes it: relative path, no credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A call ready for the wire: absolute URL and headers resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What came back: status, raw retry hint, body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// 200 response carrying `value` as JSON.
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// 429 response with an optional `Retry-After` value.
    pub fn too_many_requests(retry_after: Option<&str>) -> Self {
        Self {
            status: 429,
            retry_after: retry_after.map(str::to_string),
            body: "Too Many Requests".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Sends one prepared request and reports the raw outcome.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse>;
}

/// Transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PodstoreError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Request captured by [`MockTransport`], with the clock reading at send time.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: PreparedRequest,
    pub sent_at: Instant,
}

/// Transport that replays scripted responses in order and records every call.
pub struct MockTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    recorded: Mutex<Vec<RecordedRequest>>,
    clock: Option<Arc<dyn Clock>>,
}

impl MockTransport {
    pub fn new(responses: Vec<ApiResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            recorded: Mutex::new(Vec::new()),
            clock: None,
        }
    }

    /// Stamp recorded requests using `clock` instead of the Tokio clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn push(&self, response: ApiResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.recorded).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.recorded).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse> {
        let sent_at = match &self.clock {
            Some(clock) => clock.now(),
            None => Instant::now(),
        };
        lock(&self.recorded).push(RecordedRequest {
            request: request.clone(),
            sent_at,
        });

        lock(&self.responses).pop_front().ok_or_else(|| {
            PodstoreError::InvalidResponse(format!("no scripted response for {} {}", request.method, request.url))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prepared(path: &str) -> PreparedRequest {
        PreparedRequest {
            method: Method::GET,
            url: format!("https://api.test{}", path),
            headers: vec![("Authorization".to_string(), "Bearer k".to_string())],
            query: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn test_api_request_builders() {
        let request = ApiRequest::get("/orders").with_query("limit", 20).with_query("status", "pending");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/orders");
        assert_eq!(
            request.query,
            vec![
                ("limit".to_string(), "20".to_string()),
                ("status".to_string(), "pending".to_string())
            ]
        );
        assert!(request.body.is_none());

        let request = ApiRequest::post("/store/products", json!({"name": "Tee"}));
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"name": "Tee"})));
    }

    #[test]
    fn test_prepared_request_header_lookup_is_case_insensitive() {
        let request = prepared("/x");
        assert_eq!(request.header("authorization"), Some("Bearer k"));
        assert_eq!(request.header("x-missing"), None);
    }

    #[test]
    fn test_api_response_status_helpers() {
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(404, "nope").is_success());
        let limited = ApiResponse::too_many_requests(Some("5"));
        assert!(limited.is_rate_limited());
        assert_eq!(limited.retry_after.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_mock_transport_replays_in_order() {
        let transport = MockTransport::new(vec![ApiResponse::new(500, "first"), ApiResponse::new(200, "second")]);

        let first = transport.send(&prepared("/a")).await.unwrap();
        let second = transport.send(&prepared("/b")).await.unwrap();

        assert_eq!(first.body, "first");
        assert_eq!(second.body, "second");
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.requests()[1].request.url, "https://api.test/b");
    }

    #[tokio::test]
    async fn test_mock_transport_errors_when_script_runs_out() {
        let transport = MockTransport::new(Vec::new());
        let result = transport.send(&prepared("/a")).await;
        assert!(matches!(result, Err(PodstoreError::InvalidResponse(_))));
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
