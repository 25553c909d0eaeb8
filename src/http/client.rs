//! API client shim shared by the fulfillment and platform clients.
//!
//! One logical call moves through
//! `PENDING -> DISPATCHED -> (SUCCESS | RATE_LIMITED -> PENDING | FAILED)`.
//! A 429 is waited out in place, so when the call runs as a scheduler task the
//! retry keeps the scheduler's single execution slot instead of re-queueing.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::clock::Clock;
use crate::error::{PodstoreError, Result};
use crate::http::retry::RetryPolicy;
use crate::http::transport::{ApiRequest, HttpTransport, PreparedRequest};
use crate::scheduler::{Pacer, RequestScheduler};

/// Base URL, credentials, and retry policy for one remote API.
#[derive(Clone)]
pub struct ApiClient {
    name: String,
    base_url: String,
    headers: Vec<(String, String)>,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Vec::new(),
            transport,
            clock,
            retry,
        }
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolve a relative request against the base URL and default headers.
    pub fn prepare(&self, request: &ApiRequest) -> PreparedRequest {
        let path = request.path.trim_start_matches('/');
        PreparedRequest {
            method: request.method.clone(),
            url: format!("{}/{}", self.base_url, path),
            headers: self.headers.clone(),
            query: request.query.clone(),
            body: request.body.clone(),
        }
    }

    /// Perform one logical call, waiting out 429 answers up to the retry bound.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let prepared = self.prepare(request);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let response = self.transport.send(&prepared).await?;

            if response.is_rate_limited() {
                if !self.retry.allows_another(attempts) {
                    tracing::error!(
                        api = %self.name,
                        path = %request.path,
                        attempts,
                        "Rate limited, giving up"
                    );
                    return Err(PodstoreError::RateLimitExhausted { attempts });
                }

                let delay = self.retry.retry_delay(response.retry_after.as_deref());
                tracing::warn!(
                    api = %self.name,
                    path = %request.path,
                    attempt = attempts,
                    retry_after_ms = delay.as_millis() as u64,
                    "Rate limited, retrying"
                );
                self.clock.sleep(delay).await;
                continue;
            }

            if !response.is_success() {
                tracing::debug!(api = %self.name, path = %request.path, status = response.status, "Request failed");
                return Err(PodstoreError::Api {
                    status: response.status,
                    body: response.body,
                });
            }

            return decode_body(&response.body);
        }
    }

    /// Run [`execute`](Self::execute) as a task on `scheduler`.
    pub async fn scheduled<P, T>(&self, scheduler: &RequestScheduler<P>, request: ApiRequest) -> Result<T>
    where
        P: Pacer,
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        scheduler
            .enqueue(move || async move { client.execute(&request).await })
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Header values carry credentials; only the names are shown
        let header_names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("ApiClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("headers", &header_names)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Decode a JSON body. An empty body reads as `null`.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text).map_err(|e| PodstoreError::InvalidResponse(format!("Failed to parse response: {}", e)))
}
