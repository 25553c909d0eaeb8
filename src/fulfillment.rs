//! Print-on-demand fulfillment provider client.
//!
//! The provider publishes two quotas: a generous one for general endpoints
//! and a much stricter one for product publishing. Each gets its own
//! scheduler so heavy catalog reads never eat into the publishing budget and
//! vice versa.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock::{Clock, SystemClock};
use crate::config::FulfillmentConfig;
use crate::error::{PodstoreError, Result};
use crate::http::{ApiClient, ApiRequest, HttpTransport, ReqwestTransport, RetryPolicy};
use crate::scheduler::{FixedDelay, Pacer, RequestScheduler, SchedulerConfig};

/// Header selecting the store when one key spans several.
const STORE_ID_HEADER: &str = "X-PF-Store-Id";

/// Provider responses wrap the payload as `{ "code": .., "result": .., "paging": .. }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
    #[serde(default)]
    paging: Option<Paging>,
}

/// Paging block attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paging: Option<Paging>,
}

/// Client for the fulfillment provider.
pub struct FulfillmentClient<P: Pacer = FixedDelay> {
    api: ApiClient,
    general: RequestScheduler<P>,
    publish: RequestScheduler<P>,
}

impl FulfillmentClient<FixedDelay> {
    /// Build a client from config and an explicit API key.
    pub fn new(
        config: &FulfillmentConfig,
        api_key: &str,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let api = Self::api_client(config, api_key, transport, clock.clone());

        let mut general_config = SchedulerConfig::new("fulfillment-general");
        let mut publish_config = SchedulerConfig::new("fulfillment-publish");
        if let Some(limit) = config.task_timeout() {
            general_config = general_config.with_task_timeout(limit);
            publish_config = publish_config.with_task_timeout(limit);
        }

        let general = RequestScheduler::new(general_config, FixedDelay::new(config.general_rps)?, clock.clone());
        let publish = RequestScheduler::new(publish_config, FixedDelay::new(config.publish_rps)?, clock);

        Ok(Self::with_schedulers(api, general, publish))
    }

    /// Build a client reading the API key from the configured environment variable.
    pub fn from_config(config: &FulfillmentConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| PodstoreError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;
        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
        Self::new(config, &api_key, transport, Arc::new(SystemClock))
    }

    fn api_client(
        config: &FulfillmentConfig,
        api_key: &str,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> ApiClient {
        let retry = RetryPolicy::new(config.fallback_retry_after(), config.max_rate_limit_attempts);
        let api = ApiClient::new("fulfillment", &config.base_url, transport, clock, retry)
            .with_header("Authorization", format!("Bearer {}", api_key));
        match &config.store_id {
            Some(store_id) => api.with_header(STORE_ID_HEADER, store_id),
            None => api,
        }
    }
}

impl<P: Pacer> FulfillmentClient<P> {
    /// Assemble a client from prebuilt parts, e.g. unpaced schedulers in tests.
    pub fn with_schedulers(api: ApiClient, general: RequestScheduler<P>, publish: RequestScheduler<P>) -> Self {
        Self { api, general, publish }
    }

    pub fn general_scheduler(&self) -> &RequestScheduler<P> {
        &self.general
    }

    pub fn publish_scheduler(&self) -> &RequestScheduler<P> {
        &self.publish
    }

    async fn via_general<T: DeserializeOwned + Send + 'static>(&self, request: ApiRequest) -> Result<T> {
        let envelope: Envelope<T> = self.api.scheduled(&self.general, request).await?;
        Ok(envelope.result)
    }

    async fn via_publish<T: DeserializeOwned + Send + 'static>(&self, request: ApiRequest) -> Result<T> {
        let envelope: Envelope<T> = self.api.scheduled(&self.publish, request).await?;
        Ok(envelope.result)
    }

    async fn page(&self, request: ApiRequest) -> Result<Page<Value>> {
        let envelope: Envelope<Vec<Value>> = self.api.scheduled(&self.general, request).await?;
        Ok(Page {
            items: envelope.result,
            paging: envelope.paging,
        })
    }

    /// List synced store products.
    pub async fn list_products(&self, offset: u32, limit: u32) -> Result<Page<Value>> {
        let request = ApiRequest::get("/store/products")
            .with_query("offset", offset)
            .with_query("limit", limit);
        self.page(request).await
    }

    /// Fetch one synced product with its variants. Accepts `@external_id` ids.
    pub async fn get_product(&self, id: &str) -> Result<Value> {
        self.via_general(ApiRequest::get(format!("/store/products/{}", id))).await
    }

    /// Create a synced product (publishing quota).
    pub async fn create_product(&self, product: Value) -> Result<Value> {
        self.via_publish(ApiRequest::post("/store/products", product)).await
    }

    /// Update a synced product (publishing quota).
    pub async fn update_product(&self, id: &str, product: Value) -> Result<Value> {
        self.via_publish(ApiRequest::put(format!("/store/products/{}", id), product))
            .await
    }

    /// Delete a synced product (publishing quota).
    pub async fn delete_product(&self, id: &str) -> Result<Value> {
        self.via_publish(ApiRequest::delete(format!("/store/products/{}", id)))
            .await
    }

    pub async fn list_orders(&self, status: Option<&str>, offset: u32, limit: u32) -> Result<Page<Value>> {
        let mut request = ApiRequest::get("/orders")
            .with_query("offset", offset)
            .with_query("limit", limit);
        if let Some(status) = status {
            request = request.with_query("status", status);
        }
        self.page(request).await
    }

    pub async fn get_order(&self, id: &str) -> Result<Value> {
        self.via_general(ApiRequest::get(format!("/orders/{}", id))).await
    }

    /// Create an order; with `confirm` it goes straight to fulfillment instead of draft.
    pub async fn create_order(&self, order: Value, confirm: bool) -> Result<Value> {
        let request = ApiRequest::post("/orders", order).with_query("confirm", confirm);
        self.via_general(request).await
    }

    /// Submit a draft order for fulfillment.
    pub async fn confirm_order(&self, id: &str) -> Result<Value> {
        self.via_general(ApiRequest::post(format!("/orders/{}/confirm", id), json!({})))
            .await
    }

    /// Catalog product with its variants.
    pub async fn get_catalog_product(&self, id: u64) -> Result<Value> {
        self.via_general(ApiRequest::get(format!("/products/{}", id))).await
    }

    /// Shipping rates for a recipient and item list.
    pub async fn shipping_rates(&self, request: Value) -> Result<Vec<Value>> {
        self.via_general(ApiRequest::post("/shipping/rates", request)).await
    }
}

impl<P: Pacer> std::fmt::Debug for FulfillmentClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentClient")
            .field("api", &self.api)
            .field("general", &self.general)
            .field("publish", &self.publish)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http::{ApiResponse, MockTransport};
    use reqwest::Method;
    use std::time::Duration;

    fn envelope(result: Value) -> ApiResponse {
        ApiResponse::json(&json!({ "code": 200, "result": result }))
    }

    fn client_with(responses: Vec<ApiResponse>) -> (FulfillmentClient, Arc<MockTransport>, Arc<ManualClock>) {
        let clock = ManualClock::shared();
        let transport = Arc::new(MockTransport::new(responses).with_clock(clock.clone()));
        let config = FulfillmentConfig {
            store_id: Some("777".to_string()),
            ..FulfillmentConfig::default()
        };
        let client = FulfillmentClient::new(&config, "pf-key", transport.clone(), clock.clone()).unwrap();
        (client, transport, clock)
    }

    #[tokio::test]
    async fn test_get_product_unwraps_result() {
        let (client, transport, _clock) = client_with(vec![envelope(json!({"sync_product": {"id": 9}}))]);

        let product = client.get_product("9").await.unwrap();

        assert_eq!(product["sync_product"]["id"], 9);
        let sent = &transport.requests()[0].request;
        assert_eq!(sent.method, Method::GET);
        assert_eq!(sent.url, "https://api.printful.com/store/products/9");
        assert_eq!(sent.header("Authorization"), Some("Bearer pf-key"));
        assert_eq!(sent.header(STORE_ID_HEADER), Some("777"));
    }

    #[tokio::test]
    async fn test_list_products_reads_paging() {
        let (client, transport, _clock) = client_with(vec![ApiResponse::json(&json!({
            "code": 200,
            "result": [{"id": 1}, {"id": 2}],
            "paging": {"total": 42, "offset": 20, "limit": 2}
        }))]);

        let page = client.list_products(20, 2).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.paging, Some(Paging { total: 42, offset: 20, limit: 2 }));
        let sent = &transport.requests()[0].request;
        assert!(sent.query.contains(&("offset".to_string(), "20".to_string())));
        assert!(sent.query.contains(&("limit".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_publishing_calls_use_strict_scheduler() {
        let (client, _transport, clock) = client_with(vec![
            envelope(json!({"id": 1})),
            envelope(json!({"id": 1})),
        ]);

        client.create_product(json!({"sync_product": {"name": "Tee"}})).await.unwrap();
        client.update_product("1", json!({"sync_product": {"name": "Tee v2"}})).await.unwrap();

        // 0.1 req/s => 10s between publishing calls
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
        assert_eq!(client.publish_scheduler().stats().dispatched, 2);
    }

    #[tokio::test]
    async fn test_general_and_publish_pacing_are_independent() {
        let (client, _transport, clock) = client_with(vec![
            envelope(json!({"id": 1})),
            envelope(json!({"id": 2})),
        ]);

        client.create_product(json!({})).await.unwrap();
        client.get_order("2").await.unwrap();

        // The general scheduler has never dispatched, so the read goes out immediately
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_create_order_confirm_flag() {
        let (client, transport, _clock) = client_with(vec![envelope(json!({"id": 55, "status": "pending"}))]);

        let order = client.create_order(json!({"recipient": {}, "items": []}), true).await.unwrap();

        assert_eq!(order["status"], "pending");
        let sent = &transport.requests()[0].request;
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.query, vec![("confirm".to_string(), "true".to_string())]);
    }

    #[tokio::test]
    async fn test_list_orders_status_filter() {
        let (client, transport, _clock) = client_with(vec![envelope(json!([]))]);

        let page = client.list_orders(Some("fulfilled"), 0, 20).await.unwrap();

        assert!(page.items.is_empty());
        assert!(page.paging.is_none());
        let sent = &transport.requests()[0].request;
        assert!(sent.query.contains(&("status".to_string(), "fulfilled".to_string())));
    }

    #[tokio::test]
    async fn test_rate_limit_uses_provider_fallback() {
        let (client, transport, clock) = client_with(vec![
            ApiResponse::too_many_requests(None),
            envelope(json!({"id": 3})),
        ]);

        client.get_order("3").await.unwrap();

        assert_eq!(transport.call_count(), 2);
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_api_error_propagates() {
        let (client, _transport, _clock) = client_with(vec![ApiResponse::new(404, "{\"error\":{\"message\":\"Not found\"}}")]);

        let err = client.get_order("nope").await.unwrap_err();

        assert!(matches!(err, PodstoreError::Api { status: 404, .. }));
        assert!(err.to_string().contains("Not found"));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = FulfillmentConfig {
            api_key_env: "PODSTORE_TEST_UNSET_FULFILLMENT_KEY".to_string(),
            ..FulfillmentConfig::default()
        };
        let result = FulfillmentClient::from_config(&config);
        assert!(matches!(result, Err(PodstoreError::MissingApiKey { env_var }) if env_var == "PODSTORE_TEST_UNSET_FULFILLMENT_KEY"));
    }

    #[test]
    fn test_new_rejects_invalid_rate() {
        let clock = ManualClock::shared();
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let config = FulfillmentConfig {
            publish_rps: 0.0,
            ..FulfillmentConfig::default()
        };
        let result = FulfillmentClient::new(&config, "k", transport, clock);
        assert!(matches!(result, Err(PodstoreError::Config(_))));
    }
}
