//! Storefront platform admin API client.
//!
//! The platform grants a burst allowance on top of a steady refill rate, so
//! its calls go through a single token-bucket scheduler.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::clock::{Clock, SystemClock};
use crate::config::PlatformConfig;
use crate::error::{PodstoreError, Result};
use crate::http::{ApiClient, ApiRequest, HttpTransport, ReqwestTransport, RetryPolicy};
use crate::scheduler::{Pacer, RequestScheduler, SchedulerConfig, TokenBucket};

/// Header carrying the admin access token.
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Client for the storefront platform admin API.
pub struct PlatformClient<P: Pacer = TokenBucket> {
    api: ApiClient,
    scheduler: RequestScheduler<P>,
}

impl PlatformClient<TokenBucket> {
    /// Build a client from config and an explicit access token.
    pub fn new(
        config: &PlatformConfig,
        access_token: &str,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.shop_domain.trim().is_empty() {
            return Err(PodstoreError::Config("platform.shop-domain is not set".to_string()));
        }

        let retry = RetryPolicy::new(config.fallback_retry_after(), config.max_rate_limit_attempts);
        let api = ApiClient::new("platform", config.admin_base_url(), transport, clock.clone(), retry)
            .with_header(ACCESS_TOKEN_HEADER, access_token);

        let bucket = TokenBucket::new(config.requests_per_second, config.bucket_size)?
            .with_min_interval(config.min_interval());
        let mut scheduler_config = SchedulerConfig::new("platform");
        if let Some(limit) = config.task_timeout() {
            scheduler_config = scheduler_config.with_task_timeout(limit);
        }
        let scheduler = RequestScheduler::new(scheduler_config, bucket, clock);

        Ok(Self::with_scheduler(api, scheduler))
    }

    /// Build a client reading the access token from the configured environment variable.
    pub fn from_config(config: &PlatformConfig) -> Result<Self> {
        let token = std::env::var(&config.access_token_env).map_err(|_| PodstoreError::MissingApiKey {
            env_var: config.access_token_env.clone(),
        })?;
        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
        Self::new(config, &token, transport, Arc::new(SystemClock))
    }
}

impl<P: Pacer> PlatformClient<P> {
    pub fn with_scheduler(api: ApiClient, scheduler: RequestScheduler<P>) -> Self {
        Self { api, scheduler }
    }

    pub fn scheduler(&self) -> &RequestScheduler<P> {
        &self.scheduler
    }

    /// Run `request` and pull `key` out of the response object.
    async fn call(&self, request: ApiRequest, key: &str) -> Result<Value> {
        let mut body: Value = self.api.scheduled(&self.scheduler, request).await?;
        body.get_mut(key)
            .map(Value::take)
            .ok_or_else(|| PodstoreError::InvalidResponse(format!("response has no '{}' field", key)))
    }

    pub async fn list_products(&self, limit: u32) -> Result<Vec<Value>> {
        let products = self
            .call(ApiRequest::get("/products.json").with_query("limit", limit), "products")
            .await?;
        Ok(serde_json::from_value(products)?)
    }

    pub async fn get_product(&self, id: u64) -> Result<Value> {
        self.call(ApiRequest::get(format!("/products/{}.json", id)), "product")
            .await
    }

    pub async fn create_product(&self, product: Value) -> Result<Value> {
        self.call(ApiRequest::post("/products.json", json!({ "product": product })), "product")
            .await
    }

    pub async fn update_product(&self, id: u64, product: Value) -> Result<Value> {
        let request = ApiRequest::put(format!("/products/{}.json", id), json!({ "product": product }));
        self.call(request, "product").await
    }

    pub async fn delete_product(&self, id: u64) -> Result<()> {
        let _: Value = self
            .api
            .scheduled(&self.scheduler, ApiRequest::delete(format!("/products/{}.json", id)))
            .await?;
        Ok(())
    }

    /// List orders. `status` defaults to the platform's own default (open) when `None`.
    pub async fn list_orders(&self, status: Option<&str>, limit: u32) -> Result<Vec<Value>> {
        let mut request = ApiRequest::get("/orders.json").with_query("limit", limit);
        if let Some(status) = status {
            request = request.with_query("status", status);
        }
        let orders = self.call(request, "orders").await?;
        Ok(serde_json::from_value(orders)?)
    }

    pub async fn get_order(&self, id: u64) -> Result<Value> {
        self.call(ApiRequest::get(format!("/orders/{}.json", id)), "order")
            .await
    }

    /// Set available stock for an inventory item at a location.
    pub async fn set_inventory_level(&self, inventory_item_id: u64, location_id: u64, available: i64) -> Result<Value> {
        let body = json!({
            "inventory_item_id": inventory_item_id,
            "location_id": location_id,
            "available": available,
        });
        self.call(ApiRequest::post("/inventory_levels/set.json", body), "inventory_level")
            .await
    }
}

impl<P: Pacer> std::fmt::Debug for PlatformClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("api", &self.api)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
