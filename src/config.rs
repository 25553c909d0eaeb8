//! Configuration for podstore.
//!
//! Loaded from ./podstore.yml or ~/.config/podstore/podstore.yml. The file
//! never holds secrets; it names the environment variables that do.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::dispatch_interval;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub log_level: Option<String>,
    pub fulfillment: FulfillmentConfig,
    pub platform: PlatformConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            fulfillment: FulfillmentConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}

/// Print-on-demand fulfillment provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FulfillmentConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Sent as `X-PF-Store-Id` when the key spans several stores.
    pub store_id: Option<String>,
    /// Ceiling for general endpoints (catalog, orders, reads).
    pub general_rps: f64,
    /// Ceiling for product publishing endpoints.
    pub publish_rps: f64,
    pub fallback_retry_secs: u64,
    pub max_rate_limit_attempts: u32,
    pub timeout_ms: u64,
    pub task_timeout_ms: Option<u64>,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.printful.com".to_string(),
            api_key_env: "PRINTFUL_API_KEY".to_string(),
            store_id: None,
            general_rps: 2.0,  // 120/min
            publish_rps: 0.1, // 6/min
            fallback_retry_secs: 60,
            max_rate_limit_attempts: 5,
            timeout_ms: 30_000,
            task_timeout_ms: None,
        }
    }
}

impl FulfillmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn fallback_retry_after(&self) -> Duration {
        Duration::from_secs(self.fallback_retry_secs)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }
}

/// Storefront platform admin API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlatformConfig {
    /// Shop host, e.g. `my-shop.myshopify.com`.
    pub shop_domain: String,
    pub api_version: String,
    pub access_token_env: String,
    pub requests_per_second: f64,
    pub bucket_size: u32,
    /// Floor on the gap between dispatches while tokens remain. Setting it to
    /// `1000 / requests-per-second` gives every dispatch the fixed-delay
    /// spacing on top of the bucket; 0 allows full bursts.
    pub min_interval_ms: u64,
    pub fallback_retry_secs: u64,
    pub max_rate_limit_attempts: u32,
    pub timeout_ms: u64,
    pub task_timeout_ms: Option<u64>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            shop_domain: String::new(),
            api_version: "2024-01".to_string(),
            access_token_env: "SHOPIFY_ACCESS_TOKEN".to_string(),
            requests_per_second: 2.0,
            bucket_size: 40,
            min_interval_ms: 0,
            fallback_retry_secs: 10,
            max_rate_limit_attempts: 5,
            timeout_ms: 30_000,
            task_timeout_ms: None,
        }
    }
}

impl PlatformConfig {
    /// Versioned admin API root.
    pub fn admin_base_url(&self) -> String {
        let domain = self
            .shop_domain
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("https://{}/admin/api/{}", domain, self.api_version)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn fallback_retry_after(&self) -> Duration {
        Duration::from_secs(self.fallback_retry_secs)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }
}

fn positive_rate(name: &str, value: f64) -> Result<()> {
    dispatch_interval(value).map_err(|e| eyre::eyre!("{}: {}", name, e))?;
    Ok(())
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ./podstore.yml
    /// 3. ~/.config/podstore/podstore.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try project config
        let project_config = PathBuf::from(format!("{}.yml", project_name));
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", project_config.display(), e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        positive_rate("fulfillment.general-rps", self.fulfillment.general_rps)?;
        positive_rate("fulfillment.publish-rps", self.fulfillment.publish_rps)?;
        positive_rate("platform.requests-per-second", self.platform.requests_per_second)?;
        if self.platform.bucket_size == 0 {
            eyre::bail!("platform.bucket-size must be > 0");
        }
        if self.fulfillment.max_rate_limit_attempts == 0 {
            eyre::bail!("fulfillment.max-rate-limit-attempts must be > 0");
        }
        if self.platform.max_rate_limit_attempts == 0 {
            eyre::bail!("platform.max-rate-limit-attempts must be > 0");
        }
        Ok(())
    }
}
