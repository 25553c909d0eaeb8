//! podstore - rate-limited API clients for a print-on-demand storefront
//!
//! Wraps the fulfillment provider's and the storefront platform's HTTP APIs
//! behind request schedulers that keep every outbound call inside the
//! published quotas, waiting out 429 answers transparently.

pub mod clock;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod http;
pub mod platform;
pub mod scheduler;

pub use error::{PodstoreError, Result};
