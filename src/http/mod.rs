//! HTTP integration: transport seam, rate-limit retry policy, and the client
//! shim that turns one API call into a scheduler task.

pub mod client;
pub mod retry;
pub mod transport;

pub use client::ApiClient;
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, parse_retry_after};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, MockTransport, PreparedRequest, RecordedRequest, ReqwestTransport};
