//! Error types for podstore
//!
//! Centralized error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

/// All error types that can occur in podstore
#[derive(Debug, Error)]
pub enum PodstoreError {
    /// Remote API answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Remote API kept answering 429 until the retry bound was hit
    #[error("Rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// A scheduled task ran past its time limit
    #[error("Task timed out after {0:?}")]
    TaskTimeout(Duration),

    /// A scheduled task was dropped before it settled (panic or shutdown)
    #[error("Task aborted: {0}")]
    TaskAborted(String),

    /// Transport failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match what the caller expected
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Credential not present in the environment
    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PodstoreError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, PodstoreError::RateLimitExhausted { .. })
            || matches!(self, PodstoreError::Api { status: 429, .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PodstoreError::Api { status, .. } => *status == 429 || *status >= 500,
            PodstoreError::RateLimitExhausted { .. } => true,
            PodstoreError::TaskTimeout(_) => true,
            PodstoreError::Network(_) => true,
            PodstoreError::TaskAborted(_) => false,
            PodstoreError::InvalidResponse(_) => false,
            PodstoreError::Config(_) => false,
            PodstoreError::MissingApiKey { .. } => false,
            PodstoreError::Io(_) => false,
            PodstoreError::Json(_) => false,
        }
    }
}

/// Result type alias for podstore operations
pub type Result<T> = std::result::Result<T, PodstoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = PodstoreError::Api {
            status: 404,
            body: "{\"error\":\"Not Found\"}".to_string(),
        };
        assert_eq!(err.to_string(), "API error 404: {\"error\":\"Not Found\"}");
    }

    #[test]
    fn test_rate_limit_exhausted_display() {
        let err = PodstoreError::RateLimitExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "Rate limited after 5 attempts");
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_missing_api_key_display() {
        let err = PodstoreError::MissingApiKey {
            env_var: "FULFILLMENT_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing API key: environment variable FULFILLMENT_API_KEY not set"
        );
    }

    #[test]
    fn test_task_timeout_display() {
        let err = PodstoreError::TaskTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Task timed out after 30s");
    }

    #[test]
    fn test_is_retryable() {
        assert!(PodstoreError::Api { status: 503, body: String::new() }.is_retryable());
        assert!(PodstoreError::Api { status: 429, body: String::new() }.is_retryable());
        assert!(!PodstoreError::Api { status: 400, body: String::new() }.is_retryable());
        assert!(!PodstoreError::Config("bad".to_string()).is_retryable());
        assert!(!PodstoreError::TaskAborted("panic".to_string()).is_retryable());
    }

    #[test]
    fn test_is_rate_limit() {
        assert!(PodstoreError::Api { status: 429, body: String::new() }.is_rate_limit());
        assert!(!PodstoreError::Api { status: 500, body: String::new() }.is_rate_limit());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PodstoreError = io_err.into();
        assert!(matches!(err, PodstoreError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: PodstoreError = json_err.into();
        assert!(matches!(err, PodstoreError::Json(_)));
    }
}
