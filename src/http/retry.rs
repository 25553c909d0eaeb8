//! Handling of remote rate-limit signals.

use std::time::Duration;

/// Default bound on attempts for a single logical call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How a 429 answer is waited out and how many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait used when the server sends no usable `Retry-After`.
    pub fallback_retry_after: Duration,
    /// Total attempts per call, the first one included. Never below 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(fallback_retry_after: Duration, max_attempts: u32) -> Self {
        Self {
            fallback_retry_after,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Policy that waits `fallback_retry_after` when no hint is given.
    pub fn with_fallback(fallback_retry_after: Duration) -> Self {
        Self::new(fallback_retry_after, DEFAULT_MAX_ATTEMPTS)
    }

    /// Wait before the next attempt given the raw `Retry-After` header.
    pub fn retry_delay(&self, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(parse_retry_after)
            .unwrap_or(self.fallback_retry_after)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Parse a `Retry-After` value given in seconds, whole or fractional.
///
/// HTTP-date values are not supported and yield `None`, as do values too
/// large to represent as a [`Duration`].
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_integer() {
        assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_parse_retry_after_fractional() {
        assert_eq!(parse_retry_after("2.0"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("0.5"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-4"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_parse_retry_after_rejects_overflow() {
        assert_eq!(parse_retry_after("99999999999999999999"), None);
        assert_eq!(parse_retry_after("1e30"), None);

        let policy = RetryPolicy::with_fallback(Duration::from_secs(60));
        assert_eq!(policy.retry_delay(Some("1e30")), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_delay_falls_back() {
        let policy = RetryPolicy::with_fallback(Duration::from_secs(60));
        assert_eq!(policy.retry_delay(None), Duration::from_secs(60));
        assert_eq!(policy.retry_delay(Some("nonsense")), Duration::from_secs(60));
        assert_eq!(policy.retry_delay(Some("7")), Duration::from_secs(7));
    }

    #[test]
    fn test_allows_another() {
        let policy = RetryPolicy::new(Duration::from_secs(10), 3);
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));
    }

    #[test]
    fn test_max_attempts_floor() {
        let policy = RetryPolicy::new(Duration::from_secs(10), 0);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.allows_another(1));
    }
}
