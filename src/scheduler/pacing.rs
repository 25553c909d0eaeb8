//! Pacing policies that decide when the next queued request may go out.
//!
//! A [`Pacer`] is pure state: it is handed the current instant and answers
//! either "dispatch now" (recording the dispatch) or "wait this long". The
//! drain loop in [`super::queue`] owns the sleeping.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{PodstoreError, Result};

/// Tolerance for floating point token accounting.
const TOKEN_EPSILON: f64 = 1e-9;

/// Shortest wait a pacer will ask for, so rounding never produces a zero-length spin.
const MIN_WAIT: Duration = Duration::from_micros(1);

/// Answer from a pacer for one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Dispatch now. The pacer has already recorded the dispatch.
    Ready,
    /// Ask again after this long.
    Wait(Duration),
}

/// Decides when the next dispatch may happen.
pub trait Pacer: Send + 'static {
    /// Check whether a dispatch may happen at `now`, recording it if so.
    fn admit(&mut self, now: Instant) -> Admission;
}

/// Validate a requests-per-second setting.
///
/// The rate must be positive and slow enough that its dispatch interval
/// still fits in a [`Duration`].
fn checked_rate(requests_per_second: f64) -> Result<f64> {
    dispatch_interval(requests_per_second).map(|_| requests_per_second)
}

/// Spacing between dispatches at `requests_per_second`.
pub fn dispatch_interval(requests_per_second: f64) -> Result<Duration> {
    if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
        return Err(PodstoreError::Config(format!(
            "requests per second must be a positive number, got {}",
            requests_per_second
        )));
    }
    Duration::try_from_secs_f64(1.0 / requests_per_second).map_err(|_| {
        PodstoreError::Config(format!(
            "requests per second is too small to pace, got {}",
            requests_per_second
        ))
    })
}

/// Seconds as a [`Duration`], saturating at [`Duration::MAX`].
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Remaining part of `spacing` since `last`, if any.
fn spacing_remaining(last: Option<Instant>, spacing: Duration, now: Instant) -> Option<Duration> {
    let elapsed = now.saturating_duration_since(last?);
    if elapsed < spacing { Some(spacing - elapsed) } else { None }
}

/// Fixed spacing of `1 / requests_per_second` between dispatches.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    min_delay: Duration,
    last_dispatch: Option<Instant>,
}

impl FixedDelay {
    pub fn new(requests_per_second: f64) -> Result<Self> {
        Ok(Self::from_interval(dispatch_interval(requests_per_second)?))
    }

    pub fn from_interval(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_dispatch: None,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn last_dispatch(&self) -> Option<Instant> {
        self.last_dispatch
    }
}

impl Pacer for FixedDelay {
    fn admit(&mut self, now: Instant) -> Admission {
        if let Some(remaining) = spacing_remaining(self.last_dispatch, self.min_delay, now) {
            return Admission::Wait(remaining);
        }
        self.last_dispatch = Some(now);
        Admission::Ready
    }
}

/// Token bucket with lazy refill and an optional floor on spacing.
///
/// Starts full. Tokens are recomputed from elapsed time whenever the bucket
/// is consulted, capped at `bucket_size`, so an idle bucket never banks more
/// than one full burst.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    bucket_size: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Option<Instant>,
    min_interval: Duration,
    last_dispatch: Option<Instant>,
}

impl TokenBucket {
    pub fn new(requests_per_second: f64, bucket_size: u32) -> Result<Self> {
        let refill_per_sec = checked_rate(requests_per_second)?;
        if bucket_size == 0 {
            return Err(PodstoreError::Config("bucket size must be at least 1".to_string()));
        }
        let bucket_size = f64::from(bucket_size);
        Ok(Self {
            bucket_size,
            tokens: bucket_size,
            refill_per_sec,
            last_refill: None,
            min_interval: Duration::ZERO,
            last_dispatch: None,
        })
    }

    /// Enforce a minimum gap between dispatches even while tokens remain.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Tokens added per millisecond.
    pub fn refill_rate_per_ms(&self) -> f64 {
        self.refill_per_sec / 1000.0
    }

    /// Tokens available at `now`, after refilling.
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    /// Time for an empty bucket to fill completely.
    pub fn full_refill_time(&self) -> Duration {
        saturating_secs(self.bucket_size / self.refill_per_sec)
    }

    fn refill(&mut self, now: Instant) {
        if let Some(last) = self.last_refill {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.bucket_size);
        }
        self.last_refill = Some(now);
    }
}

impl Pacer for TokenBucket {
    fn admit(&mut self, now: Instant) -> Admission {
        self.refill(now);

        if self.tokens + TOKEN_EPSILON < 1.0 {
            let deficit = 1.0 - self.tokens;
            let wait = saturating_secs(deficit / self.refill_per_sec);
            return Admission::Wait(wait.max(MIN_WAIT));
        }

        if let Some(remaining) = spacing_remaining(self.last_dispatch, self.min_interval, now) {
            return Admission::Wait(remaining);
        }

        self.tokens = (self.tokens - 1.0).max(0.0);
        self.last_dispatch = Some(now);
        Admission::Ready
    }
}

/// Pacer that never waits. Handy where the upstream has no quota, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

impl Pacer for Unpaced {
    fn admit(&mut self, _now: Instant) -> Admission {
        Admission::Ready
    }
}
