//! Time source for pacing and retry waits.
//!
//! Everything that measures or waits on time goes through [`Clock`] so tests
//! can swap in [`ManualClock`] and observe pacing without real sleeps.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Monotonic time source with an async sleep primitive.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspend the caller until `deadline`. Returns at once if it has passed.
    async fn sleep_until(&self, deadline: Instant);

    /// Suspend the caller for `duration`. A duration past the end of
    /// representable time never completes.
    async fn sleep(&self, duration: Duration) {
        match self.now().checked_add(duration) {
            Some(deadline) => self.sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

/// Tokio-backed clock. Honors `tokio::time::pause()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when told to.
///
/// `sleep_until` moves the clock forward to the deadline (never backward) and
/// yields once, so a paced drain loop runs to completion instantly while still
/// reporting the timestamps it would have produced in real time. Sleepers
/// sharing the clock whose deadlines overlap wake together instead of adding
/// their waits end to end.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Shared handle, ready to pass where an `Arc<dyn Clock>` is expected.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += duration;
    }

    /// Move the clock forward to `deadline` if it is still ahead.
    pub fn advance_to(&self, deadline: Instant) {
        let target = deadline.saturating_duration_since(self.base);
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        if target > *offset {
            *offset = target;
        }
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    async fn sleep_until(&self, deadline: Instant) {
        self.advance_to(deadline);
        tokio::task::yield_now().await;
    }
}
