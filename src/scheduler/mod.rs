//! Outbound request scheduling.
//!
//! This module provides:
//! - **Pacing**: policies deciding when the next call may go out
//!   ([`FixedDelay`], [`TokenBucket`], [`Unpaced`]).
//! - **RequestScheduler**: a FIFO queue drained by a single loop that waits on
//!   the pacer, runs one task at a time, and relays each task's outcome to its
//!   caller.
//!
//! # Example
//!
//! ```ignore
//! use podstore::scheduler::{FixedDelay, RequestScheduler};
//!
//! let scheduler = RequestScheduler::named("general", FixedDelay::new(2.0)?);
//! let value = scheduler.enqueue(|| async { Ok(42) }).await?;
//! ```

mod pacing;
mod queue;

pub use pacing::{Admission, FixedDelay, Pacer, TokenBucket, Unpaced, dispatch_interval};
pub use queue::{
    FixedDelayScheduler, RequestScheduler, SchedulerConfig, SchedulerStats, TokenBucketScheduler,
    UnpacedScheduler,
};
