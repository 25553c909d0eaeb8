//! FIFO request scheduler.
//!
//! Callers hand over a zero-argument async task and get back a future that
//! settles with the task's own outcome. Tasks run strictly one at a time, in
//! submission order, each one admitted by the scheduler's [`Pacer`].
//!
//! The drain loop is started lazily by the first enqueue and exits as soon as
//! the queue is empty. The `processing` flag lives under the same lock as the
//! queue, so an enqueue that races the loop's exit either lands before the
//! emptiness check or starts a fresh loop.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::clock::{Clock, SystemClock};
use crate::error::{PodstoreError, Result};
use crate::scheduler::pacing::{Admission, FixedDelay, Pacer, TokenBucket, Unpaced};

/// Type-erased unit of work. Resolves to `true` when the task succeeded.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, bool> + Send>;

/// Scheduler settings that do not depend on the pacing policy.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Label used in log events.
    pub name: String,
    /// Upper bound on a single task, including any retry waits inside it.
    ///
    /// Measured on Tokio's clock, not the scheduler's [`Clock`]. It lines up
    /// with [`SystemClock`] (paused or not) and never fires while a
    /// [`ManualClock`](crate::clock::ManualClock) stands in for the waits.
    pub task_timeout: Option<Duration>,
}

impl SchedulerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_timeout: None,
        }
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }
}

/// Counters for tasks that have left the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks handed to execution.
    pub dispatched: u64,
    /// Dispatched tasks that rejected, timed out, or panicked. Counted once
    /// the task has settled.
    pub failed: u64,
}

struct State<P> {
    queue: VecDeque<Job>,
    processing: bool,
    pacer: P,
    stats: SchedulerStats,
}

struct Shared<P> {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State<P>>,
}

impl<P: Pacer> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_for_admission(&self) {
        loop {
            let now = self.clock.now();
            let admission = self.lock().pacer.admit(now);
            match admission {
                Admission::Ready => return,
                Admission::Wait(delay) => {
                    tracing::debug!(
                        scheduler = %self.config.name,
                        wait_ms = delay.as_millis() as u64,
                        "Pacing before dispatch"
                    );
                    match now.checked_add(delay) {
                        Some(deadline) => self.clock.sleep_until(deadline).await,
                        None => self.clock.sleep(delay).await,
                    }
                }
            }
        }
    }
}

/// Serializes outbound calls onto a rate-safe cadence.
///
/// Cloning yields another handle to the same queue.
pub struct RequestScheduler<P: Pacer> {
    shared: Arc<Shared<P>>,
}

/// Scheduler spacing dispatches evenly.
pub type FixedDelayScheduler = RequestScheduler<FixedDelay>;

/// Scheduler allowing bursts up to the bucket size.
pub type TokenBucketScheduler = RequestScheduler<TokenBucket>;

/// Scheduler with no pacing, only FIFO serialization.
pub type UnpacedScheduler = RequestScheduler<Unpaced>;

impl<P: Pacer> Clone for RequestScheduler<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Pacer> std::fmt::Debug for RequestScheduler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("name", &self.shared.config.name)
            .field("pending", &self.pending())
            .field("processing", &self.is_processing())
            .finish()
    }
}

impl<P: Pacer> RequestScheduler<P> {
    pub fn new(config: SchedulerConfig, pacer: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    processing: false,
                    pacer,
                    stats: SchedulerStats::default(),
                }),
            }),
        }
    }

    /// Scheduler on the system clock with no task timeout.
    pub fn named(name: impl Into<String>, pacer: P) -> Self {
        Self::new(SchedulerConfig::new(name), pacer, Arc::new(SystemClock))
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Tasks waiting for their turn (excludes the one executing).
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Whether a drain loop is currently active.
    pub fn is_processing(&self) -> bool {
        self.shared.lock().processing
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().stats
    }

    /// Run `f` against the pacer state.
    pub fn inspect_pacer<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.shared.lock().pacer)
    }

    /// Queue `task` and return a future for its outcome.
    ///
    /// The task joins the queue when `enqueue` is called, not when the
    /// returned future is first polled, so call order is dispatch order.
    /// Dropping the returned future does not withdraw the task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let timeout = self.shared.config.task_timeout;

        let job: Job = Box::new(move || {
            async move {
                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, task())
                        .await
                        .unwrap_or(Err(PodstoreError::TaskTimeout(limit))),
                    None => task().await,
                };
                let ok = outcome.is_ok();
                // Receiver may be gone if the caller stopped waiting
                let _ = tx.send(outcome);
                ok
            }
            .boxed()
        });

        self.push(job);

        let name = self.shared.config.name.clone();
        async move {
            rx.await.unwrap_or_else(|_| {
                Err(PodstoreError::TaskAborted(format!(
                    "{} scheduler dropped the task before it settled",
                    name
                )))
            })
        }
    }

    fn push(&self, job: Job) {
        let start_loop = {
            let mut state = self.shared.lock();
            state.queue.push_back(job);
            !std::mem::replace(&mut state.processing, true)
        };

        if start_loop {
            tracing::trace!(scheduler = %self.shared.config.name, "Starting drain loop");
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }
    }
}

/// Pull tasks off the queue until it is empty.
async fn drain<P: Pacer>(shared: Arc<Shared<P>>) {
    loop {
        {
            let mut state = shared.lock();
            if state.queue.is_empty() {
                state.processing = false;
                return;
            }
        }

        shared.wait_for_admission().await;

        let job = {
            let mut state = shared.lock();
            let job = state.queue.pop_front();
            if job.is_some() {
                state.stats.dispatched += 1;
            }
            job
        };
        let Some(job) = job else {
            continue;
        };

        // Run on its own task so a panic stays contained; awaiting it keeps execution serial
        let succeeded = match tokio::spawn(job()).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(scheduler = %shared.config.name, error = %e, "Scheduled task aborted");
                false
            }
        };

        if !succeeded {
            shared.lock().stats.failed += 1;
        }
    }
}
