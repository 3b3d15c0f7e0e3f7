//! Worker pool with retrying execution
//!
//! Manages a fixed number of worker lanes with rendezvous hand-off
//! backpressure and cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, trace};

use super::task::Task;
use crate::retry::RetryPolicy;

/// Bounded worker pool.
///
/// A `Scheduler` owns N worker lanes. [`submit`](Scheduler::submit) hands a
/// task to a free lane, blocking while all lanes are busy; the lane then runs
/// the task to a terminal outcome (success, exhausted retries, or
/// cancellation) under the pool's [`RetryPolicy`] semantics.
///
/// The pool derives its own [`CancellationToken`] from the parent passed at
/// construction. Cancelling either token closes the pool: new submissions are
/// rejected, backoff waits abort, and running tasks observe the token.
///
/// Task outcomes are never reported back to the submitter. A task's callable
/// is the only place failure can be observed.
///
/// # Example
///
/// ```ignore
/// let root = CancellationToken::new();
/// let scheduler = Scheduler::new(&root, 4);
///
/// scheduler
///     .submit(
///         Task::new(|_token| async { Ok(()) }),
///         RetryPolicy::default().with_max_attempts(3).with_base_delay(Duration::from_millis(50)),
///     )
///     .await;
///
/// scheduler.shutdown().await;
/// ```
pub struct Scheduler {
    token: CancellationToken,
    lanes: Arc<Semaphore>,
    tracker: TaskTracker,
    n_workers: usize,
    rng: Arc<Mutex<StdRng>>,
}

impl Scheduler {
    /// Create a pool with `n_workers` lanes (values below 1 are coerced to 1).
    ///
    /// The pool's token is a child of `parent`; cancelling the parent closes
    /// the pool.
    pub fn new(parent: &CancellationToken, n_workers: usize) -> Self {
        let n_workers = n_workers.max(1);
        Self {
            token: parent.child_token(),
            lanes: Arc::new(Semaphore::new(n_workers)),
            tracker: TaskTracker::new(),
            n_workers,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Seed the jitter RNG for reproducible backoff sequences.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    /// Hand a task to a worker lane, waiting until one is free.
    ///
    /// Returns `true` once the task has been accepted, `false` if the pool
    /// closed first. An accepted task always reaches a terminal outcome.
    pub async fn submit(&self, task: Task, policy: RetryPolicy) -> bool {
        let permit = tokio::select! {
            _ = self.token.cancelled() => return false,
            permit = Arc::clone(&self.lanes).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };
        self.dispatch(task, policy, permit)
    }

    /// Non-blocking [`submit`](Scheduler::submit).
    ///
    /// Returns `false` immediately when no lane is free or the pool is
    /// closed.
    pub fn try_submit(&self, task: Task, policy: RetryPolicy) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        match Arc::clone(&self.lanes).try_acquire_owned() {
            Ok(permit) => self.dispatch(task, policy, permit),
            Err(_) => false,
        }
    }

    fn dispatch(&self, task: Task, policy: RetryPolicy, permit: OwnedSemaphorePermit) -> bool {
        // The pool may have closed while the permit was being acquired.
        if self.token.is_cancelled() {
            return false;
        }
        let token = self.token.clone();
        let rng = Arc::clone(&self.rng);
        self.tracker.spawn(async move {
            let _permit = permit;
            execute(token, rng, task, policy).await;
        });
        true
    }

    /// Close the pool and wait for in-flight tasks to finish.
    ///
    /// Idempotent. Cancels the internal token, which aborts backoff waits and
    /// lets running callables observe cancellation; returns once every lane
    /// has terminated.
    #[instrument(skip(self), fields(workers = self.n_workers))]
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("scheduler stopped");
    }

    /// Wait for the pool to terminate after an external cancellation.
    ///
    /// Blocks until the token has been cancelled (by the parent or by
    /// [`shutdown`](Scheduler::shutdown)) and every lane has terminated.
    pub async fn wait(&self) {
        self.token.cancelled().await;
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Resolves once the pool's token has been cancelled.
    pub async fn done(&self) {
        self.token.cancelled().await;
    }

    /// The pool's own cancellation token, for deriving per-task scopes or
    /// observing closure.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the pool has stopped accepting submissions.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of worker lanes.
    pub fn worker_count(&self) -> usize {
        self.n_workers
    }
}

/// Run one submission to a terminal outcome.
///
/// Attempt counting starts at the first invocation, so `max_attempts: 1`
/// means a single try. Cancellation is checked before every attempt and
/// during every backoff wait; a cancelled task is abandoned without another
/// attempt.
async fn execute(
    token: CancellationToken,
    rng: Arc<Mutex<StdRng>>,
    task: Task,
    policy: RetryPolicy,
) {
    let mut attempts: u32 = 0;
    let mut delay = policy.initial_delay();

    loop {
        if token.is_cancelled() {
            trace!(attempts, "task abandoned on cancellation");
            return;
        }

        attempts += 1;
        match task.call(token.clone()).await {
            Ok(()) => return,
            Err(error) => {
                debug!(attempts, %error, "task attempt failed");
            }
        }

        if policy.is_exhausted(attempts) {
            debug!(attempts, "task retries exhausted");
            return;
        }

        let wait = apply_jitter(&rng, delay, &policy);
        tokio::select! {
            _ = token.cancelled() => {
                trace!(attempts, "backoff wait cancelled");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        delay = policy.next_delay(delay);
    }
}

/// Add a random offset in `[0, delay * jitter)` when jitter is active.
fn apply_jitter(rng: &Mutex<StdRng>, delay: Duration, policy: &RetryPolicy) -> Duration {
    if !policy.jitter_enabled() {
        return delay;
    }
    let unit: f64 = rng.lock().gen();
    delay + delay.mul_f64(policy.jitter * unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_coerced_to_one() {
        let root = CancellationToken::new();
        let scheduler = Scheduler::new(&root, 0);
        assert_eq!(scheduler.worker_count(), 1);

        let scheduler = Scheduler::new(&root, 8);
        assert_eq!(scheduler.worker_count(), 8);
    }

    #[test]
    fn test_jitter_disabled_returns_delay() {
        let rng = Mutex::new(StdRng::seed_from_u64(7));
        let delay = Duration::from_millis(20);

        let policy = RetryPolicy::default();
        assert_eq!(apply_jitter(&rng, delay, &policy), delay);

        let policy = RetryPolicy::default().with_jitter(1.5);
        assert_eq!(apply_jitter(&rng, delay, &policy), delay);
    }

    #[test]
    fn test_jitter_bounded_and_additive() {
        let rng = Mutex::new(StdRng::seed_from_u64(7));
        let delay = Duration::from_millis(20);
        let policy = RetryPolicy::default().with_jitter(0.5);

        for _ in 0..100 {
            let jittered = apply_jitter(&rng, delay, &policy);
            assert!(jittered >= delay);
            assert!(jittered < delay + delay.mul_f64(0.5));
        }
    }

    #[test]
    fn test_parent_cancellation_closes_pool() {
        let root = CancellationToken::new();
        let scheduler = Scheduler::new(&root, 2);
        assert!(!scheduler.is_closed());

        root.cancel();
        assert!(scheduler.is_closed());
    }
}
