//! Type-erased task callable
//!
//! A [`Task`] wraps any async closure taking a [`CancellationToken`]. The
//! scheduler never inspects the payload; the closure is re-invoked on each
//! retry attempt and must observe the token at its own safe points.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Outcome of a single task attempt.
///
/// The error is opaque to the scheduler; it only decides whether another
/// attempt happens.
pub type TaskResult = anyhow::Result<()>;

/// Boxed future returned by each task invocation.
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send + 'static>>;

/// An async, cancelable, re-invocable unit of work.
///
/// Cloning is cheap; the underlying callable is shared.
#[derive(Clone)]
pub struct Task {
    f: Arc<dyn Fn(CancellationToken) -> TaskFuture + Send + Sync + 'static>,
}

impl Task {
    /// Wrap an async closure as a task.
    ///
    /// The closure runs once per attempt. It receives the scheduler's
    /// cancellation token and should return promptly once the token fires.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            f: Arc::new(move |token| Box::pin(f(token))),
        }
    }

    /// Start one attempt.
    pub(crate) fn call(&self, token: CancellationToken) -> TaskFuture {
        (self.f)(token)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task(..)")
    }
}
