//! Bounded worker pool for task execution
//!
//! This module provides:
//! - [`Scheduler`] - fixed-size worker pool with retrying execution
//! - [`Task`] - type-erased async callable submitted to the pool
//!
//! # Architecture
//!
//! ```text
//! submit / try_submit
//!         │
//!         ▼ (rendezvous: blocks until a lane is free)
//! ┌─────────────────────────────────────────────────────┐
//! │          Worker lanes (semaphore-gated)             │
//! │  [lane 1] [lane 2] ... [lane N]                     │
//! │  each lane: attempt → backoff wait → attempt ...    │
//! └─────────────────────────────────────────────────────┘
//!         │
//!         ▼
//!   CancellationToken (derived from the parent; shutdown
//!   cancels it, aborting backoff waits and new hand-offs)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use taskmill::{RetryPolicy, Scheduler, Task};
//! use tokio_util::sync::CancellationToken;
//!
//! let root = CancellationToken::new();
//! let scheduler = Scheduler::new(&root, 4);
//!
//! let accepted = scheduler
//!     .submit(
//!         Task::new(|_token| async { Ok(()) }),
//!         RetryPolicy::default().with_max_attempts(3),
//!     )
//!     .await;
//! assert!(accepted);
//!
//! scheduler.shutdown().await;
//! ```

mod pool;
mod task;

pub use pool::Scheduler;
pub use task::{Task, TaskFuture, TaskResult};
