//! # taskmill
//!
//! A bounded-concurrency task execution core with retrying workers, plus a
//! paginated batch driver that sweeps a document collection and claims
//! documents as they are processed.
//!
//! ## Features
//!
//! - **Bounded worker pool**: a fixed number of worker lanes with rendezvous
//!   hand-off backpressure and cooperative cancellation
//! - **Automatic retries**: configurable retry policies with exponential
//!   backoff, delay cap, and jitter
//! - **Paginated sweeps**: compound-key pagination that stays duplicate-free
//!   when timestamps tie
//! - **Cooperative claiming**: compare-and-set claim writes let independent
//!   driver instances partition a shared collection without coordination
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BatchDriver                            │
//! │  (paginates the collection, submits work, writes claims)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Scheduler                             │
//! │  (N worker lanes, retry with backoff, cancellation)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DocumentStore                           │
//! │  (find / bulk_update against the backing collection)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskmill::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! let root = CancellationToken::new();
//! let scheduler = Arc::new(Scheduler::new(&root, 4));
//! let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
//!
//! let driver = BatchDriver::new(store, Arc::clone(&scheduler), 100);
//! driver
//!     .run(root.clone(), |doc| async move {
//!         // process the document, return the claim value to record
//!         Ok(serde_json::json!({ "done": true }))
//!     })
//!     .await?;
//!
//! scheduler.shutdown().await;
//! ```

pub mod driver;
pub mod retry;
pub mod scheduler;
pub mod store;

/// Prelude for common imports
pub mod prelude {
    pub use crate::driver::{BatchDriver, ClaimResult, DriverError};
    pub use crate::retry::RetryPolicy;
    pub use crate::scheduler::{Scheduler, Task, TaskResult};
    pub use crate::store::{
        BulkWriteOutcome, ClaimUpdate, Document, DocumentFilter, DocumentStore,
        InMemoryDocumentStore, PageCursor, SortOrder, StoreError,
    };
}

// Re-export key types at crate root
pub use driver::{BatchDriver, ClaimResult, DriverError};
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, Task, TaskFuture, TaskResult};
pub use store::{
    BulkWriteOutcome, ClaimUpdate, Document, DocumentFilter, DocumentStore,
    InMemoryDocumentStore, PageCursor, SortOrder, StoreError,
};
