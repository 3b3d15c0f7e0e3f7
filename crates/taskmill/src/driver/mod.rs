//! Paginated batch processing over a document collection
//!
//! This module provides [`BatchDriver`], which walks the backing collection
//! through a [`DocumentStore`](crate::store::DocumentStore) and dispatches
//! work through a [`Scheduler`](crate::scheduler::Scheduler):
//!
//! - [`BatchDriver::process_before`] - bounded sweep of everything created
//!   before a cutoff, one task per page
//! - [`BatchDriver::run`] - continuous sweep of unclaimed documents, one task
//!   per document, with compare-and-set claim writes
//!
//! # Example
//!
//! ```ignore
//! use taskmill::{BatchDriver, Scheduler};
//!
//! let driver = BatchDriver::new(store, scheduler, 100)
//!     .with_startup_jitter(std::time::Duration::ZERO);
//!
//! driver
//!     .run(token, |doc| async move { Ok(serde_json::json!("processed")) })
//!     .await?;
//! ```

mod batch;

pub use batch::{BatchDriver, ClaimResult, DriverError, DEFAULT_PAGE_SIZE};
