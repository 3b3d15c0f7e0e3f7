//! Batch driver: pagination, dispatch, and the claim protocol

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::retry::RetryPolicy;
use crate::scheduler::{Scheduler, Task, TaskResult};
use crate::store::{
    ClaimUpdate, Document, DocumentFilter, DocumentStore, PageCursor, SortOrder, StoreError,
};

/// Page size used when the configured value is below 1.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Errors surfaced by driver sweeps
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The cancellation token fired at a suspension point
    #[error("sweep cancelled")]
    Cancelled,

    /// A fetch or bulk write against the store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of processing one document in a claim sweep.
///
/// `Ok` carries the claim value recorded for the document; `Err` withholds
/// the claim, leaving the document eligible for a future sweep.
pub type ClaimResult = Result<serde_json::Value, String>;

/// Paginated batch processor.
///
/// A driver owns no concurrency of its own; every unit of work goes through
/// the [`Scheduler`] it was built with. Multiple driver instances may sweep
/// the same collection concurrently: the claim write's claim-absence filter
/// makes each document a single-winner race, so work may be duplicated but
/// claims never are.
pub struct BatchDriver {
    store: Arc<dyn DocumentStore>,
    scheduler: Arc<Scheduler>,
    page_size: usize,
    cutoff: Option<DateTime<Utc>>,
    startup_jitter: Duration,
}

impl BatchDriver {
    /// Create a driver reading pages of `page_size` documents (values below
    /// 1 fall back to [`DEFAULT_PAGE_SIZE`]).
    pub fn new(store: Arc<dyn DocumentStore>, scheduler: Arc<Scheduler>, page_size: usize) -> Self {
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        Self {
            store,
            scheduler,
            page_size,
            cutoff: None,
            startup_jitter: Duration::from_secs(1),
        }
    }

    /// Constrain claim sweeps to documents created before `cutoff`.
    pub fn with_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Upper bound for the random delay before a claim sweep's first fetch
    /// (default 1 s; zero disables it).
    ///
    /// The delay spreads out head-on contention when many drivers start
    /// against the same collection at once.
    pub fn with_startup_jitter(mut self, max: Duration) -> Self {
        self.startup_jitter = max;
        self
    }

    /// Configured page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Dispatch every document created before `cutoff`, page by page.
    ///
    /// Pages are read in descending `(created_at, id)` order and each page is
    /// submitted to the scheduler as a single task with no retries. Returns
    /// the number of documents handed to the scheduler, which is not
    /// necessarily the number processed: if the scheduler closes mid-sweep
    /// the sweep ends silently with the count so far, and already-dispatched
    /// pages may still be abandoned on cancellation.
    #[instrument(skip(self, token, process), fields(page_size = self.page_size, %cutoff))]
    pub async fn process_before<F, Fut>(
        &self,
        token: CancellationToken,
        cutoff: DateTime<Utc>,
        process: F,
    ) -> Result<u64, DriverError>
    where
        F: Fn(CancellationToken, Vec<Document>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let process = Arc::new(process);
        let mut dispatched: u64 = 0;
        let mut cursor: Option<PageCursor> = None;

        loop {
            if token.is_cancelled() {
                return Err(DriverError::Cancelled);
            }

            let filter = DocumentFilter {
                created_before: cursor.is_none().then_some(cutoff),
                page_after: cursor,
                unclaimed_only: false,
            };
            let page = self
                .store
                .find(filter, SortOrder::CreatedDesc, self.page_size)
                .await?;
            if page.is_empty() {
                return Ok(dispatched);
            }

            cursor = page.last().map(|d| PageCursor {
                created_at: d.created_at,
                id: d.id,
            });
            let page_len = page.len();
            let short_page = page_len < self.page_size;

            let process = Arc::clone(&process);
            let task = Task::new(move |task_token| {
                let process = Arc::clone(&process);
                let batch = page.clone();
                async move { (*process)(task_token, batch).await }
            });
            if !self.scheduler.submit(task, RetryPolicy::no_retry()).await {
                debug!(dispatched, "scheduler closed, ending sweep");
                return Ok(dispatched);
            }
            dispatched += page_len as u64;
            trace!(dispatched, page_len, "page dispatched");

            if short_page {
                return Ok(dispatched);
            }
        }
    }

    /// Sweep unclaimed documents until the collection is drained.
    ///
    /// Each iteration reads one page of documents without a claim marker
    /// (further constrained by [`with_cutoff`](Self::with_cutoff) when set),
    /// submits one no-retry task per document, waits for the whole page to
    /// report, then records the resulting claims in a single unordered
    /// compare-and-set bulk write. Documents whose callable failed get no
    /// claim and are picked up again by a later sweep.
    ///
    /// Returns `Ok(())` once a fetch comes back empty, or early when the
    /// scheduler closes mid-page; fetch and bulk-write failures are fatal,
    /// and cancellation surfaces as [`DriverError::Cancelled`].
    #[instrument(skip(self, token, process), fields(page_size = self.page_size))]
    pub async fn run<F, Fut>(&self, token: CancellationToken, process: F) -> Result<(), DriverError>
    where
        F: Fn(Document) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClaimResult> + Send + 'static,
    {
        let process = Arc::new(process);

        let jitter = self.sample_startup_jitter();
        if !jitter.is_zero() {
            trace!(jitter_ms = jitter.as_millis() as u64, "startup jitter");
            tokio::select! {
                _ = token.cancelled() => return Err(DriverError::Cancelled),
                _ = tokio::time::sleep(jitter) => {}
            }
        }

        loop {
            if token.is_cancelled() {
                return Err(DriverError::Cancelled);
            }

            let filter = DocumentFilter {
                created_before: self.cutoff,
                page_after: None,
                unclaimed_only: true,
            };
            let docs = self
                .store
                .find(filter, SortOrder::Unsorted, self.page_size)
                .await?;
            if docs.is_empty() {
                debug!("no unclaimed documents left");
                return Ok(());
            }

            let page_len = docs.len();
            let (tx, mut rx) = mpsc::channel::<ClaimUpdate>(page_len);
            let mut rejected = false;

            for doc in docs {
                let process = Arc::clone(&process);
                let tx = tx.clone();
                let task = Task::new(move |_task_token| {
                    let process = Arc::clone(&process);
                    let doc = doc.clone();
                    let tx = tx.clone();
                    async move {
                        let id = doc.id;
                        match (*process)(doc).await {
                            Ok(claim) => {
                                let _ = tx.send(ClaimUpdate { id, claim }).await;
                            }
                            Err(error) => {
                                debug!(document = %id, %error, "processing failed, claim withheld");
                            }
                        }
                        Ok(())
                    }
                });
                if !self.scheduler.submit(task, RetryPolicy::no_retry()).await {
                    warn!("scheduler closed mid-page, ending sweep");
                    rejected = true;
                    break;
                }
            }

            // Page barrier: every submitted task holds a sender clone and
            // drops it on every exit path, so the drain ends once the whole
            // page has reported or been abandoned.
            drop(tx);
            let mut updates = Vec::with_capacity(page_len);
            while let Some(update) = rx.recv().await {
                updates.push(update);
            }

            if token.is_cancelled() {
                return Err(DriverError::Cancelled);
            }

            if !updates.is_empty() {
                let outcome = self.store.bulk_update(updates, false).await?;
                debug!(
                    matched = outcome.matched,
                    modified = outcome.modified,
                    "claims written"
                );
            }

            if rejected {
                return Ok(());
            }
        }
    }

    fn sample_startup_jitter(&self) -> Duration {
        if self.startup_jitter.is_zero() {
            return Duration::ZERO;
        }
        self.startup_jitter.mul_f64(rand::thread_rng().gen::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;

    fn driver(page_size: usize) -> BatchDriver {
        let root = CancellationToken::new();
        BatchDriver::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(Scheduler::new(&root, 1)),
            page_size,
        )
    }

    #[test]
    fn test_page_size_coerced_to_default() {
        assert_eq!(driver(0).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(driver(25).page_size(), 25);
    }

    #[test]
    fn test_startup_jitter_sampling() {
        let d = driver(10).with_startup_jitter(Duration::ZERO);
        assert_eq!(d.sample_startup_jitter(), Duration::ZERO);

        let d = driver(10).with_startup_jitter(Duration::from_millis(100));
        for _ in 0..50 {
            assert!(d.sample_startup_jitter() < Duration::from_millis(100));
        }
    }
}
