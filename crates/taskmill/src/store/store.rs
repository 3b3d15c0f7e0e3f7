//! DocumentStore trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// An entity read from the backing collection.
///
/// The core only interprets `id`, `created_at`, and the presence of `claim`;
/// `data` is carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,

    /// Claim marker; present once the document has been processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<serde_json::Value>,
}

impl Document {
    /// Create an unclaimed document.
    pub fn new(id: Uuid, created_at: DateTime<Utc>, data: serde_json::Value) -> Self {
        Self {
            id,
            created_at,
            data,
            claim: None,
        }
    }

    /// Whether a claim marker is present.
    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }
}

/// Position in the descending `(created_at, id)` total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Predicates a read can combine.
///
/// `page_after` selects documents strictly after the cursor in the
/// descending `(created_at, id)` order:
/// `created_at < cursor.created_at OR (created_at == cursor.created_at AND
/// id < cursor.id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    /// Strict upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,

    /// Compound-key pagination cursor
    pub page_after: Option<PageCursor>,

    /// Only documents without a claim marker
    pub unclaimed_only: bool,
}

impl DocumentFilter {
    /// Evaluate the filter against one document.
    pub fn matches(&self, doc: &Document) -> bool {
        if self.unclaimed_only && doc.is_claimed() {
            return false;
        }
        if let Some(cutoff) = self.created_before {
            if doc.created_at >= cutoff {
                return false;
            }
        }
        if let Some(cursor) = self.page_after {
            let after = doc.created_at < cursor.created_at
                || (doc.created_at == cursor.created_at && doc.id < cursor.id);
            if !after {
                return false;
            }
        }
        true
    }
}

/// Sort order for reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// No ordering requirement
    #[default]
    Unsorted,

    /// Descending by `created_at`, ties broken by descending `id`
    CreatedDesc,
}

/// One compare-and-set claim write.
///
/// Semantics: set `claim` on the document with this `id` only while its
/// claim is still absent. A lost race is a no-op, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimUpdate {
    pub id: Uuid,
    pub claim: serde_json::Value,
}

/// Counters reported by a bulk write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteOutcome {
    /// Documents whose filter matched
    pub matched: u64,

    /// Documents actually modified (claim-write winners)
    pub modified: u64,
}

/// Read/write interface to the backing collection.
///
/// Implementations must be thread-safe. A claim update's filter carries the
/// claim-absence predicate, so concurrent writers racing on one document
/// produce a single winner.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Read up to `limit` documents matching `filter`, ordered by `sort`.
    async fn find(
        &self,
        filter: DocumentFilter,
        sort: SortOrder,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// Apply claim updates. With `ordered` false, entries are independent and
    /// a failed entry does not stop the rest.
    async fn bulk_update(
        &self,
        updates: Vec<ClaimUpdate>,
        ordered: bool,
    ) -> Result<BulkWriteOutcome, StoreError>;

    /// Create the indexes efficient sweeps rely on (descending
    /// `created_at`). Optional; defaults to a no-op.
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(ts: i64, id: Uuid) -> Document {
        Document::new(
            id,
            DateTime::<Utc>::from_timestamp_millis(ts).unwrap(),
            json!({}),
        )
    }

    #[test]
    fn test_created_before_is_strict() {
        let cutoff = DateTime::<Utc>::from_timestamp_millis(1_000).unwrap();
        let filter = DocumentFilter {
            created_before: Some(cutoff),
            ..Default::default()
        };

        assert!(filter.matches(&doc(999, Uuid::now_v7())));
        assert!(!filter.matches(&doc(1_000, Uuid::now_v7())));
        assert!(!filter.matches(&doc(1_001, Uuid::now_v7())));
    }

    #[test]
    fn test_unclaimed_only() {
        let filter = DocumentFilter {
            unclaimed_only: true,
            ..Default::default()
        };

        let mut d = doc(1, Uuid::now_v7());
        assert!(filter.matches(&d));
        d.claim = Some(json!("done"));
        assert!(!filter.matches(&d));
    }

    #[test]
    fn test_page_after_breaks_timestamp_ties_on_id() {
        let ts = DateTime::<Utc>::from_timestamp_millis(500).unwrap();
        let low = Uuid::from_u128(1);
        let mid = Uuid::from_u128(2);
        let high = Uuid::from_u128(3);

        let filter = DocumentFilter {
            page_after: Some(PageCursor {
                created_at: ts,
                id: mid,
            }),
            ..Default::default()
        };

        // Same timestamp: only ids below the cursor are "after" it in the
        // descending order.
        assert!(filter.matches(&Document::new(low, ts, json!({}))));
        assert!(!filter.matches(&Document::new(mid, ts, json!({}))));
        assert!(!filter.matches(&Document::new(high, ts, json!({}))));

        // Earlier timestamps always qualify, any id.
        assert!(filter.matches(&doc(499, high)));
        // Later timestamps never do.
        assert!(!filter.matches(&doc(501, low)));
    }

    #[test]
    fn test_document_serde_omits_absent_claim() {
        let d = doc(42, Uuid::from_u128(9));
        let value = serde_json::to_value(&d).unwrap();
        assert!(value.get("claim").is_none());

        let restored: Document = serde_json::from_value(value).unwrap();
        assert_eq!(restored, d);
    }
}
