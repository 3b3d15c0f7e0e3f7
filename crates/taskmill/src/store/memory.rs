//! In-memory implementation of DocumentStore for testing

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;

/// In-memory implementation of [`DocumentStore`]
///
/// This is primarily for testing. It stores all documents in a map and
/// provides the same observable semantics a collection-backed implementation
/// has, including the single-winner claim write.
///
/// # Example
///
/// ```
/// use taskmill::InMemoryDocumentStore;
///
/// let store = InMemoryDocumentStore::new();
/// ```
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace one document
    pub fn insert(&self, doc: Document) {
        self.documents.write().insert(doc.id, doc);
    }

    /// Insert or replace many documents
    pub fn insert_many(&self, docs: impl IntoIterator<Item = Document>) {
        let mut documents = self.documents.write();
        for doc in docs {
            documents.insert(doc.id, doc);
        }
    }

    /// Fetch one document by id
    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.documents.read().get(&id).cloned()
    }

    /// Total number of documents
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Number of documents carrying a claim marker
    pub fn claimed_count(&self) -> usize {
        self.documents
            .read()
            .values()
            .filter(|d| d.is_claimed())
            .count()
    }

    /// Number of documents without a claim marker
    pub fn unclaimed_count(&self) -> usize {
        self.documents
            .read()
            .values()
            .filter(|d| !d.is_claimed())
            .count()
    }

    /// Remove all documents (for testing)
    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(
        &self,
        filter: DocumentFilter,
        sort: SortOrder,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read();
        let mut page: Vec<Document> = documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();

        if sort == SortOrder::CreatedDesc {
            page.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            });
        }

        page.truncate(limit);
        Ok(page)
    }

    async fn bulk_update(
        &self,
        updates: Vec<ClaimUpdate>,
        _ordered: bool,
    ) -> Result<BulkWriteOutcome, StoreError> {
        let mut documents = self.documents.write();
        let mut outcome = BulkWriteOutcome::default();

        for update in updates {
            // The filter is id equality plus claim absence; a document that
            // is missing or already claimed simply does not match.
            if let Some(doc) = documents.get_mut(&update.id) {
                if !doc.is_claimed() {
                    doc.claim = Some(update.claim);
                    outcome.matched += 1;
                    outcome.modified += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
    }

    fn seed(store: &InMemoryDocumentStore, n: u128, base_ts: i64) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..n {
            let id = Uuid::from_u128(i + 1);
            store.insert(Document::new(id, ts(base_ts + i as i64), json!({ "n": i as u64 })));
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn test_find_respects_limit_and_cutoff() {
        let store = InMemoryDocumentStore::new();
        seed(&store, 10, 0);

        let filter = DocumentFilter {
            created_before: Some(ts(5)),
            ..Default::default()
        };
        let page = store.find(filter, SortOrder::CreatedDesc, 3).await.unwrap();

        assert_eq!(page.len(), 3);
        assert_eq!(page[0].created_at, ts(4));
        assert_eq!(page[1].created_at, ts(3));
        assert_eq!(page[2].created_at, ts(2));
    }

    #[tokio::test]
    async fn test_find_orders_ties_by_id_descending() {
        let store = InMemoryDocumentStore::new();
        for i in 1..=5u128 {
            store.insert(Document::new(Uuid::from_u128(i), ts(100), json!({})));
        }

        let page = store
            .find(DocumentFilter::default(), SortOrder::CreatedDesc, 10)
            .await
            .unwrap();

        let ids: Vec<u128> = page.iter().map(|d| d.id.as_u128()).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_compound_key_pagination_has_no_gaps_or_duplicates() {
        let store = InMemoryDocumentStore::new();
        // 7 documents sharing one timestamp and 3 below it.
        for i in 1..=7u128 {
            store.insert(Document::new(Uuid::from_u128(i), ts(100), json!({})));
        }
        for i in 8..=10u128 {
            store.insert(Document::new(Uuid::from_u128(i), ts(50), json!({})));
        }

        let mut seen = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        loop {
            let filter = DocumentFilter {
                page_after: cursor,
                ..Default::default()
            };
            let page = store.find(filter, SortOrder::CreatedDesc, 4).await.unwrap();
            if page.is_empty() {
                break;
            }
            cursor = page.last().map(|d| PageCursor {
                created_at: d.created_at,
                id: d.id,
            });
            seen.extend(page.into_iter().map(|d| d.id));
        }

        assert_eq!(seen.len(), 10);
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn test_bulk_update_claims_once() {
        let store = InMemoryDocumentStore::new();
        let ids = seed(&store, 3, 0);

        let outcome = store
            .bulk_update(
                vec![ClaimUpdate {
                    id: ids[0],
                    claim: json!("first"),
                }],
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.modified, 1);

        // Second write on the same document loses the race.
        let outcome = store
            .bulk_update(
                vec![ClaimUpdate {
                    id: ids[0],
                    claim: json!("second"),
                }],
                false,
            )
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.modified, 0);
        assert_eq!(store.get(ids[0]).unwrap().claim, Some(json!("first")));
        assert_eq!(store.claimed_count(), 1);
        assert_eq!(store.unclaimed_count(), 2);
    }

    #[tokio::test]
    async fn test_bulk_update_unknown_id_is_a_noop() {
        let store = InMemoryDocumentStore::new();
        seed(&store, 2, 0);

        let outcome = store
            .bulk_update(
                vec![ClaimUpdate {
                    id: Uuid::from_u128(999),
                    claim: json!(true),
                }],
                false,
            )
            .await
            .unwrap();

        assert_eq!(outcome, BulkWriteOutcome::default());
        assert_eq!(store.claimed_count(), 0);
    }

    #[tokio::test]
    async fn test_claimed_documents_leave_the_unclaimed_view() {
        let store = InMemoryDocumentStore::new();
        let ids = seed(&store, 4, 0);

        store
            .bulk_update(
                vec![
                    ClaimUpdate {
                        id: ids[1],
                        claim: json!(1),
                    },
                    ClaimUpdate {
                        id: ids[2],
                        claim: json!(2),
                    },
                ],
                false,
            )
            .await
            .unwrap();

        let filter = DocumentFilter {
            unclaimed_only: true,
            ..Default::default()
        };
        let page = store.find(filter, SortOrder::Unsorted, 10).await.unwrap();
        let mut remaining: Vec<Uuid> = page.into_iter().map(|d| d.id).collect();
        remaining.sort();
        assert_eq!(remaining, vec![ids[0], ids[3]]);
    }
}
