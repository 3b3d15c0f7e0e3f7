//! Document store abstraction
//!
//! The driver consumes the backing collection only through
//! [`DocumentStore`]; [`InMemoryDocumentStore`] is the reference
//! implementation used in tests.

mod memory;
mod store;

pub use memory::InMemoryDocumentStore;
pub use store::{
    BulkWriteOutcome, ClaimUpdate, Document, DocumentFilter, DocumentStore, PageCursor, SortOrder,
    StoreError,
};
