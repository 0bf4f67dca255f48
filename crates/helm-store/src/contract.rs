//! Narrow contract over the external document store.
//!
//! The console owns no persistence: every handler reads what it needs,
//! mutates through [`DocumentStore::update_one`], and discards its working
//! set. An update carries both field sets and array appends in one call so
//! the store can apply them atomically.

use async_trait::async_trait;

use helm_core::ids::DocId;

use crate::error::StoreError;
use crate::query::{FindOptions, Predicate, UpdateSpec};

pub type Document = serde_json::Value;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Count documents matching the predicate.
    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError>;

    /// First matching document, if any.
    async fn find_one(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<Option<Document>, StoreError>;

    /// All matching documents, honoring sort/skip/limit.
    async fn find_many(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert a document; the store assigns and returns its surrogate key.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<DocId, StoreError>;

    /// Apply `set` fields and `push` appends to the first matching document
    /// in one atomic operation. Returns false when nothing matched.
    async fn update_one(
        &self,
        collection: &str,
        predicate: &Predicate,
        update: UpdateSpec,
    ) -> Result<bool, StoreError>;

    /// Delete the first matching document. Returns false when nothing matched.
    async fn delete_one(&self, collection: &str, predicate: &Predicate)
        -> Result<bool, StoreError>;
}
