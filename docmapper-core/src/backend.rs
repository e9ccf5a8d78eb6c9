//! Storage backend abstraction.
//!
//! A backend is the external document-store driver this crate maps onto. It owns
//! query execution, connection pooling and retries; the mapping layer only issues
//! requests through [`StoreBackend`] and passes its errors through unchanged.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the core trait for storage backends
//! - [`DynStoreBackend`]: object-safe mirror of [`StoreBackend`] used behind `dyn`
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances

use async_trait::async_trait;
use bson::Bson;
use rand::Rng;
use std::{any::Any, fmt::Debug};
use tracing::debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
    schema::IndexSpec,
};

/// Abstract interface for document storage backends.
///
/// Documents cross this boundary as BSON maps carrying their primary key in the
/// [`PRIMARY_KEY`](crate::document::PRIMARY_KEY) field. All implementations must be
/// safe to share between tasks.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection, creating the collection if needed.
    ///
    /// # Errors
    ///
    /// Fails if a document has no primary key, if the primary key is already taken,
    /// or if a unique index would be violated.
    async fn insert_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()>;

    /// Replaces existing documents, matched by primary key.
    async fn update_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()>;

    /// Deletes documents by primary key.
    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<()>;

    /// Fetches documents by primary key. Missing keys are omitted from the result.
    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Runs a structured query. Without a sort, results follow the backend's natural order.
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts the documents matching `filter`, or every document when `filter` is `None`.
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;

    /// Returns one uniformly chosen document, or `None` when the collection is empty.
    ///
    /// The default implementation counts the collection, draws an offset in `[0, count)`
    /// and skips that many documents in natural order. Its randomness is only as good as
    /// that order; backends with a native sampling query should override it.
    async fn random_document(&self, collection: &str) -> DocumentStoreResult<Option<Bson>> {
        let total = self.count_documents(None, collection).await?;
        if total == 0 {
            return Ok(None);
        }

        let offset = random_offset(total)?;
        debug!(collection, total, offset, "sampling document by offset");

        Ok(self
            .query_documents(Query::builder().offset(offset).limit(1).build(), collection)
            .await?
            .into_iter()
            .next())
    }

    /// Creates an empty collection. Creating an existing collection is not an error.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and every document in it.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Ensures an index exists. Must be idempotent: adding an index that already exists
    /// with the same options succeeds without changes.
    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()>;

    async fn drop_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()>;

    /// Lists the indexes declared on a collection, excluding the implicit primary key index.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>>;

    /// Cleanly shuts down the backend, releasing all resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Draws an offset uniformly from `[0, total)`. `total` must be non-zero.
///
/// # Errors
///
/// [`DocumentStoreError::Backend`] when the drawn offset does not fit in `usize`.
pub fn random_offset(total: u64) -> DocumentStoreResult<usize> {
    let offset = rand::thread_rng().gen_range(0..total);

    usize::try_from(offset).map_err(|_| {
        DocumentStoreError::Backend(format!("offset {offset} exceeds the platform's addressable range"))
    })
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        (*self).insert_documents(documents, collection).await
    }

    async fn update_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        (*self).update_documents(documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        (*self).delete_documents(ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        (*self).get_documents(ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        (*self).query_documents(query, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        (*self).count_documents(filter, collection).await
    }

    async fn random_document(&self, collection: &str) -> DocumentStoreResult<Option<Bson>> {
        (*self).random_document(collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        (*self).add_index(collection, index).await
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()> {
        (*self).drop_index(collection, field).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        (*self).list_indexes(collection).await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()>;
    async fn update_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()>;
    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<()>;
    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<Vec<Bson>>;
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>>;
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;
    async fn random_document(&self, collection: &str) -> DocumentStoreResult<Option<Bson>>;
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()>;
    async fn drop_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()>;
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn insert_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::update_documents(self, documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::delete_documents(self, ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn random_document(&self, collection: &str) -> DocumentStoreResult<Option<Bson>> {
        StoreBackend::random_document(self, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        StoreBackend::add_index(self, collection, index).await
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_index(self, collection, field).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        StoreBackend::list_indexes(self, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_stay_in_range() {
        assert_eq!(random_offset(1).unwrap(), 0);
        assert!((0..1000).all(|_| random_offset(3).unwrap() < 3));
    }
}
