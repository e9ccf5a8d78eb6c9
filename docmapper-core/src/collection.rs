//! Collection handles over a storage backend.
//!
//! - [`CollectionHandle`] works with raw BSON documents.
//! - [`TypedCollection`] wraps a handle and (de)serializes a [`Document`] type.
//!
//! Handles own no data; they borrow the backend of the [`Connection`](crate::connection::Connection)
//! that created them and are cheap to create per call.
//!
//! Collection names may be dot-namespaced (`"blog.posts"`). Each segment must be
//! non-empty and free of `.`, `$` and NUL characters.

use bson::Bson;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    backend::DynStoreBackend,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter, Query},
    schema::IndexSpec,
};

const RESERVED_CHARS: [char; 3] = ['.', '$', '\0'];

/// Checks that `name` is usable as a single segment of a collection name.
pub fn validate_segment(name: &str) -> DocumentStoreResult<()> {
    if name.is_empty() || name.contains(RESERVED_CHARS) {
        return Err(DocumentStoreError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Checks every dot-separated segment of a collection name.
pub fn validate_collection_name(name: &str) -> DocumentStoreResult<()> {
    if name.is_empty() {
        return Err(DocumentStoreError::InvalidName(name.to_string()));
    }

    name.split('.')
        .try_for_each(validate_segment)
        .map_err(|_| DocumentStoreError::InvalidName(name.to_string()))
}

/// A named collection backed by a borrowed storage backend.
#[derive(Debug, Clone)]
pub struct CollectionHandle<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> CollectionHandle<'a> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the full (possibly dot-namespaced) name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn backend(&self) -> &'a dyn DynStoreBackend {
        self.backend
    }

    /// Returns a handle for the nested collection `"{self.name}.{name}"`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidName`] if `name` is not a valid single segment.
    pub fn sub_collection(&self, name: &str) -> DocumentStoreResult<CollectionHandle<'a>> {
        validate_segment(name)?;

        Ok(CollectionHandle::new(format!("{}.{}", self.name, name), self.backend))
    }

    /// Views this collection through a document type.
    pub fn typed<D: Document>(&self) -> TypedCollection<'a, D> {
        TypedCollection::new(self.clone())
    }

    /// Inserts new documents. Each must carry a primary key.
    pub async fn insert(&self, documents: Vec<Bson>) -> DocumentStoreResult<()> {
        self.backend.insert_documents(documents, &self.name).await
    }

    /// Replaces existing documents, matched by primary key.
    pub async fn update(&self, documents: Vec<Bson>) -> DocumentStoreResult<()> {
        self.backend.update_documents(documents, &self.name).await
    }

    /// Deletes documents by primary key.
    pub async fn delete<K>(&self, ids: Vec<K>) -> DocumentStoreResult<()>
    where
        K: Into<Bson>,
    {
        self.backend
            .delete_documents(ids.into_iter().map(Into::into).collect(), &self.name)
            .await
    }

    /// Fetches documents by primary key; missing keys are skipped.
    pub async fn get<K>(&self, ids: Vec<K>) -> DocumentStoreResult<Vec<Bson>>
    where
        K: Into<Bson>,
    {
        self.backend
            .get_documents(ids.into_iter().map(Into::into).collect(), &self.name)
            .await
    }

    /// Fetches the document whose primary key equals `id`.
    ///
    /// An absent document is `Ok(None)`, not an error.
    pub async fn get_by_primary_key(&self, id: impl Into<Bson>) -> DocumentStoreResult<Option<Bson>> {
        let id = id.into();
        debug!(collection = %self.name, %id, "fetching document by primary key");

        Ok(self
            .backend
            .query_documents(
                Query::builder().filter(Filter::primary_key(id)).limit(1).build(),
                &self.name,
            )
            .await?
            .into_iter()
            .next())
    }

    /// Runs a structured query against this collection.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        self.backend.query_documents(query, &self.name).await
    }

    /// Counts documents matching `filter`, or all documents when `filter` is `None`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend.count_documents(filter, &self.name).await
    }

    /// Returns the single document matching `filter`.
    ///
    /// - no match: `Ok(None)`
    /// - one match: `Ok(Some(document))`
    /// - several matches: [`DocumentStoreError::MultipleResults`] with the match count
    pub async fn one(&self, filter: Expr) -> DocumentStoreResult<Option<Bson>> {
        let count = self.backend.count_documents(Some(filter.clone()), &self.name).await?;
        debug!(collection = %self.name, count, "resolving single result");

        match count {
            0 => Ok(None),
            1 => Ok(self
                .backend
                .query_documents(Query::builder().filter(filter).limit(1).build(), &self.name)
                .await?
                .into_iter()
                .next()),
            count => Err(DocumentStoreError::MultipleResults {
                count,
                collection: self.name.clone(),
            }),
        }
    }

    /// Returns a uniformly chosen document from this collection.
    ///
    /// Sampling quality follows the backend: stores with a native sampling query use it,
    /// others skip a random number of documents in their natural order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::EmptyCollection`] when there is nothing to sample,
    /// including when the last document disappears while sampling.
    pub async fn random_one(&self) -> DocumentStoreResult<Bson> {
        match self.backend.random_document(&self.name).await? {
            Some(document) => Ok(document),
            None => {
                warn!(collection = %self.name, "random document requested from empty collection");
                Err(DocumentStoreError::EmptyCollection(self.name.clone()))
            }
        }
    }

    /// Ensures a single index exists on this collection.
    pub async fn ensure_index(&self, index: &IndexSpec) -> DocumentStoreResult<()> {
        self.backend.add_index(&self.name, index).await
    }

    /// Lists the declared indexes of this collection.
    pub async fn indexes(&self) -> DocumentStoreResult<Vec<IndexSpec>> {
        self.backend.list_indexes(&self.name).await
    }
}

/// A collection viewed through a concrete [`Document`] type.
#[derive(Debug, Clone)]
pub struct TypedCollection<'a, D: Document> {
    inner: CollectionHandle<'a>,
    _marker: PhantomData<D>,
}

impl<'a, D: Document> TypedCollection<'a, D> {
    pub(crate) fn new(inner: CollectionHandle<'a>) -> Self {
        Self { inner, _marker: PhantomData }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped handle for this collection.
    pub fn untyped(&self) -> &CollectionHandle<'a> {
        &self.inner
    }

    /// Views the same collection through another document type.
    pub fn with_type<T: Document>(&self) -> TypedCollection<'a, T> {
        TypedCollection::new(self.inner.clone())
    }

    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        self.inner.insert(to_bson_all(&documents)?).await
    }

    pub async fn update(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        self.inner.update(to_bson_all(&documents)?).await
    }

    pub async fn delete<K>(&self, ids: Vec<K>) -> DocumentStoreResult<()>
    where
        K: Into<Bson>,
    {
        self.inner.delete(ids).await
    }

    pub async fn get<K>(&self, ids: Vec<K>) -> DocumentStoreResult<Vec<D>>
    where
        K: Into<Bson>,
    {
        from_bson_all(self.inner.get(ids).await?)
    }

    pub async fn get_by_primary_key(&self, id: impl Into<Bson>) -> DocumentStoreResult<Option<D>> {
        self.inner
            .get_by_primary_key(id)
            .await?
            .map(D::from_bson)
            .transpose()
    }

    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        from_bson_all(self.inner.query(query).await?)
    }

    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.inner.count(filter).await
    }

    /// Typed counterpart of [`CollectionHandle::one`].
    pub async fn one(&self, filter: Expr) -> DocumentStoreResult<Option<D>> {
        self.inner.one(filter).await?.map(D::from_bson).transpose()
    }

    /// Typed counterpart of [`CollectionHandle::random_one`].
    pub async fn random_one(&self) -> DocumentStoreResult<D> {
        D::from_bson(self.inner.random_one().await?)
    }
}

fn to_bson_all<D: Document>(documents: &[D]) -> DocumentStoreResult<Vec<Bson>> {
    documents.iter().map(DocumentExt::to_bson).collect()
}

fn from_bson_all<D: Document>(documents: Vec<Bson>) -> DocumentStoreResult<Vec<D>> {
    documents.into_iter().map(D::from_bson).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreBackend;
    use async_trait::async_trait;

    /// Reports documents on count but returns none on fetch, as if they were
    /// deleted between the two calls.
    #[derive(Debug)]
    struct VanishingBackend {
        reported: u64,
    }

    #[async_trait]
    impl StoreBackend for VanishingBackend {
        async fn insert_documents(&self, _: Vec<Bson>, _: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn update_documents(&self, _: Vec<Bson>, _: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn delete_documents(&self, _: Vec<Bson>, _: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn get_documents(&self, _: Vec<Bson>, _: &str) -> DocumentStoreResult<Vec<Bson>> {
            Ok(vec![])
        }

        async fn query_documents(&self, _: Query, _: &str) -> DocumentStoreResult<Vec<Bson>> {
            Ok(vec![])
        }

        async fn count_documents(&self, _: Option<Expr>, _: &str) -> DocumentStoreResult<u64> {
            Ok(self.reported)
        }

        async fn create_collection(&self, _: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn drop_collection(&self, _: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
            Ok(vec![])
        }

        async fn add_index(&self, _: &str, _: &IndexSpec) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn drop_index(&self, _: &str, _: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn list_indexes(&self, _: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn random_one_reports_documents_vanishing_after_count() {
        let backend = VanishingBackend { reported: 4 };
        let logs = CollectionHandle::new("logs".to_string(), &backend);

        match logs.random_one().await {
            Err(DocumentStoreError::EmptyCollection(name)) => assert_eq!(name, "logs"),
            other => panic!("expected EmptyCollection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_reports_match_count_from_backend() {
        let backend = VanishingBackend { reported: 3 };
        let logs = CollectionHandle::new("logs".to_string(), &backend);

        assert!(matches!(
            logs.one(Filter::eq("level", "warn")).await,
            Err(DocumentStoreError::MultipleResults { count: 3, .. })
        ));
    }

    #[test]
    fn segments_reject_reserved_characters() {
        assert!(validate_segment("posts").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("a.b").is_err());
        assert!(validate_segment("$cmd").is_err());
        assert!(validate_segment("nul\0").is_err());
    }

    #[test]
    fn collection_names_allow_namespaces() {
        assert!(validate_collection_name("blog.posts.comments").is_ok());
        assert!(validate_collection_name("blog..posts").is_err());
        assert!(validate_collection_name(".posts").is_err());
        assert!(validate_collection_name("").is_err());
    }
}
