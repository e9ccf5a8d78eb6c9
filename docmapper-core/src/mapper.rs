//! Name-based resolution of schemas and nested collections.
//!
//! A [`DocumentMapper`] is a collection handle that also knows the schema registry.
//! [`DocumentMapper::resolve`] turns a name into either a [`BoundSchema`] (when the
//! name is registered) or a mapper over the nested collection `"{current}.{name}"`.
//! Unknown names are never an error; they navigate one level down.
//!
//! ```ignore
//! let blog = connection.mapper("blog")?;
//!
//! match blog.resolve("Post").await? {
//!     Resolved::Schema(posts) => { /* indexes for Post now exist on "blog" */ }
//!     Resolved::SubCollection(nested) => { /* "blog.Post" */ }
//! }
//! ```

use bson::Bson;
use mea::rwlock::RwLock;
use std::collections::HashSet;
use tracing::debug;

use crate::{
    collection::{CollectionHandle, validate_segment},
    error::DocumentStoreResult,
    query::Expr,
    schema::{BoundSchema, SchemaRegistry},
};

/// The outcome of [`DocumentMapper::resolve`].
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    /// The name is a registered schema, bound to the current collection.
    Schema(BoundSchema<'a>),
    /// The name is not registered; this is the nested collection.
    SubCollection(DocumentMapper<'a>),
}

impl<'a> Resolved<'a> {
    pub fn is_schema(&self) -> bool {
        matches!(self, Resolved::Schema(_))
    }

    pub fn into_schema(self) -> Option<BoundSchema<'a>> {
        match self {
            Resolved::Schema(schema) => Some(schema),
            Resolved::SubCollection(_) => None,
        }
    }

    pub fn into_sub_collection(self) -> Option<DocumentMapper<'a>> {
        match self {
            Resolved::Schema(_) => None,
            Resolved::SubCollection(mapper) => Some(mapper),
        }
    }
}

/// Remembers which `(collection, schema)` pairs already had their indexes ensured.
#[derive(Debug, Default)]
pub(crate) struct IndexCache {
    ensured: RwLock<HashSet<(String, &'static str)>>,
}

impl IndexCache {
    async fn ensure(&self, schema: &BoundSchema<'_>) -> DocumentStoreResult<()> {
        let key = (schema.collection().name().to_string(), schema.name());

        if self.ensured.read().await.contains(&key) {
            debug!(collection = %key.0, schema = key.1, "indexes already ensured");
            return Ok(());
        }

        schema.ensure_indexes().await?;
        self.ensured.write().await.insert(key);

        Ok(())
    }

    pub(crate) async fn forget_collection(&self, collection: &str) {
        self.ensured
            .write()
            .await
            .retain(|(name, _)| name != collection);
    }
}

/// A collection handle that resolves registered schema names.
#[derive(Debug, Clone)]
pub struct DocumentMapper<'a> {
    collection: CollectionHandle<'a>,
    registry: &'a SchemaRegistry,
    index_cache: Option<&'a IndexCache>,
}

impl<'a> DocumentMapper<'a> {
    /// Creates a mapper over `collection` resolving names through `registry`.
    pub fn new(collection: CollectionHandle<'a>, registry: &'a SchemaRegistry) -> Self {
        Self {
            collection,
            registry,
            index_cache: None,
        }
    }

    pub(crate) fn with_index_cache(mut self, cache: &'a IndexCache) -> Self {
        self.index_cache = Some(cache);
        self
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &CollectionHandle<'a> {
        &self.collection
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Resolves `name` against the registry.
    ///
    /// A registered name yields that schema bound to this collection, with its
    /// indexes ensured. Any other name yields a mapper over `"{self.name}.{name}"`.
    /// Nothing is cached unless the connection enables index-check caching, in which
    /// case only the index step is skipped for pairs seen before.
    ///
    /// # Errors
    ///
    /// [`InvalidName`](crate::error::DocumentStoreError::InvalidName) when `name` is empty
    /// or contains `.`, `$` or NUL; backend errors from index creation pass through.
    pub async fn resolve(&self, name: &str) -> DocumentStoreResult<Resolved<'a>> {
        validate_segment(name)?;

        match self.registry.get(name) {
            Some(constructor) => {
                debug!(collection = self.name(), schema = name, "binding schema");
                let bound = constructor.bind(self.collection.clone());

                match self.index_cache {
                    Some(cache) => cache.ensure(&bound).await?,
                    None => bound.ensure_indexes().await?,
                }

                Ok(Resolved::Schema(bound))
            }
            None => {
                debug!(collection = self.name(), name, "resolving nested collection");
                Ok(Resolved::SubCollection(self.sub_collection(name)?))
            }
        }
    }

    /// Returns a mapper over the nested collection `"{self.name}.{name}"`, bypassing the registry.
    pub fn sub_collection(&self, name: &str) -> DocumentStoreResult<DocumentMapper<'a>> {
        Ok(Self {
            collection: self.collection.sub_collection(name)?,
            registry: self.registry,
            index_cache: self.index_cache,
        })
    }

    /// See [`CollectionHandle::get_by_primary_key`].
    pub async fn get_by_primary_key(&self, id: impl Into<Bson>) -> DocumentStoreResult<Option<Bson>> {
        self.collection.get_by_primary_key(id).await
    }

    /// See [`CollectionHandle::one`].
    pub async fn one(&self, filter: Expr) -> DocumentStoreResult<Option<Bson>> {
        self.collection.one(filter).await
    }

    /// See [`CollectionHandle::random_one`].
    pub async fn random_one(&self) -> DocumentStoreResult<Bson> {
        self.collection.random_one().await
    }
}
