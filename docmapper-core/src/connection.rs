//! The connection context: one backend plus the schema registry every mapper resolves against.
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//!
//! let registry = SchemaRegistry::builder().register::<User>().build()?;
//! let connection = Connection::new(InMemoryStore::builder().build().await?, registry);
//!
//! let users = connection.mapper("users")?;
//! let alice = users.one(Filter::eq("name", "Alice")).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{CollectionHandle, TypedCollection, validate_collection_name},
    document::Document,
    error::DocumentStoreResult,
    mapper::{DocumentMapper, IndexCache},
    schema::SchemaRegistry,
};

/// Tunables for a [`Connection`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Skip the index step of schema resolution for `(collection, schema)` pairs already
    /// ensured through this connection. Off by default: every resolution ensures indexes.
    pub cache_index_checks: bool,
}

/// Owns a storage backend and the schema registry.
///
/// Mappers and collection handles borrow the connection, so any number of them can be
/// used concurrently from different tasks.
pub struct Connection {
    backend: Box<dyn DynStoreBackend>,
    registry: SchemaRegistry,
    options: ConnectionOptions,
    index_cache: IndexCache,
}

impl Connection {
    pub fn new<B: StoreBackend + 'static>(backend: B, registry: SchemaRegistry) -> Self {
        Self::from_dyn(Box::new(backend), registry)
    }

    /// Creates a connection from an already type-erased backend.
    pub fn from_dyn(backend: Box<dyn DynStoreBackend>, registry: SchemaRegistry) -> Self {
        info!(schemas = registry.len(), "opening document mapper connection");

        Self {
            backend,
            registry,
            options: ConnectionOptions::default(),
            index_cache: IndexCache::default(),
        }
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Downcasts the backend to its concrete type.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }

    /// Returns a raw handle for collection `name`.
    ///
    /// # Errors
    ///
    /// [`InvalidName`](crate::error::DocumentStoreError::InvalidName) if any dot-separated
    /// segment of `name` is empty or contains `$` or NUL.
    pub fn collection(&self, name: &str) -> DocumentStoreResult<CollectionHandle<'_>> {
        validate_collection_name(name)?;

        Ok(CollectionHandle::new(name.to_string(), &*self.backend))
    }

    /// Returns a schema-resolving mapper for collection `name`.
    pub fn mapper(&self, name: &str) -> DocumentStoreResult<DocumentMapper<'_>> {
        let mapper = DocumentMapper::new(self.collection(name)?, &self.registry);

        Ok(match self.options.cache_index_checks {
            true => mapper.with_index_cache(&self.index_cache),
            false => mapper,
        })
    }

    /// Returns the typed collection named by `D::collection_name()`.
    pub fn typed<D: Document>(&self) -> TypedCollection<'_, D> {
        CollectionHandle::new(D::collection_name().to_string(), &*self.backend).typed::<D>()
    }

    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        validate_collection_name(name)?;
        self.backend.create_collection(name).await
    }

    /// Drops a collection. Cached index checks for it are forgotten.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await?;
        self.index_cache.forget_collection(name).await;
        debug!(collection = name, "dropped collection");

        Ok(())
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the backend, consuming the connection.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        info!("shutting down document mapper connection");
        self.backend.shutdown_boxed().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend)
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
