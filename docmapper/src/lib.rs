//! Typed document mapping over pluggable document stores.
//!
//! This crate is the entry point of the docmapper project. It re-exports the core
//! types and gives access to the storage backends.
//!
//! # Features
//!
//! - **Schema registry** - register document types by name and declare their indexes
//! - **Name resolution** - a mapper turns a name into a bound schema or a nested collection
//! - **Single-result queries** - `one` returns nothing, the match, or a `MultipleResults` error
//! - **Random sampling** - `random_one` draws a uniformly chosen document
//! - **Multiple backends** - in-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//! use bson::Bson;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: i32,
//!     pub email: String,
//! }
//!
//! impl Document for User {
//!     fn primary_key(&self) -> Bson { Bson::Int32(self.id) }
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! impl Schema for User {
//!     fn schema_name() -> &'static str { "User" }
//!     fn indexes() -> Vec<IndexSpec> { vec![IndexSpec::unique("email")] }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let registry = SchemaRegistry::builder().register::<User>().build()?;
//!     let connection = Connection::new(InMemoryStore::builder().build().await?, registry);
//!
//!     // "User" is registered: the schema is bound to "app" and its unique index created.
//!     let users = connection
//!         .mapper("app")?
//!         .resolve("User")
//!         .await?
//!         .into_schema()
//!         .ok_or_else(|| DocumentStoreError::InvalidName("User".into()))?
//!         .typed::<User>()?;
//!
//!     users.insert(vec![User { id: 1, email: "alice@example.com".into() }]).await?;
//!
//!     let alice = users.one(Filter::eq("email", "alice@example.com")).await?;
//!     let anyone = users.random_one().await?;
//!
//!     // Unregistered names navigate into nested collections: "app.audit".
//!     let audit = connection.mapper("app")?.sub_collection("audit")?;
//!     assert_eq!(audit.name(), "app.audit");
//!
//!     connection.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - in-process storage for development and testing
//! - `mongodb` - MongoDB storage (requires the `mongodb` feature)

pub mod prelude;

pub use docmapper_core::{backend, collection, connection, document, error, mapper, query, schema};

pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use docmapper_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend.
///
/// Only available with the `mongodb` feature.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmapper_mongodb::{MongoDbConfig, MongoDbConfigBuilder, MongoDbStore, MongoDbStoreBuilder};
}
