//! In-memory document storage backend for docmapper.
//!
//! A thread-safe [`StoreBackend`](docmapper_core::backend::StoreBackend) built on async-aware
//! read-write locks, meant for development, tests and small deployments.
//!
//! - Documents are kept per collection in insertion order
//! - Filters, sorting, offsets and limits are evaluated in process
//! - Unique indexes are enforced on every write
//! - Random sampling uses the default offset strategy over insertion order
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let connection = Connection::new(backend, SchemaRegistry::default());
//!
//!     let users = connection.mapper("users")?;
//!     users.collection().insert(vec![bson::bson!({ "_id": 1, "name": "Alice" })]).await?;
//!
//!     assert!(users.get_by_primary_key(1).await?.is_some());
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
