//! MongoDB backend for docmapper.
//!
//! Enable it through the `mongodb` feature of the facade crate:
//!
//! ```toml
//! [dependencies]
//! docmapper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Filters are translated into MongoDB filter documents, random sampling uses the
//! `$sample` aggregation stage, and schema indexes become single-field ascending
//! MongoDB indexes. Field names containing `.`, `$` or NUL are escaped on write and
//! restored on read.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{backend::StoreBackendBuilder, mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "blog")
//!         .build()
//!         .await?;
//!
//!     let config = MongoDbConfig::builder().database("blog").max_pool_size(20).build()?;
//!     let pooled = MongoDbStoreBuilder::from_config(config).build().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_mongodb;

pub mod config;
pub mod query;
pub mod sanitizer;
pub mod store;

pub use config::{MongoDbConfig, MongoDbConfigBuilder};
pub use store::{MongoDbStore, MongoDbStoreBuilder};
