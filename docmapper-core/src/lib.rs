//! A typed document-mapping layer over pluggable document stores.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Document traits** ([`document`]) - typed documents and their BSON/JSON forms
//! - **Store backend abstraction** ([`backend`]) - the seam to the document store driver
//! - **Filter criteria** ([`query`]) - expressions forwarded to the backend
//! - **Collection handles** ([`collection`]) - raw and typed access to a named collection,
//!   including the `one` and `random_one` helpers
//! - **Schemas** ([`schema`]) - named schema registration, binding and index declaration
//! - **Mapper** ([`mapper`]) - resolves a name to a bound schema or a nested collection
//! - **Connection** ([`connection`]) - owns the backend and the schema registry
//! - **Error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
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
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod backend;
pub mod collection;
pub mod connection;
pub mod document;
pub mod error;
pub mod mapper;
pub mod query;
pub mod schema;
