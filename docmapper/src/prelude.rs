//! Commonly used types and traits.
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```

pub use docmapper_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::{CollectionHandle, TypedCollection},
    connection::{Connection, ConnectionOptions},
    document::{Document, DocumentExt, PRIMARY_KEY},
    error::{DocumentStoreError, DocumentStoreResult},
    mapper::{DocumentMapper, Resolved},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    schema::{BoundSchema, IndexSpec, Schema, SchemaConstructor, SchemaRegistry, SchemaRegistryBuilder},
};
