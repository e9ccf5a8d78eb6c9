//! Error types and result types for document mapping operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`].
//! Errors raised by a storage backend are surfaced unchanged; the mapping layer
//! only adds the variants it is responsible for ([`DocumentStoreError::MultipleResults`],
//! [`DocumentStoreError::EmptyCollection`], and the registry/name checks).

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when mapping documents onto a store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A query expected to match at most one document matched several.
    ///
    /// Carries the number of matching documents so the caller can tighten the filter.
    #[error("{count} results found in collection {collection}, expected at most one")]
    MultipleResults {
        /// Number of documents the filter matched.
        count: u64,
        /// Collection the query ran against.
        collection: String,
    },
    /// A random document was requested from a collection holding no documents.
    #[error("Cannot sample from empty collection {0}")]
    EmptyCollection(String),
    /// A collection or schema name segment is empty or contains reserved characters.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    /// Two schemas were registered under the same name.
    #[error("Schema {0} is already registered")]
    DuplicateSchema(String),
    /// A bound schema was accessed through a Rust type other than the one registered.
    #[error("Schema {expected} was requested but {found} is bound")]
    SchemaMismatch {
        /// Name of the schema the caller asked for.
        expected: String,
        /// Name of the schema actually bound.
        found: String,
    },
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given primary key already exists in the collection.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// A write would violate a unique index.
    #[error("Duplicate value {value} for unique field {field} in collection {collection}")]
    DuplicateKey {
        /// The collection holding the unique index.
        collection: String,
        /// The indexed field.
        field: String,
        /// The offending value, rendered for display.
        value: String,
    },
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document mapping operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn multiple_results_reports_count() {
        let err = DocumentStoreError::MultipleResults {
            count: 2,
            collection: "users".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "2 results found in collection users, expected at most one"
        );
    }

    #[test]
    fn empty_collection_names_collection() {
        let err = DocumentStoreError::EmptyCollection("logs".to_string());

        assert_eq!(err.to_string(), "Cannot sample from empty collection logs");
    }
}
