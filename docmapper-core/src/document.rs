//! Core traits for document representation and serialization.
//!
//! Documents are stored as BSON. The primary key of every stored document lives in
//! the [`PRIMARY_KEY`] field, and may be any BSON value usable for equality matching.

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the field holding each document's primary key.
pub const PRIMARY_KEY: &str = "_id";

/// Core trait that all typed documents must implement.
///
/// # Example
///
/// ```ignore
/// use docmapper::document::Document;
/// use bson::Bson;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: i32,
///     pub name: String,
///     pub active: bool,
/// }
///
/// impl Document for User {
///     fn primary_key(&self) -> Bson {
///         Bson::Int32(self.id)
///     }
///
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns this document's primary key.
    ///
    /// The value is written to the [`PRIMARY_KEY`] field when the document is serialized.
    fn primary_key(&self) -> Bson;

    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing serialization utilities for documents.
///
/// Automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage, setting [`PRIMARY_KEY`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the document does not serialize to a map.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a stored BSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        match serialize_to_bson(self)? {
            Bson::Document(mut doc) => {
                doc.insert(PRIMARY_KEY, self.primary_key());
                Ok(Bson::Document(doc))
            }
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a map, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Returns the primary key of a raw stored document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if the value is not a map or has no
/// [`PRIMARY_KEY`] field.
pub fn primary_key_of(document: &Bson) -> DocumentStoreResult<&Bson> {
    as_map(document)?
        .get(PRIMARY_KEY)
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("missing {PRIMARY_KEY} field")))
}

/// Borrows a raw stored document as a BSON map.
pub fn as_map(document: &Bson) -> DocumentStoreResult<&BsonDocument> {
    document
        .as_document()
        .ok_or_else(|| DocumentStoreError::InvalidDocument("expected document".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: i64,
        body: String,
    }

    impl Document for Note {
        fn primary_key(&self) -> Bson {
            Bson::Int64(self.id)
        }

        fn collection_name() -> &'static str {
            "notes"
        }
    }

    #[test]
    fn to_bson_injects_primary_key() {
        let note = Note { id: 7, body: "hello".into() };
        let bson = note.to_bson().unwrap();

        assert_eq!(primary_key_of(&bson).unwrap(), &Bson::Int64(7));
        assert_eq!(Note::from_bson(bson).unwrap(), note);
    }

    #[test]
    fn primary_key_of_rejects_missing_field() {
        let bson = Bson::Document(doc! { "body": "orphan" });

        assert!(matches!(
            primary_key_of(&bson),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }
}
