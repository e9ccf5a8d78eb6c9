//! Schema registration and binding.
//!
//! A [`Schema`] is a [`Document`] type registered under a name. The [`SchemaRegistry`]
//! maps those names to [`SchemaConstructor`]s; a constructor binds its schema to a
//! [`CollectionHandle`], producing a [`BoundSchema`].
//!
//! ```ignore
//! let registry = SchemaRegistry::builder()
//!     .register::<BlogPost>()
//!     .register::<Comment>()
//!     .build()?;
//! ```
//!
//! The registry is immutable once built and can be shared freely between tasks.

use bson::Bson;
use serde::{Deserialize, Serialize};
use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt::{self, Debug},
    marker::PhantomData,
    sync::Arc,
};
use tracing::debug;

use crate::{
    collection::{CollectionHandle, TypedCollection, validate_segment},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// An index a schema needs on its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    pub field: String,
    pub unique: bool,
}

impl IndexSpec {
    /// A non-unique ascending index on `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), unique: false }
    }

    /// A unique ascending index on `field`.
    pub fn unique(field: impl Into<String>) -> Self {
        Self { field: field.into(), unique: true }
    }
}

/// A document type that can be registered and resolved by name.
pub trait Schema: Document {
    /// Name the schema is registered and resolved under.
    fn schema_name() -> &'static str;

    /// Indexes that must exist on any collection this schema is bound to.
    fn indexes() -> Vec<IndexSpec> {
        Vec::new()
    }
}

/// Type-erased capability to bind a schema to a collection.
pub trait SchemaConstructor: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn indexes(&self) -> Vec<IndexSpec>;

    /// [`TypeId`] of the Rust type backing this schema.
    fn schema_type(&self) -> TypeId;

    /// Checks that a raw document deserializes into this schema.
    fn validate(&self, document: &Bson) -> DocumentStoreResult<()>;

    /// Binds this schema to `collection`. Does not touch the backend.
    fn bind<'a>(&self, collection: CollectionHandle<'a>) -> BoundSchema<'a>;
}

/// [`SchemaConstructor`] for a concrete [`Schema`] type.
pub struct SchemaType<S: Schema> {
    _marker: PhantomData<fn() -> S>,
}

impl<S: Schema> SchemaType<S> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<S: Schema> Default for SchemaType<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Debug for SchemaType<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaType")
            .field("name", &S::schema_name())
            .field("type", &type_name::<S>())
            .finish()
    }
}

impl<S: Schema> SchemaConstructor for SchemaType<S> {
    fn name(&self) -> &'static str {
        S::schema_name()
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        S::indexes()
    }

    fn schema_type(&self) -> TypeId {
        TypeId::of::<S>()
    }

    fn validate(&self, document: &Bson) -> DocumentStoreResult<()> {
        S::from_bson(document.clone())
            .map(|_| ())
            .map_err(|err| DocumentStoreError::InvalidDocument(format!("{}: {err}", S::schema_name())))
    }

    fn bind<'a>(&self, collection: CollectionHandle<'a>) -> BoundSchema<'a> {
        BoundSchema {
            schema: Arc::new(SchemaType::<S>::new()),
            collection,
        }
    }
}

/// A schema bound to one collection.
///
/// Produced fresh by every resolution; it holds no state beyond the pair it binds.
#[derive(Debug, Clone)]
pub struct BoundSchema<'a> {
    schema: Arc<dyn SchemaConstructor>,
    collection: CollectionHandle<'a>,
}

impl<'a> BoundSchema<'a> {
    pub fn name(&self) -> &'static str {
        self.schema.name()
    }

    pub fn collection(&self) -> &CollectionHandle<'a> {
        &self.collection
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.schema.indexes()
    }

    /// Creates every index this schema declares. Safe to call repeatedly.
    pub async fn ensure_indexes(&self) -> DocumentStoreResult<()> {
        for index in self.schema.indexes() {
            debug!(
                schema = self.name(),
                collection = self.collection.name(),
                field = %index.field,
                unique = index.unique,
                "ensuring index"
            );
            self.collection.ensure_index(&index).await?;
        }

        Ok(())
    }

    /// Checks that a raw document deserializes into this schema.
    pub fn validate(&self, document: &Bson) -> DocumentStoreResult<()> {
        self.schema.validate(document)
    }

    /// Returns a typed view of the bound collection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::SchemaMismatch`] if `S` is not the registered type.
    pub fn typed<S: Schema>(&self) -> DocumentStoreResult<TypedCollection<'a, S>> {
        if self.schema.schema_type() != TypeId::of::<S>() {
            return Err(DocumentStoreError::SchemaMismatch {
                expected: S::schema_name().to_string(),
                found: self.name().to_string(),
            });
        }

        Ok(self.collection.typed::<S>())
    }
}

/// Immutable mapping from schema name to constructor.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<&'static str, Arc<dyn SchemaConstructor>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SchemaConstructor>> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered schema names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Collects schema registrations; duplicates and invalid names surface in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    constructors: Vec<Arc<dyn SchemaConstructor>>,
}

impl SchemaRegistryBuilder {
    pub fn register<S: Schema>(self) -> Self {
        self.register_constructor(Arc::new(SchemaType::<S>::new()))
    }

    pub fn register_constructor(mut self, constructor: Arc<dyn SchemaConstructor>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidName`] if a schema name is not a valid name segment
    /// - [`DocumentStoreError::DuplicateSchema`] if two schemas share a name
    pub fn build(self) -> DocumentStoreResult<SchemaRegistry> {
        let mut schemas = HashMap::with_capacity(self.constructors.len());

        for constructor in self.constructors {
            let name = constructor.name();
            validate_segment(name)?;

            if schemas.insert(name, constructor).is_some() {
                return Err(DocumentStoreError::DuplicateSchema(name.to_string()));
            }
        }

        Ok(SchemaRegistry { schemas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Post {
        id: i32,
        slug: String,
    }

    impl Document for Post {
        fn primary_key(&self) -> Bson {
            Bson::Int32(self.id)
        }

        fn collection_name() -> &'static str {
            "posts"
        }
    }

    impl Schema for Post {
        fn schema_name() -> &'static str {
            "Post"
        }

        fn indexes() -> Vec<IndexSpec> {
            vec![IndexSpec::unique("slug")]
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Draft {
        id: i32,
    }

    impl Document for Draft {
        fn primary_key(&self) -> Bson {
            Bson::Int32(self.id)
        }

        fn collection_name() -> &'static str {
            "drafts"
        }
    }

    impl Schema for Draft {
        fn schema_name() -> &'static str {
            "Post"
        }
    }

    #[test]
    fn registry_resolves_registered_names() {
        let registry = SchemaRegistry::builder().register::<Post>().build().unwrap();

        assert!(registry.contains("Post"));
        assert!(!registry.contains("Comment"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("Post").unwrap().indexes(),
            vec![IndexSpec::unique("slug")]
        );
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let result = SchemaRegistry::builder()
            .register::<Post>()
            .register::<Draft>()
            .build();

        assert!(matches!(result, Err(DocumentStoreError::DuplicateSchema(name)) if name == "Post"));
    }

    #[test]
    fn constructor_validates_documents() {
        let constructor = SchemaType::<Post>::new();

        assert!(constructor.validate(&Bson::Document(doc! { "id": 1, "slug": "hello" })).is_ok());
        assert!(matches!(
            constructor.validate(&Bson::Document(doc! { "id": "one" })),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }
}
