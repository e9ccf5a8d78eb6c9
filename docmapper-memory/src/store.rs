//! In-memory storage implementation.
//!
//! Collections keep documents in insertion order, which is the natural order
//! used by unsorted queries and by offset-based random sampling.

use async_trait::async_trait;
use bson::Bson;
use indexmap::IndexMap;
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{as_map, primary_key_of},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
    schema::IndexSpec,
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

#[derive(Debug, Default)]
struct CollectionState {
    /// Rendered primary key -> document, in insertion order.
    documents: IndexMap<String, Bson>,
    indexes: Vec<IndexSpec>,
}

impl CollectionState {
    fn matching(&self, filter: Option<&Expr>) -> DocumentStoreResult<Vec<&Bson>> {
        let mut matched = Vec::new();

        for document in self.documents.values() {
            let keep = match filter {
                Some(expr) => DocumentEvaluator::matches(document, expr)?,
                None => true,
            };

            if keep {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    /// Rejects `document` if it shares a unique-indexed value with a document under another key.
    ///
    /// Documents without the indexed field are not constrained.
    fn check_unique(&self, collection: &str, key: &str, document: &Bson) -> DocumentStoreResult<()> {
        let fields = as_map(document)?;

        for index in self.indexes.iter().filter(|index| index.unique) {
            let Some(value) = lookup(fields, &index.field) else {
                continue;
            };
            let candidate = Comparable::from(value);

            for (other_key, other) in &self.documents {
                if other_key == key {
                    continue;
                }

                let clash = other
                    .as_document()
                    .and_then(|other| lookup(other, &index.field))
                    .is_some_and(|other| Comparable::from(other) == candidate);

                if clash {
                    return Err(DocumentStoreError::DuplicateKey {
                        collection: collection.to_string(),
                        field: index.field.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

type StoreMap = HashMap<String, CollectionState>;

fn render_key(id: &Bson) -> String {
    id.to_string()
}

fn sort_key<'a>(document: &'a Bson, field: &str) -> Comparable<'a> {
    document
        .as_document()
        .and_then(|fields| lookup(fields, field))
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

/// Thread-safe in-memory document storage backend.
///
/// Cloning shares the underlying data. Queries scan the whole collection; indexes
/// are recorded and enforce uniqueness but do not speed anything up.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper_core::backend::StoreBackend;
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::new();
/// store.insert_documents(vec![Bson::Document(doc! { "_id": 1, "name": "Alice" })], "users").await?;
/// assert_eq!(store.get_documents(vec![Bson::Int32(1)], "users").await?.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        for document in documents {
            let key = render_key(primary_key_of(&document)?);

            if state.documents.contains_key(&key) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }

            state.check_unique(collection, &key, &document)?;
            state.documents.insert(key, document);
        }

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store
            .get_mut(collection)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(collection.to_string()))?;

        for document in documents {
            let key = render_key(primary_key_of(&document)?);

            if !state.documents.contains_key(&key) {
                return Err(DocumentStoreError::DocumentNotFound(key, collection.to_string()));
            }

            state.check_unique(collection, &key, &document)?;
            state.documents.insert(key, document);
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if let Some(state) = store.get_mut(collection) {
            for id in ids {
                state.documents.shift_remove(&render_key(&id));
            }
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| state.documents.get(&render_key(id)))
            .cloned()
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = state.matching(query.filter.as_ref())?;

        if let Some(sort) = &query.sort {
            // Stable: ties keep insertion order.
            matched.sort_by(|a, b| {
                let ordering = sort_key(a, &sort.field).total_cmp(&sort_key(b, &sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        debug!(collection, matched = matched.len(), "in-memory query");

        Ok(matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        Ok(match store.get(collection) {
            Some(state) => state.matching(filter.as_ref())?.len() as u64,
            None => 0,
        })
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if self.store.write().await.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names: Vec<String> = self.store.read().await.keys().cloned().collect();
        names.sort();

        Ok(names)
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        if let Some(existing) = state.indexes.iter().find(|existing| existing.field == index.field) {
            if existing == index {
                return Ok(());
            }

            return Err(DocumentStoreError::Backend(format!(
                "index on {}.{} already exists with different options",
                collection, index.field
            )));
        }

        if index.unique {
            let mut seen: Vec<&Bson> = Vec::new();

            for value in state
                .documents
                .values()
                .filter_map(|document| document.as_document())
                .filter_map(|fields| lookup(fields, &index.field))
            {
                if seen.iter().any(|other| Comparable::from(*other) == Comparable::from(value)) {
                    return Err(DocumentStoreError::DuplicateKey {
                        collection: collection.to_string(),
                        field: index.field.clone(),
                        value: value.to_string(),
                    });
                }
                seen.push(value);
            }
        }

        debug!(collection, field = %index.field, unique = index.unique, "created index");
        state.indexes.push(index.clone());

        Ok(())
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store
            .get_mut(collection)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(collection.to_string()))?;

        let before = state.indexes.len();
        state.indexes.retain(|index| index.field != field);

        if state.indexes.len() == before {
            return Err(DocumentStoreError::Backend(format!(
                "index on {collection}.{field} not found"
            )));
        }

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .map(|state| state.indexes.clone())
            .unwrap_or_default())
    }
}

/// Builder for [`InMemoryStore`]. Takes no options.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        info!("initialized in-memory document store");
        Ok(InMemoryStore::new())
    }
}
