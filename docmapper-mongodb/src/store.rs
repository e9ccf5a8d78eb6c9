use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::Error as MongoError,
    options::{FindOptions, IndexOptions},
};
use tracing::{debug, info};

use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{PRIMARY_KEY, as_map, primary_key_of},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
    schema::IndexSpec,
};

use crate::{config::MongoDbConfig, query::MongoQueryTranslator, sanitizer::KeySanitizer};

fn backend_error(error: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(error.to_string())
}

/// Name given to the single-field ascending index on `field`.
fn index_name(field: &str) -> String {
    format!("{field}_1")
}

/// A [`StoreBackend`] backed by a MongoDB database.
///
/// Collection names map one-to-one onto MongoDB collections, so a nested collection
/// such as `users.name` is stored exactly under that name. Primary keys live in `_id`.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(collection_name)
    }

    fn prepare_document(&self, document: &Bson) -> DocumentStoreResult<Document> {
        primary_key_of(document)?;

        Ok(KeySanitizer::sanitize_document(as_map(document)?))
    }

    fn restore_document(&self, document: &Document) -> Bson {
        Bson::Document(KeySanitizer::restore_document(document))
    }

    async fn collect_documents(&self, cursor: mongodb::Cursor<Document>) -> DocumentStoreResult<Vec<Bson>> {
        Ok(cursor
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .iter()
            .map(|doc| self.restore_document(doc))
            .collect())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        self.get_collection(collection)
            .insert_many(
                documents
                    .iter()
                    .map(|doc| self.prepare_document(doc))
                    .collect::<DocumentStoreResult<Vec<Document>>>()?,
            )
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        let target = self.get_collection(collection);

        for document in &documents {
            let id = primary_key_of(document)?.clone();
            let result = target
                .replace_one(doc! { PRIMARY_KEY: id.clone() }, self.prepare_document(document)?)
                .await
                .map_err(backend_error)?;

            if result.matched_count == 0 {
                return Err(DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()));
            }
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! { PRIMARY_KEY: { "$in": ids } })
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Bson>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let cursor = self
            .get_collection(collection)
            .find(doc! { PRIMARY_KEY: { "$in": ids } })
            .await
            .map_err(backend_error)?;

        self.collect_documents(cursor).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            });
        }

        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;
        debug!(collection, %filter, "mongodb find");

        let cursor = self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?;

        self.collect_documents(cursor).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter.as_ref())?)
            .await
            .map_err(backend_error)
    }

    /// Samples with the server-side `$sample` stage.
    async fn random_document(&self, collection: &str) -> DocumentStoreResult<Option<Bson>> {
        let mut cursor = self
            .get_collection(collection)
            .aggregate(vec![doc! { "$sample": { "size": 1 } }])
            .await
            .map_err(backend_error)?;

        Ok(cursor
            .try_next()
            .await
            .map_err(backend_error)?
            .map(|doc| self.restore_document(&doc)))
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let database = self.client.database(&self.database);

        if database
            .list_collection_names()
            .await
            .map_err(backend_error)?
            .iter()
            .any(|existing| existing == name)
        {
            return Ok(());
        }

        database.create_collection(name).await.map_err(backend_error)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name).drop().await.map_err(backend_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)?;
        names.sort();

        Ok(names)
    }

    /// Unique indexes are sparse: documents without the field are not constrained.
    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { index.field.as_str(): 1 })
                    .options(
                        IndexOptions::builder()
                            .name(index_name(&index.field))
                            .unique(index.unique)
                            .sparse(index.unique)
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(backend_error)?;

        debug!(collection, field = %index.field, unique = index.unique, "ensured index");

        Ok(())
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .drop_index(index_name(field))
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        let models = self
            .get_collection(collection)
            .list_indexes()
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(backend_error)?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let field = model.keys.keys().next()?.clone();
                if field == PRIMARY_KEY {
                    return None;
                }

                let unique = model.options.and_then(|options| options.unique).unwrap_or(false);
                Some(IndexSpec { field, unique })
            })
            .collect())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;
        info!("mongodb store shut down");

        Ok(())
    }
}

/// Builds a [`MongoDbStore`] from a connection string or a full [`MongoDbConfig`].
pub struct MongoDbStoreBuilder {
    config: MongoDbConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self::from_config(MongoDbConfig::from_uri(dsn, database))
    }

    pub fn from_config(config: MongoDbConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        if self.config.database.is_empty() {
            return Err(DocumentStoreError::Initialization("database name is required".to_string()));
        }

        let client = Client::with_options(self.config.to_client_options().await?)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.config.database, "connected mongodb store");

        Ok(MongoDbStore::new(client, self.config.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn index_names_follow_server_convention() {
        assert_eq!(index_name("email"), "email_1");
        assert_eq!(index_name("address.city"), "address.city_1");
    }
}
