use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{ClientOptions, IndexOptions},
};
use crudlayer_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    definition::{CollectionDefinition, Index, IndexKind},
    error::{CrudError, CrudResult},
    projection::Projection,
};


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

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    /// Creates the indexes declared by a collection definition.
    pub async fn create_indexes(&self, definition: &CollectionDefinition) -> CrudResult<()> {
        if definition.indexes.is_empty() {
            return Ok(());
        }

        self.get_collection(&definition.name)
            .create_indexes(definition.indexes.iter().map(index_model))
            .await
            .map_err(|e| CrudError::Backend(e.to_string()))?;
        tracing::debug!(collection = %definition.name, count = definition.indexes.len(), "created indexes");

        Ok(())
    }

    async fn shutdown(self) -> CrudResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

fn index_model(index: &Index) -> IndexModel {
    let keys = index
        .fields
        .iter()
        .map(|field| {
            let key = match index.kind {
                IndexKind::Normal => Bson::Int32(field.order.unwrap_or(1)),
                IndexKind::Geo => Bson::String("2dsphere".to_string()),
                IndexKind::Hash => Bson::String("hashed".to_string()),
                IndexKind::Text => Bson::String("text".to_string()),
            };
            (field.name.clone(), key)
        })
        .collect::<Document>();

    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
            .name(index.name.clone())
            .unique(index.unique)
            .build()
        )
        .build()
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> CrudResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| CrudError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: Document,
        projection: &Projection,
    ) -> CrudResult<DocumentStream> {
        tracing::debug!(collection, filter = ?filter, "querying mongodb");

        Ok(
            self.get_collection(collection)
                .find(filter)
                .projection(projection.as_document().clone())
                .await
                .map_err(|e| CrudError::Backend(e.to_string()))?
                .map_err(|e| CrudError::Backend(e.to_string()))
                .boxed()
        )
    }

    async fn shutdown(self) -> CrudResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> CrudResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| CrudError::Initialization(e.to_string()))?,
            )
            .map_err(|e| CrudError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
