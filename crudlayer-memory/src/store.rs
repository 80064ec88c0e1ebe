//! In-memory storage implementation.
//!
//! Documents are kept per collection in insertion order behind an async-aware
//! read-write lock. Reads scan the whole collection.

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::stream::{self, StreamExt};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};

use crudlayer_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    definition::ID_FIELD,
    error::{CrudError, CrudResult},
    projection::Projection,
    query::Expr,
};

use crate::evaluator::{DocumentEvaluator, apply_projection};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be shared across async tasks. Clones share the same underlying data.
///
/// Filters support `$and`, `$or`, `$nor`, `$not`, `$exists` and the comparison
/// operators `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in` and `$nin`. Projections
/// support inclusion and exclusion markers. Anything else is rejected with
/// [`CrudError::Backend`].
///
/// # Example
///
/// ```ignore
/// use crudlayer_memory::InMemoryStore;
/// use crudlayer_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_documents(vec![doc! { "title": "Dune" }], "books").await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`, optionally seeded with
    /// documents.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of documents stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    /// Inserts the batch atomically: a duplicate `_id`, against stored documents or within
    /// the batch, rejects the whole batch.
    async fn insert_documents(&self, mut documents: Vec<Document>, collection: &str) -> CrudResult<()> {
        let mut store = self.store.write().await;
        let stored = store
            .entry(collection.to_string())
            .or_default();

        for document in &mut documents {
            if !document.contains_key(ID_FIELD) {
                document.insert(ID_FIELD, ObjectId::new());
            }
        }

        for (index, document) in documents.iter().enumerate() {
            let id = document.get(ID_FIELD);
            if stored.iter().chain(&documents[..index]).any(|d| d.get(ID_FIELD) == id) {
                return Err(CrudError::Backend(format!(
                    "duplicate key {} in collection {collection}",
                    id.map(ToString::to_string).unwrap_or_default(),
                )));
            }
        }

        stored.extend(documents);

        tracing::debug!(collection, total = stored.len(), "inserted documents");
        Ok(())
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: Document,
        projection: &Projection,
    ) -> CrudResult<DocumentStream> {
        let expr = Expr::from_filter(&filter)?;
        let store = self.store.read().await;

        let matched = match store.get(collection) {
            Some(documents) => DocumentEvaluator::filter_documents(documents, &expr)?,
            None => Vec::new(),
        };
        tracing::debug!(collection, matched = matched.len(), "found documents");

        let projected = matched
            .iter()
            .map(|document| apply_projection(document, projection))
            .collect::<Vec<_>>();

        Ok(stream::iter(projected).boxed())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use crudlayer_memory::InMemoryStore;
/// use crudlayer_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_documents("books", vec![doc! { "title": "Dune" }])
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Seeds `collection` with `documents` when the store is built.
    pub fn with_documents(mut self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seed.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds a new [`InMemoryStore`] and inserts the seeded documents.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Backend`] if two seeded documents share an `_id`.
    async fn build(self) -> CrudResult<Self::Backend> {
        let store = InMemoryStore::new();
        for (collection, documents) in self.seed {
            store.insert_documents(documents, &collection).await?;
        }

        Ok(store)
    }
}
