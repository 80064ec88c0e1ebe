//! Main store interface tying compiled collections to a backend.
//!
//! # Example
//!
//! ```ignore
//! use crudlayer_core::store::CrudStore;
//!
//! let store = CrudStore::new(backend, registry);
//! let books = store.collection("books")?;
//! let stream = books.find(&FindRequest::new().states("PUBLIC,DRAFT")).await?;
//! ```

use bson::Document;
use std::sync::Arc;

use crate::{
    backend::StoreBackend,
    error::CrudResult,
    reader::CollectionReader,
    registry::CollectionRegistry,
};

/// A backend together with the registry of collections it serves.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct CrudStore<B: StoreBackend> {
    backend: B,
    registry: Arc<CollectionRegistry>,
}

impl<B: StoreBackend> CrudStore<B> {
    /// Creates a new store with the given backend and registry.
    pub fn new(backend: B, registry: impl Into<Arc<CollectionRegistry>>) -> Self {
        Self {
            backend,
            registry: registry.into(),
        }
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a reader for the named collection.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::CollectionNotFound`](crate::error::CrudError::CollectionNotFound)
    /// if the collection is not registered.
    pub fn collection(&self, name: &str) -> CrudResult<CollectionReader<'_, B>> {
        Ok(CollectionReader::new(self.registry.get(name)?, &self.backend))
    }

    /// Inserts stored documents into a registered collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not registered or the backend fails.
    pub async fn insert(&self, collection: &str, documents: Vec<Document>) -> CrudResult<()> {
        let collection = self.registry.get(collection)?;
        tracing::debug!(collection = collection.name(), count = documents.len(), "inserting documents");

        self.backend
            .insert_documents(documents, collection.name())
            .await
    }

    /// Shuts down the store and its backend.
    pub async fn shutdown(self) -> CrudResult<()> {
        self.backend.shutdown().await
    }
}
