//! Storage backend abstraction for the read pipeline.
//!
//! This module defines the traits that abstract over the document store holding the
//! collections' data, allowing the pipeline to run against different backends
//! (in-memory for development and tests, MongoDB in production).
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides an async interface for inserting documents and
//! streaming back the documents that match a filter, narrowed by a [`Projection`].
//! Filters and projections reach the backend already validated and restricted by the
//! projection resolver and query validator; backends forward them as they are.
//! Implementations are required to be thread-safe (`Send + Sync`).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Example
//!
//! ```ignore
//! use crudlayer_core::backend::StoreBackend;
//! use bson::doc;
//! use futures::TryStreamExt;
//!
//! backend.insert_documents(vec![doc! { "title": "Dune" }], "books").await?;
//!
//! let books: Vec<_> = backend
//!     .find_documents("books", doc! { "title": "Dune" }, &projection)
//!     .await?
//!     .try_collect()
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{error::CrudResult, projection::Projection};

/// A stream of stored documents, as yielded by [`StoreBackend::find_documents`].
pub type DocumentStream = BoxStream<'static, CrudResult<Document>>;

/// Abstract interface for document storage backends.
///
/// # Error Handling
///
/// Operations return [`CrudResult<T>`](crate::error::CrudResult). Failures of the
/// underlying store are reported as [`CrudError::Backend`](crate::error::CrudError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts documents into a collection, creating the collection if needed.
    ///
    /// # Arguments
    ///
    /// * `documents` - The documents to insert, bookkeeping fields included
    /// * `collection` - The name of the collection to insert into
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> CrudResult<()>;

    /// Streams the documents of a collection matching `filter`, narrowed by `projection`.
    ///
    /// A missing collection yields an empty stream. Errors raised while the stream is
    /// consumed are yielded as items.
    ///
    /// # Arguments
    ///
    /// * `collection` - The name of the collection to read
    /// * `filter` - A filter document in the store's query language
    /// * `projection` - The resolved projection
    async fn find_documents(
        &self,
        collection: &str,
        filter: Document,
        projection: &Projection,
    ) -> CrudResult<DocumentStream>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> CrudResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> CrudResult<()> {
        (*self)
            .insert_documents(documents, collection)
            .await
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: Document,
        projection: &Projection,
    ) -> CrudResult<DocumentStream> {
        (*self)
            .find_documents(collection, filter, projection)
            .await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> CrudResult<Self::Backend>;
}
