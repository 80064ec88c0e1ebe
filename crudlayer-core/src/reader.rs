//! The per-request read pipeline.
//!
//! A [`CollectionReader`] binds one compiled collection to a backend. For every
//! [`FindRequest`] it resolves the caller's projection, validates the query fragment,
//! restricts the read to the requested soft-delete states, asks the backend for a stream
//! of documents and casts each document as it goes by.
//!
//! # Example
//!
//! ```ignore
//! use futures::TryStreamExt;
//!
//! let reader = store.collection("books")?;
//! let books: Vec<_> = reader
//!     .find(&FindRequest::new().fields("title,author").acl_columns("title"))
//!     .await?
//!     .try_collect()
//!     .await?;
//! ```

use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::{
    backend::{DocumentStream, StoreBackend},
    error::CrudResult,
    projection::ProjectionRequest,
    query::{StateFilter, build_filter},
    registry::CompiledCollection,
};

/// Raw parameters of one read, as received from the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindRequest<'a> {
    /// Query fragment (`_q`).
    pub query: Option<&'a str>,
    /// Comma-separated client field list (`_fields`).
    pub fields: Option<&'a str>,
    /// Raw projection (`_rawProjection`).
    pub raw_projection: Option<&'a str>,
    /// The caller's comma-separated ACL columns.
    pub acl_columns: Option<&'a str>,
    /// Comma-separated soft-delete states (`_st`).
    pub states: Option<&'a str>,
}

impl<'a> FindRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: &'a str) -> Self {
        self.query = Some(query);
        self
    }

    pub fn fields(mut self, fields: &'a str) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn raw_projection(mut self, raw_projection: &'a str) -> Self {
        self.raw_projection = Some(raw_projection);
        self
    }

    pub fn acl_columns(mut self, acl_columns: &'a str) -> Self {
        self.acl_columns = Some(acl_columns);
        self
    }

    pub fn states(mut self, states: &'a str) -> Self {
        self.states = Some(states);
        self
    }

    fn projection_request(&self) -> ProjectionRequest<'a> {
        ProjectionRequest {
            fields: self.fields,
            acl_columns: self.acl_columns,
            raw_projection: self.raw_projection,
        }
    }
}

/// Reads one compiled collection through a backend.
#[derive(Debug)]
pub struct CollectionReader<'a, B: StoreBackend> {
    collection: Arc<CompiledCollection>,
    backend: &'a B,
}

impl<'a, B: StoreBackend> CollectionReader<'a, B> {
    pub fn new(collection: Arc<CompiledCollection>, backend: &'a B) -> Self {
        Self { collection, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &CompiledCollection {
        &self.collection
    }

    /// Streams the cast documents matching `request`.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidRequest`](crate::error::CrudError::InvalidRequest) if
    /// the projection, query fragment or state list is rejected, before the backend is
    /// called. Backend failures are returned as they are.
    pub async fn find(&self, request: &FindRequest<'_>) -> CrudResult<DocumentStream> {
        let projection = self
            .collection
            .resolve_projection(&request.projection_request())?;
        let query = request
            .query
            .filter(|query| !query.trim().is_empty())
            .map(|query| self.collection.parse_query(query))
            .transpose()?;
        let states = StateFilter::parse(request.states)?;
        let filter = build_filter(query, &states);

        tracing::debug!(
            collection = self.name(),
            filter = ?filter,
            projection = ?projection.as_document(),
            "finding documents",
        );

        let collection = Arc::clone(&self.collection);
        Ok(self
            .backend
            .find_documents(self.name(), filter, &projection)
            .await?
            .map_ok(move |document| collection.cast(document))
            .boxed())
    }
}
