//! Main crudlayer crate: schema compilation, document casting and safe projections for REST
//! collections backed by a document store.
//!
//! This crate is the primary entry point for users of the crudlayer framework. It
//! re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the storage backends.
//!
//! # Features
//!
//! - **Declarative collections** - Load collection definitions from JSON and compile them once at startup
//! - **Schema trees** - Per-collection schemas with cast annotations, renderable as JSON Schema
//! - **Document casting** - Stored documents are coerced into their API shape as they stream by
//! - **Safe projections** - Client field lists and raw projections are validated and restricted to ACL columns
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> CrudResult<()> {
//!     let registry = CollectionRegistry::builder()
//!         .with_definition(CollectionDefinition::from_json_str(r#"{
//!             "name": "books",
//!             "endpointBasePath": "/books",
//!             "fields": [
//!                 { "name": "title", "type": "string" },
//!                 { "name": "pages", "type": "number" },
//!                 { "name": "location", "type": "GeoPoint" }
//!             ]
//!         }"#)?)
//!         .build()?;
//!
//!     let store = CrudStore::new(InMemoryStore::builder().build().await?, registry);
//!     store
//!         .insert("books", vec![bson::doc! { "title": "Dune", "pages": "412", "__STATE__": "PUBLIC" }])
//!         .await?;
//!
//!     // Only `title` is readable, `_id` is always returned
//!     let books: Vec<_> = store
//!         .collection("books")?
//!         .find(&FindRequest::new().fields("title,pages").acl_columns("title"))
//!         .await?
//!         .try_collect()
//!         .await?;
//!
//!     println!("Found books: {:?}", books);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Rejected requests
//!
//! Requests that combine `fields` with a raw projection, reference operators outside the
//! allow-list, use `$$` variables or exclude a readable column fail with
//! [`CrudError::InvalidRequest`](error::CrudError::InvalidRequest) before the backend is
//! called. Use [`CrudError::is_request_error`](error::CrudError::is_request_error) to map
//! them to a client error.
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use crudlayer_core::{
    backend, caster, definition, error, grammar, projection, query, reader, registry, schema, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use crudlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use crudlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
