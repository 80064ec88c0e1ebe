//! In-memory document storage backend for crudlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filter evaluation** - Logical, comparison and `$exists` operators over dotted paths
//! - **Projections** - Inclusion and exclusion projections, with `_id` kept by default
//!
//! # Quick Start
//!
//! ```ignore
//! use crudlayer::{memory::InMemoryStore, prelude::*};
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .with_documents("books", vec![bson::doc! { "title": "Dune", "__STATE__": "PUBLIC" }])
//!         .build()
//!         .await?;
//!     let store = CrudStore::new(backend, registry);
//!
//!     let books: Vec<_> = store
//!         .collection("books")?
//!         .find(&FindRequest::new())
//!         .await?
//!         .try_collect()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
