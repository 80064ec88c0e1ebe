//! MongoDB backend implementation for crudlayer.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Filters
//! and projections are forwarded to the server as they are: they have already been
//! validated against the operator grammar and restricted to the caller's readable columns.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! crudlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Streaming reads** - Cursors are exposed as document streams
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//! - **Indexing** - Creates the indexes declared by a collection definition
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017", "library")
//!         .build()
//!         .await?;
//!     for collection in registry.names() {
//!         backend.create_indexes(registry.get(collection)?.definition()).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
