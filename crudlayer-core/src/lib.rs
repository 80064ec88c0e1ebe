//! Schema compilation, document casting and safe projections for REST collections backed by a
//! document store.
//!
//! This crate is the core of the crudlayer project and provides:
//!
//! - **Collection definitions** ([`definition`]) - Declarative, serde-loadable collection and field definitions
//! - **Schema compiler** ([`schema`]) - Compiles definitions into schema trees with cast annotations
//! - **Document caster** ([`caster`]) - Best-effort casting of stored documents into their API shape
//! - **Operator grammar** ([`grammar`]) - Allow-list validation of client-supplied `$` tokens
//! - **Projection resolver** ([`projection`]) - Combines client fields, raw projections and ACL columns
//! - **Query filters** ([`query`]) - Query fragment validation and soft-delete state filters
//! - **Registry** ([`registry`]) - Collections compiled once at startup
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Read pipeline** ([`reader`], [`store`]) - Projection, filter, backend call and casting per request
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use crudlayer_core::{definition::CollectionDefinition, registry::CollectionRegistry};
//!
//! let registry = CollectionRegistry::builder()
//!     .with_definition(CollectionDefinition::from_json_str(r#"{
//!         "name": "books",
//!         "endpointBasePath": "/books",
//!         "fields": [
//!             { "name": "title", "type": "string", "required": true },
//!             { "name": "authorId", "type": "ObjectId" }
//!         ]
//!     }"#)?)
//!     .build()?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_core;

pub mod backend;
pub mod caster;
pub mod definition;
pub mod error;
pub mod grammar;
mod json;
pub mod projection;
pub mod query;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod store;
