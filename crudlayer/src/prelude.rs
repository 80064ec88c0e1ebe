//! Convenient re-exports of commonly used types from crudlayer.
//!
//! ```ignore
//! use crudlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Collection definitions and the registry
//! - Store backends and builders
//! - The read pipeline and its request type
//! - Projection and query helpers
//! - Error types

pub use crudlayer_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    caster::DocumentCaster,
    definition::{CollectionDefinition, DocumentState, FieldDefinition, FieldKind, NestedSchema},
    error::{CrudError, CrudResult},
    projection::{AclColumns, Projection, ProjectionRequest, ProjectionResolver, resolve_projection},
    query::{StateFilter, build_filter, parse_query_filter},
    reader::{CollectionReader, FindRequest},
    registry::{CollectionRegistry, CompiledCollection},
    schema::{SchemaTree, compile, compile_collection},
    store::CrudStore,
};
