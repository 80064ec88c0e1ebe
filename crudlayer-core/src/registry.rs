//! Compiled collections and their registry.
//!
//! Every [`CollectionDefinition`] is compiled exactly once at startup into a
//! [`CompiledCollection`]: its schema tree, its caster and its projection resolver. The
//! [`CollectionRegistry`] is built through [`CollectionRegistryBuilder`] and is read-only
//! afterwards, so it can be shared freely between request handlers.
//!
//! # Example
//!
//! ```ignore
//! use crudlayer_core::registry::CollectionRegistry;
//!
//! let registry = CollectionRegistry::builder()
//!     .with_definition(CollectionDefinition::from_json_str(BOOKS)?)
//!     .build()?;
//!
//! let books = registry.get("books")?;
//! let projection = books.resolve_projection(&ProjectionRequest::new().fields("title"))?;
//! ```

use bson::Document;
use std::{collections::HashMap, sync::Arc};

use crate::{
    caster::DocumentCaster,
    definition::CollectionDefinition,
    error::{CrudError, CrudResult},
    projection::{Projection, ProjectionRequest, ProjectionResolver},
    query,
    schema::{self, SchemaTree},
};

/// A collection definition together with everything compiled from it.
#[derive(Debug, Clone)]
pub struct CompiledCollection {
    definition: CollectionDefinition,
    schema: SchemaTree,
    caster: DocumentCaster,
    resolver: ProjectionResolver,
}

impl CompiledCollection {
    /// Compiles a definition.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Definition`] if the definition does not compile.
    pub fn compile(definition: CollectionDefinition) -> CrudResult<Self> {
        let schema = schema::compile_collection(&definition)?;
        let caster = DocumentCaster::new(&schema)?;
        let resolver = ProjectionResolver::new(schema.field_names());

        Ok(Self {
            definition,
            schema,
            caster,
            resolver,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &CollectionDefinition {
        &self.definition
    }

    pub fn schema(&self) -> &SchemaTree {
        &self.schema
    }

    pub fn caster(&self) -> &DocumentCaster {
        &self.caster
    }

    /// Top-level field names, bookkeeping fields included.
    pub fn field_names(&self) -> &[String] {
        self.resolver.all_field_names()
    }

    /// Resolves a caller projection against this collection's fields.
    ///
    /// # Errors
    ///
    /// See [`ProjectionResolver::resolve`].
    pub fn resolve_projection(&self, request: &ProjectionRequest<'_>) -> CrudResult<Projection> {
        self.resolver.resolve(request)
    }

    /// Parses and validates a caller query fragment against this collection's fields.
    ///
    /// # Errors
    ///
    /// See [`query::parse_query_filter`].
    pub fn parse_query(&self, text: &str) -> CrudResult<Document> {
        query::parse_query_filter(text, self.field_names())
    }

    /// Casts a stored document into its API representation.
    pub fn cast(&self, document: Document) -> Document {
        self.caster.cast_owned(document)
    }
}

/// The compiled collections served by one process, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    collections: HashMap<String, Arc<CompiledCollection>>,
}

impl CollectionRegistry {
    pub fn builder() -> CollectionRegistryBuilder {
        CollectionRegistryBuilder::default()
    }

    /// Looks up a compiled collection by name.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::CollectionNotFound`] if no such collection is registered.
    pub fn get(&self, name: &str) -> CrudResult<Arc<CompiledCollection>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| CrudError::CollectionNotFound(name.to_string()))
    }

    /// Looks up a compiled collection by its endpoint base path.
    pub fn by_endpoint(&self, path: &str) -> Option<Arc<CompiledCollection>> {
        self.collections
            .values()
            .find(|collection| collection.definition.endpoint_base_path == path)
            .cloned()
    }

    /// Registered collection names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.collections.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Builder for [`CollectionRegistry`].
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistryBuilder {
    definitions: Vec<CollectionDefinition>,
}

impl CollectionRegistryBuilder {
    pub fn with_definition(mut self, definition: CollectionDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_definitions(mut self, definitions: impl IntoIterator<Item = CollectionDefinition>) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Compiles every definition.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Definition`] if a definition does not compile, or if two
    /// definitions share a name or an endpoint base path.
    pub fn build(self) -> CrudResult<CollectionRegistry> {
        let mut collections: HashMap<String, Arc<CompiledCollection>> = HashMap::new();

        for definition in self.definitions {
            if collections.contains_key(&definition.name) {
                return Err(CrudError::definition(format!(
                    "collection `{}` is defined more than once",
                    definition.name,
                )));
            }
            if let Some(other) = collections
                .values()
                .find(|c| c.definition.endpoint_base_path == definition.endpoint_base_path)
            {
                return Err(CrudError::definition(format!(
                    "collections `{}` and `{}` share the endpoint `{}`",
                    other.name(),
                    definition.name,
                    definition.endpoint_base_path,
                )));
            }

            let compiled = CompiledCollection::compile(definition)?;
            tracing::info!(
                collection = compiled.name(),
                endpoint = %compiled.definition.endpoint_base_path,
                fields = compiled.field_names().len(),
                cast_targets = compiled.schema.cast_targets().len(),
                "compiled collection",
            );
            collections.insert(compiled.name().to_string(), Arc::new(compiled));
        }

        Ok(CollectionRegistry { collections })
    }
}
