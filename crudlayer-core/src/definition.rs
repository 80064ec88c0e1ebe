//! Declarative collection definitions.
//!
//! A [`CollectionDefinition`] is the static description of a resource: its name, the
//! endpoint it is exposed under, the soft-delete state new documents start in, its
//! fields and its indexes. Definitions are plain serde data, so the configuration
//! collaborator can load them from JSON:
//!
//! ```ignore
//! use crudlayer_core::definition::CollectionDefinition;
//!
//! let definition = CollectionDefinition::from_json_str(r#"{
//!     "name": "books",
//!     "endpointBasePath": "/books",
//!     "fields": [
//!         { "name": "title", "type": "string", "required": true },
//!         { "name": "price", "type": "number", "nullable": true }
//!     ]
//! }"#)?;
//! ```

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};

use crate::error::{CrudError, CrudResult};

/// Name of the document identifier field.
pub const ID_FIELD: &str = "_id";
/// Name of the field holding the id of the user that created the document.
pub const CREATOR_ID_FIELD: &str = "creatorId";
/// Name of the field holding the id of the user that last updated the document.
pub const UPDATER_ID_FIELD: &str = "updaterId";
/// Name of the creation timestamp field.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Name of the last update timestamp field.
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Name of the soft-delete state marker field.
pub const STATE_FIELD: &str = "__STATE__";

/// The bookkeeping fields every collection carries, in canonical order.
pub const MANDATORY_FIELDS: [&str; 6] = [
    ID_FIELD,
    CREATOR_ID_FIELD,
    UPDATER_ID_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    STATE_FIELD,
];

/// Returns `true` if `name` is one of the six bookkeeping fields.
pub fn is_mandatory_field(name: &str) -> bool {
    MANDATORY_FIELDS.contains(&name)
}

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    Date,
    ObjectId,
    GeoPoint,
    RawObject,
    Array,
}

impl FieldKind {
    /// Returns the name used for this kind in collection definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "Date",
            FieldKind::ObjectId => "ObjectId",
            FieldKind::GeoPoint => "GeoPoint",
            FieldKind::RawObject => "RawObject",
            FieldKind::Array => "Array",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nested schema of a `RawObject` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedSchema {
    /// The nested field list. Must be present for the definition to compile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<FieldDefinition>>,
    /// Whether properties not listed above are tolerated.
    #[serde(default = "default_additional_properties")]
    pub additional_properties: bool,
}

fn default_additional_properties() -> bool {
    true
}

impl NestedSchema {
    /// Creates a nested schema from a field list.
    pub fn new(properties: Vec<FieldDefinition>) -> Self {
        Self {
            properties: Some(properties),
            additional_properties: true,
        }
    }
}

/// A single field of a collection, or of a nested object or array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Field name, unique among its siblings. Array item definitions may leave it empty.
    #[serde(default)]
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested schema, required for `RawObject` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<NestedSchema>,
    /// Item definition, required for `Array` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDefinition>>,
}

impl FieldDefinition {
    /// Creates an optional, non-nullable field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable: false,
            description: None,
            schema: None,
            items: None,
        }
    }

    /// Creates a `RawObject` field with the given nested properties.
    pub fn raw_object(name: impl Into<String>, properties: Vec<FieldDefinition>) -> Self {
        Self {
            schema: Some(NestedSchema::new(properties)),
            ..Self::new(name, FieldKind::RawObject)
        }
    }

    /// Creates an `Array` field whose elements follow `items`.
    pub fn array(name: impl Into<String>, items: FieldDefinition) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(name, FieldKind::Array)
        }
    }

    /// Creates an unnamed item definition, for use with [`FieldDefinition::array`].
    pub fn item(kind: FieldKind) -> Self {
        Self::new("", kind)
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attaches a human readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Soft-delete state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentState {
    Public,
    #[default]
    Draft,
    Trash,
    Deleted,
}

impl DocumentState {
    /// Returns the stored representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Public => "PUBLIC",
            DocumentState::Draft => "DRAFT",
            DocumentState::Trash => "TRASH",
            DocumentState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentState {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(DocumentState::Public),
            "DRAFT" => Ok(DocumentState::Draft),
            "TRASH" => Ok(DocumentState::Trash),
            "DELETED" => Ok(DocumentState::Deleted),
            other => Err(CrudError::invalid_request(format!("unknown document state `{other}`"))),
        }
    }
}

/// Index kinds. Indexes are carried as data; creating them is the store collaborator's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Normal,
    Geo,
    Hash,
    Text,
}

/// A single field of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub name: String,
    /// Sort order for normal indexes (`1` or `-1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// An index declared on a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: IndexKind,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub fields: Vec<IndexField>,
}

/// Static declaration of a collection exposed as a REST resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    pub name: String,
    pub endpoint_base_path: String,
    #[serde(default)]
    pub default_state: DocumentState,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl CollectionDefinition {
    /// Creates a definition with no indexes and the default state.
    pub fn new(
        name: impl Into<String>,
        endpoint_base_path: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint_base_path: endpoint_base_path.into(),
            default_state: DocumentState::default(),
            fields,
            indexes: Vec::new(),
        }
    }

    /// Parses a definition from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Definition`] if the text is not a valid definition.
    pub fn from_json_str(text: &str) -> CrudResult<Self> {
        serde_json::from_str(text).map_err(|e| CrudError::definition(e.to_string()))
    }

    /// Returns the field list with the bookkeeping fields in place.
    ///
    /// Bookkeeping fields the definition omits are prepended in canonical order.
    /// Redeclaring one with a different type is a definition error.
    pub fn fields_with_mandatory(&self) -> CrudResult<Vec<FieldDefinition>> {
        let declared = self
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .collect::<HashSet<_>>();

        for field in self.fields.iter().filter(|f| is_mandatory_field(&f.name)) {
            let expected = mandatory_field(&field.name).kind;
            if field.kind != expected {
                return Err(CrudError::definition(format!(
                    "collection `{}` declares `{}` as {}, but it is a reserved {} field",
                    self.name, field.name, field.kind, expected,
                )));
            }
        }

        Ok(MANDATORY_FIELDS
            .iter()
            .filter(|name| !declared.contains(*name))
            .map(|name| mandatory_field(name))
            .chain(self.fields.iter().cloned())
            .collect())
    }
}

fn mandatory_field(name: &str) -> FieldDefinition {
    match name {
        ID_FIELD => FieldDefinition::new(ID_FIELD, FieldKind::ObjectId)
            .required()
            .with_description("Document identifier"),
        CREATOR_ID_FIELD => FieldDefinition::new(CREATOR_ID_FIELD, FieldKind::String)
            .required()
            .with_description("Id of the user that created the document"),
        UPDATER_ID_FIELD => FieldDefinition::new(UPDATER_ID_FIELD, FieldKind::String)
            .required()
            .with_description("Id of the user that last updated the document"),
        CREATED_AT_FIELD => FieldDefinition::new(CREATED_AT_FIELD, FieldKind::Date)
            .required()
            .with_description("Creation date"),
        UPDATED_AT_FIELD => FieldDefinition::new(UPDATED_AT_FIELD, FieldKind::Date)
            .required()
            .with_description("Last update date"),
        _ => FieldDefinition::new(STATE_FIELD, FieldKind::String)
            .required()
            .with_description("Soft-delete state of the document"),
    }
}
