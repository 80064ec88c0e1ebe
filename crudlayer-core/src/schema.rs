//! Schema compilation.
//!
//! [`compile`] turns a field list into a [`SchemaTree`]: a normalized, JSON-Schema-like
//! tree with one node per field. The mapping from declared kind to node is fixed:
//!
//! | Field kind  | Node                                              |
//! |-------------|---------------------------------------------------|
//! | `string`    | string                                            |
//! | `number`    | number                                            |
//! | `boolean`   | boolean                                           |
//! | `Date`      | string, `date-time` format                        |
//! | `ObjectId`  | string, annotated with an `ObjectId` cast         |
//! | `GeoPoint`  | array of 2 to 3 numbers, annotated with a `GeoPoint` cast |
//! | `RawObject` | object, properties compiled recursively           |
//! | `Array`     | array, items compiled recursively                 |
//!
//! Every cast annotation is also collected into the tree's list of [`CastTarget`]s, so
//! consumers can locate ObjectId and GeoPoint values without walking the schema again.

use serde_json::{Map, Value, json};
use std::{collections::HashSet, fmt};

use crate::{
    definition::{CollectionDefinition, FieldDefinition, FieldKind},
    error::{CrudError, CrudResult},
};

/// Pattern every ObjectId text representation matches.
pub const OBJECT_ID_PATTERN: &str = "^[a-fA-F\\d]{24}$";

/// Non-standard JSON Schema keyword carrying the cast annotation.
pub const CAST_KEYWORD: &str = "x-cast";

/// Kinds of values that need a dedicated cast on their way out of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// Store-native identifier, cast to its hex string.
    ObjectId,
    /// GeoJSON point, cast to its bare coordinates.
    GeoPoint,
}

impl CastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CastKind::ObjectId => "ObjectId",
            CastKind::GeoPoint => "GeoPoint",
        }
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A named property of an object.
    Field(String),
    /// Every element of an array.
    Items,
}

/// Location of a node relative to the document root.
///
/// Rendered as a dotted path where `[]` stands for "every element", e.g.
/// `addresses[].location`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the name of the top-level field this path starts from.
    pub fn root_field(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if index == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Items => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// Cast annotation attached to ObjectId and GeoPoint nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CastTarget {
    pub kind: CastKind,
    pub path: FieldPath,
}

/// Extra format constraint on string nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    DateTime,
}

/// Structural type of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    String {
        format: Option<StringFormat>,
        pattern: Option<&'static str>,
    },
    Number,
    Boolean,
    Array {
        items: Box<SchemaNode>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object(ObjectSchema),
}

/// Object node: ordered properties plus the names of the required ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: Vec<(String, SchemaNode)>,
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl ObjectSchema {
    /// Looks up a property node by name.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, node)| node)
    }
}

/// A node of the compiled schema tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub node_type: NodeType,
    pub nullable: bool,
    pub description: Option<String>,
    /// Set on ObjectId and GeoPoint nodes.
    pub cast: Option<CastTarget>,
}

impl SchemaNode {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            nullable: false,
            description: None,
            cast: None,
        }
    }

    /// Renders the node as JSON Schema.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        let type_name = match &self.node_type {
            NodeType::String { format, pattern } => {
                if let Some(StringFormat::DateTime) = format {
                    schema.insert("format".into(), json!("date-time"));
                }
                if let Some(pattern) = pattern {
                    schema.insert("pattern".into(), json!(pattern));
                }
                "string"
            }
            NodeType::Number => "number",
            NodeType::Boolean => "boolean",
            NodeType::Array { items, min_items, max_items } => {
                schema.insert("items".into(), items.to_json_schema());
                if let Some(min) = min_items {
                    schema.insert("minItems".into(), json!(min));
                }
                if let Some(max) = max_items {
                    schema.insert("maxItems".into(), json!(max));
                }
                "array"
            }
            NodeType::Object(object) => {
                object_json_schema(object, &mut schema);
                "object"
            }
        };

        schema.insert(
            "type".into(),
            if self.nullable {
                json!([type_name, "null"])
            } else {
                json!(type_name)
            },
        );
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(cast) = &self.cast {
            schema.insert(
                CAST_KEYWORD.into(),
                json!({ "kind": cast.kind.as_str(), "path": cast.path.to_string() }),
            );
        }

        Value::Object(schema)
    }
}

fn object_json_schema(object: &ObjectSchema, schema: &mut Map<String, Value>) {
    schema.insert(
        "properties".into(),
        Value::Object(
            object
                .properties
                .iter()
                .map(|(name, node)| (name.clone(), node.to_json_schema()))
                .collect(),
        ),
    );
    if !object.required.is_empty() {
        schema.insert("required".into(), json!(object.required));
    }
    schema.insert("additionalProperties".into(), json!(object.additional_properties));
}

/// The compiled, immutable schema of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTree {
    root: ObjectSchema,
    cast_targets: Vec<CastTarget>,
}

impl SchemaTree {
    /// The root object node.
    pub fn root(&self) -> &ObjectSchema {
        &self.root
    }

    /// Every ObjectId and GeoPoint location in the tree, in declaration order.
    pub fn cast_targets(&self) -> &[CastTarget] {
        &self.cast_targets
    }

    /// Looks up a top-level field node.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.root.property(name)
    }

    /// Names of the top-level fields, in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.root
            .properties
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Renders the whole tree as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        object_json_schema(&self.root, &mut schema);
        Value::Object(schema)
    }
}

/// Compiles a field list into a schema tree.
///
/// # Errors
///
/// Returns [`CrudError::Definition`] when a `RawObject` lacks `schema.properties`, an
/// `Array` lacks `items`, or a name is empty or repeated among its siblings.
pub fn compile(fields: &[FieldDefinition]) -> CrudResult<SchemaTree> {
    let mut compiler = Compiler::default();
    let root = compiler.compile_object(fields, true)?;

    Ok(SchemaTree {
        root,
        cast_targets: compiler.cast_targets,
    })
}

/// Compiles a collection definition, bookkeeping fields included.
pub fn compile_collection(definition: &CollectionDefinition) -> CrudResult<SchemaTree> {
    compile(&definition.fields_with_mandatory()?).map_err(|err| match err {
        CrudError::Definition(reason) => {
            CrudError::Definition(format!("collection `{}`: {reason}", definition.name))
        }
        other => other,
    })
}

#[derive(Default)]
struct Compiler {
    path: FieldPath,
    cast_targets: Vec<CastTarget>,
}

impl Compiler {
    fn compile_object(
        &mut self,
        fields: &[FieldDefinition],
        additional_properties: bool,
    ) -> CrudResult<ObjectSchema> {
        let mut seen = HashSet::new();
        let mut object = ObjectSchema {
            additional_properties,
            ..ObjectSchema::default()
        };

        for field in fields {
            if field.name.is_empty() {
                return Err(CrudError::definition(format!(
                    "field without a name under `{}`",
                    self.display_path(),
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CrudError::definition(format!(
                    "field `{}` is declared more than once under `{}`",
                    field.name,
                    self.display_path(),
                )));
            }

            self.path.push(PathSegment::Field(field.name.clone()));
            let node = self.compile_field(field);
            self.path.pop();

            if field.required {
                object.required.push(field.name.clone());
            }
            object.properties.push((field.name.clone(), node?));
        }

        Ok(object)
    }

    fn compile_field(&mut self, field: &FieldDefinition) -> CrudResult<SchemaNode> {
        let mut node = match field.kind {
            FieldKind::String => SchemaNode::new(NodeType::String { format: None, pattern: None }),
            FieldKind::Number => SchemaNode::new(NodeType::Number),
            FieldKind::Boolean => SchemaNode::new(NodeType::Boolean),
            FieldKind::Date => SchemaNode::new(NodeType::String {
                format: Some(StringFormat::DateTime),
                pattern: None,
            }),
            FieldKind::ObjectId => self.annotated(
                CastKind::ObjectId,
                NodeType::String { format: None, pattern: Some(OBJECT_ID_PATTERN) },
            ),
            FieldKind::GeoPoint => self.annotated(
                CastKind::GeoPoint,
                NodeType::Array {
                    items: Box::new(SchemaNode::new(NodeType::Number)),
                    min_items: Some(2),
                    max_items: Some(3),
                },
            ),
            FieldKind::RawObject => {
                let properties = field
                    .schema
                    .as_ref()
                    .and_then(|schema| schema.properties.as_deref())
                    .ok_or_else(|| {
                        CrudError::definition(format!(
                            "RawObject field `{}` must declare schema.properties",
                            self.display_path(),
                        ))
                    })?;
                let additional = field
                    .schema
                    .as_ref()
                    .is_none_or(|schema| schema.additional_properties);

                SchemaNode::new(NodeType::Object(self.compile_object(properties, additional)?))
            }
            FieldKind::Array => {
                let items = field.items.as_deref().ok_or_else(|| {
                    CrudError::definition(format!(
                        "Array field `{}` must declare items",
                        self.display_path(),
                    ))
                })?;

                self.path.push(PathSegment::Items);
                let items = self.compile_field(items);
                self.path.pop();

                SchemaNode::new(NodeType::Array {
                    items: Box::new(items?),
                    min_items: None,
                    max_items: None,
                })
            }
        };

        node.nullable = field.nullable;
        node.description = field.description.clone();
        Ok(node)
    }

    fn annotated(&mut self, kind: CastKind, node_type: NodeType) -> SchemaNode {
        let target = CastTarget { kind, path: self.path.clone() };
        self.cast_targets.push(target.clone());

        SchemaNode {
            cast: Some(target),
            ..SchemaNode::new(node_type)
        }
    }

    fn display_path(&self) -> String {
        if self.path.segments().is_empty() {
            "<root>".to_string()
        } else {
            self.path.to_string()
        }
    }
}
