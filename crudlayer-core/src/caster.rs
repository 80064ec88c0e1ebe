//! Best-effort casting of stored documents into their API representation.
//!
//! A [`DocumentCaster`] is compiled once per collection from its [`SchemaTree`]. The
//! compiled form is a tree of [`CastNode`]s mirroring the schema without the bookkeeping
//! fields and without `required` lists; ObjectId and GeoPoint nodes are replaced by
//! directive nodes grafted from the tree's pre-computed cast targets.
//!
//! Casting walks the document alongside that tree and mutates it in place:
//!
//! - strings that look like numbers or booleans become numbers or booleans where the
//!   schema expects them, and numbers and booleans become strings where a string is
//!   expected;
//! - ObjectIds become their hex string;
//! - GeoJSON points become their bare coordinates;
//! - anything that cannot be cast, including `null`, is left as it is.
//!
//! Casting never fails.

use bson::{Bson, Document};
use chrono::SecondsFormat;
use std::{collections::HashMap, mem};

use crate::{
    definition::{CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD, is_mandatory_field},
    error::{CrudError, CrudResult},
    schema::{CastKind, CastTarget, NodeType, ObjectSchema, PathSegment, SchemaNode, SchemaTree, StringFormat},
};

/// Primitive type a value is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    DateTime,
    Number,
    Boolean,
}

/// A node of the compiled caster.
#[derive(Debug, Clone, PartialEq)]
pub enum CastNode {
    /// No cast; the value is left as it is.
    Generic,
    /// Coerce towards a primitive type.
    Primitive(Primitive),
    /// Apply a dedicated cast.
    Directive(CastKind),
    /// Cast known properties, leave unknown ones alone.
    Object(HashMap<String, CastNode>),
    /// Cast every element.
    Array(Box<CastNode>),
}

impl CastNode {
    fn from_schema(node: &SchemaNode) -> Self {
        if node.cast.is_some() {
            return CastNode::Generic;
        }

        match &node.node_type {
            NodeType::String { format: Some(StringFormat::DateTime), .. } => {
                CastNode::Primitive(Primitive::DateTime)
            }
            NodeType::String { .. } => CastNode::Primitive(Primitive::String),
            NodeType::Number => CastNode::Primitive(Primitive::Number),
            NodeType::Boolean => CastNode::Primitive(Primitive::Boolean),
            NodeType::Array { items, .. } => CastNode::Array(Box::new(CastNode::from_schema(items))),
            NodeType::Object(object) => CastNode::from_object(object, false),
        }
    }

    fn from_object(object: &ObjectSchema, skip_mandatory: bool) -> Self {
        CastNode::Object(
            object
                .properties
                .iter()
                .filter(|(name, _)| !(skip_mandatory && is_mandatory_field(name)))
                .map(|(name, node)| (name.clone(), CastNode::from_schema(node)))
                .collect(),
        )
    }

    fn graft(&mut self, segments: &[PathSegment], kind: CastKind) -> bool {
        match (segments.split_first(), self) {
            (None, node) => {
                *node = CastNode::Directive(kind);
                true
            }
            (Some((PathSegment::Field(name), rest)), CastNode::Object(properties)) => properties
                .get_mut(name)
                .is_some_and(|child| child.graft(rest, kind)),
            (Some((PathSegment::Items, rest)), CastNode::Array(items)) => items.graft(rest, kind),
            _ => false,
        }
    }

    fn apply(&self, value: &mut Bson) {
        match self {
            CastNode::Generic => {}
            CastNode::Primitive(primitive) => {
                let original = mem::replace(value, Bson::Null);
                *value = try_cast(*primitive, original);
            }
            CastNode::Directive(kind) => cast_directive(*kind, value),
            CastNode::Object(properties) => {
                if let Bson::Document(document) = value {
                    cast_properties(properties, document);
                }
            }
            CastNode::Array(items) => {
                if let Bson::Array(elements) = value {
                    elements.iter_mut().for_each(|element| items.apply(element));
                }
            }
        }
    }
}

fn cast_properties(properties: &HashMap<String, CastNode>, document: &mut Document) {
    for (key, value) in document.iter_mut() {
        if let Some(node) = properties.get(key) {
            node.apply(value);
        }
    }
}

/// Coerces `value` towards `primitive`, returning it unchanged when it does not fit.
pub fn try_cast(primitive: Primitive, value: Bson) -> Bson {
    match (primitive, value) {
        (Primitive::Number, Bson::String(s)) => parse_number(&s).unwrap_or(Bson::String(s)),
        (Primitive::Number, Bson::Boolean(b)) => Bson::Int32(i32::from(b)),
        (Primitive::Boolean, Bson::String(s)) => match s.as_str() {
            "true" => Bson::Boolean(true),
            "false" => Bson::Boolean(false),
            _ => Bson::String(s),
        },
        (Primitive::Boolean, Bson::Int32(n @ (0 | 1))) => Bson::Boolean(n == 1),
        (Primitive::Boolean, Bson::Int64(n @ (0 | 1))) => Bson::Boolean(n == 1),
        (Primitive::String, Bson::Int32(n)) => Bson::String(n.to_string()),
        (Primitive::String, Bson::Int64(n)) => Bson::String(n.to_string()),
        (Primitive::String, Bson::Double(n)) if n.is_finite() => Bson::String(n.to_string()),
        (Primitive::String, Bson::Boolean(b)) => Bson::String(b.to_string()),
        (Primitive::DateTime, Bson::DateTime(date)) => {
            Bson::String(date.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        (_, other) => other,
    }
}

fn parse_number(text: &str) -> Option<Bson> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(i32::try_from(n).map(Bson::Int32).unwrap_or(Bson::Int64(n)));
    }

    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Bson::Double)
}

fn cast_directive(kind: CastKind, value: &mut Bson) {
    match kind {
        CastKind::ObjectId => {
            if let Bson::ObjectId(id) = value {
                *value = Bson::String(id.to_hex());
            }
        }
        CastKind::GeoPoint => {
            let Bson::Document(point) = value else {
                return;
            };
            if !point.get_str("type").is_ok_and(|t| t == "Point") {
                return;
            }
            let coordinates = match point.get("coordinates") {
                Some(Bson::Array(coordinates)) => coordinates.clone(),
                _ => return,
            };
            *value = Bson::Array(coordinates);
        }
    }
}

/// Compiled caster for the documents of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCaster {
    root: HashMap<String, CastNode>,
}

impl DocumentCaster {
    /// Compiles a caster from a schema tree.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Definition`] if a cast target does not resolve to a node of
    /// the tree, which means the tree was not produced by the schema compiler.
    pub fn new(schema: &SchemaTree) -> CrudResult<Self> {
        let mut root = CastNode::from_object(schema.root(), true);

        for CastTarget { kind, path } in schema.cast_targets() {
            if path.root_field().is_some_and(is_mandatory_field) {
                continue;
            }
            if !root.graft(path.segments(), *kind) {
                return Err(CrudError::definition(format!(
                    "cast target `{path}` does not match the schema",
                )));
            }
        }

        match root {
            CastNode::Object(root) => Ok(Self { root }),
            _ => Err(CrudError::definition("schema root is not an object")),
        }
    }

    /// Casts `document` in place and returns it.
    pub fn cast<'a>(&self, document: &'a mut Document) -> &'a mut Document {
        cast_bookkeeping(document);
        cast_properties(&self.root, document);
        tracing::trace!(document = ?document, "cast document");

        document
    }

    /// Casts an owned document, for use in stream combinators.
    pub fn cast_owned(&self, mut document: Document) -> Document {
        self.cast(&mut document);
        document
    }
}

fn cast_bookkeeping(document: &mut Document) {
    if let Some(Bson::ObjectId(id)) = document.get(ID_FIELD) {
        let hex = id.to_hex();
        document.insert(ID_FIELD, hex);
    }
    for field in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
        if let Some(value) = document.get_mut(field) {
            let original = mem::replace(value, Bson::Null);
            *value = try_cast(Primitive::DateTime, original);
        }
    }
}
