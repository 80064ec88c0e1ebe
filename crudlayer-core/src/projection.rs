//! Projection resolution.
//!
//! A caller narrows the fields it reads either with a comma-separated field list or with
//! a raw projection (a JSON object in the store's projection language), never both. The
//! [`ProjectionResolver`] combines that selection with the caller's ACL columns and
//! produces a [`Projection`] that is safe to hand to the store:
//!
//! - with no selection, every field of the collection the ACL allows is included;
//! - a field list is intersected with the ACL;
//! - a raw projection has every `$` token checked against the projection [`Grammar`],
//!   may not exclude a column the ACL grants, and may not include fields outside it,
//!   whether by marker, nested path or a `$slice`/`$elemMatch` selector;
//! - under an ACL, a raw projection made only of field selectors is rejected, since the
//!   store would answer it with every field;
//! - an empty result falls back to `{ "_id": 1 }`.
//!
//! # Example
//!
//! ```ignore
//! use crudlayer_core::projection::{ProjectionRequest, ProjectionResolver};
//!
//! let resolver = ProjectionResolver::new(vec!["a".into(), "b".into(), "c".into()]);
//! let projection = resolver.resolve(
//!     &ProjectionRequest::new().fields("a,b,c").acl_columns("a,c"),
//! )?;
//! assert_eq!(projection.as_document(), &bson::doc! { "a": 1, "c": 1 });
//! ```

use bson::{Bson, Document, doc};

use crate::{
    definition::ID_FIELD,
    error::{CrudError, CrudResult},
    grammar::Grammar,
    json,
};

/// The set of columns a caller may read. Empty means unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AclColumns(Vec<String>);

impl AclColumns {
    /// Parses a comma-separated column list, trimming names and dropping empty ones.
    pub fn parse(columns: Option<&str>) -> Self {
        let mut parsed: Vec<String> = Vec::new();
        for column in split_list(columns.unwrap_or_default()) {
            if !parsed.iter().any(|c| c == column) {
                parsed.push(column.to_string());
            }
        }
        Self(parsed)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `column` is explicitly listed.
    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }

    /// Returns `true` if a caller with these columns may read `column`.
    pub fn allows(&self, column: &str) -> bool {
        self.is_unrestricted() || self.contains(column)
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// One contribution to a projection.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionFragment {
    /// Include the named field.
    Field(String),
    /// Merge the given projection object.
    Expression(Document),
}

/// A projection ready for the store: field names or computed expressions mapped to an
/// inclusion marker, an exclusion marker or an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection(Document);

impl Projection {
    /// Flattens fragments into one projection. Later fragments win on key collisions.
    /// An empty result becomes `{ "_id": 1 }`.
    pub fn from_fragments(fragments: impl IntoIterator<Item = ProjectionFragment>) -> Self {
        let mut projection = Document::new();
        for fragment in fragments {
            match fragment {
                ProjectionFragment::Field(name) => {
                    projection.insert(name, 1);
                }
                ProjectionFragment::Expression(expression) => {
                    for (key, value) in expression {
                        projection.insert(key, value);
                    }
                }
            }
        }

        if projection.is_empty() {
            return id_only();
        }
        Self(projection)
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    /// Keys of the projection, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns `true` when every entry is an exclusion marker.
    pub fn is_exclusive(&self) -> bool {
        self.0.iter().all(|(_, value)| marker(value) == Some(false))
    }
}

impl From<Projection> for Document {
    fn from(projection: Projection) -> Self {
        projection.0
    }
}

/// Reads a projection value as an inclusion (`Some(true)`) or exclusion (`Some(false)`)
/// marker. Any other value is an expression.
pub fn marker(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(n) => Some(*n != 0),
        Bson::Int64(n) => Some(*n != 0),
        Bson::Double(n) => Some(*n != 0.0),
        _ => None,
    }
}

/// Per-request projection parameters.
///
/// Whitespace-only values count as absent, except that a field list and a raw projection
/// supplied together are rejected whenever both are non-empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionRequest<'a> {
    pub fields: Option<&'a str>,
    pub acl_columns: Option<&'a str>,
    pub raw_projection: Option<&'a str>,
}

impl<'a> ProjectionRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the comma-separated client field list.
    pub fn fields(mut self, fields: &'a str) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Sets the caller's comma-separated ACL columns.
    pub fn acl_columns(mut self, acl_columns: &'a str) -> Self {
        self.acl_columns = Some(acl_columns);
        self
    }

    /// Sets the raw projection text.
    pub fn raw_projection(mut self, raw_projection: &'a str) -> Self {
        self.raw_projection = Some(raw_projection);
        self
    }
}

fn supplied(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Find-projection operators that select part of an existing field.
const FIELD_SELECTORS: &[&str] = &["$slice", "$elemMatch"];

/// Returns `true` when a projection value reads from the field it is keyed by: a
/// `$slice`/`$elemMatch` selector or a nested projection such as `{ "city": 1 }`.
fn selects_field(value: &Bson) -> bool {
    match value {
        Bson::Document(document) => document
            .keys()
            .next()
            .is_none_or(|key| FIELD_SELECTORS.contains(&key.as_str()) || !key.starts_with('$')),
        _ => false,
    }
}

/// Resolves caller projections for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionResolver {
    all_field_names: Vec<String>,
    grammar: Grammar,
}

impl ProjectionResolver {
    /// Creates a resolver over the collection's top-level field names.
    pub fn new(all_field_names: Vec<String>) -> Self {
        Self {
            all_field_names,
            grammar: Grammar::projection(),
        }
    }

    pub fn all_field_names(&self) -> &[String] {
        &self.all_field_names
    }

    /// Resolves a request into a projection.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidRequest`] when both a field list and a raw projection
    /// are given, or when the raw projection is malformed, uses a token outside the
    /// grammar, excludes a column the ACL grants, or only selects within fields under a
    /// restricted ACL.
    pub fn resolve(&self, request: &ProjectionRequest<'_>) -> CrudResult<Projection> {
        let acl = AclColumns::parse(request.acl_columns);
        let fragments = if supplied(request.fields) && supplied(request.raw_projection) {
            Err(CrudError::invalid_request(
                "a field list and a raw projection cannot be used together",
            ))
        } else {
            match (present(request.fields), present(request.raw_projection)) {
                (Some(fields), _) => Ok(Self::field_fragments(fields, &acl)),
                (None, Some(raw)) => self.raw_fragments(raw, &acl),
                (None, None) => Ok(self.default_fragments(&acl)),
            }
        };

        let projection = fragments
            .inspect_err(|err| tracing::warn!(reason = %err, "rejected projection request"))
            .map(Projection::from_fragments)?;
        tracing::debug!(projection = ?projection.as_document(), "resolved projection");

        Ok(projection)
    }

    fn default_fragments(&self, acl: &AclColumns) -> Vec<ProjectionFragment> {
        self.all_field_names
            .iter()
            .filter(|name| acl.allows(name))
            .map(|name| ProjectionFragment::Field(name.clone()))
            .collect()
    }

    fn field_fragments(fields: &str, acl: &AclColumns) -> Vec<ProjectionFragment> {
        split_list(fields)
            .filter(|name| acl.allows(name))
            .map(|name| ProjectionFragment::Field(name.to_string()))
            .collect()
    }

    fn raw_fragments(&self, raw: &str, acl: &AclColumns) -> CrudResult<Vec<ProjectionFragment>> {
        let parsed = json::parse_object(raw, "raw projection")?;
        let readable = |name: &str| {
            if acl.is_unrestricted() {
                self.all_field_names.iter().any(|field| field == name)
            } else {
                acl.contains(name)
            }
        };
        self.grammar.validate_object(&parsed, &readable)?;

        let expression = json::to_document(parsed);
        if let Some(column) = expression
            .iter()
            .find(|(key, value)| acl.contains(key) && marker(value) == Some(false))
            .map(|(key, _)| key)
        {
            return Err(CrudError::invalid_request(format!(
                "exclusive raw projection on `{column}` overrides the readable columns",
            )));
        }

        let expression = expression
            .into_iter()
            .filter(|(key, value)| match (value, marker(value)) {
                (Bson::Null, _) => false,
                _ if acl.is_unrestricted() => true,
                (_, Some(true)) => acl.contains(root_field(key)),
                (_, Some(false)) => false,
                (_, None) if selects_field(value) => acl.contains(root_field(key)),
                (_, None) => true,
            })
            .collect::<Document>();

        if expression.is_empty() {
            return Ok(Vec::new());
        }
        if !acl.is_unrestricted() && expression.values().all(selects_field) {
            return Err(CrudError::invalid_request(
                "raw projection only selects within fields; include at least one readable column",
            ));
        }

        Ok(vec![ProjectionFragment::Expression(expression)])
    }
}

fn root_field(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

/// Resolves a projection without a long-lived resolver.
///
/// # Errors
///
/// See [`ProjectionResolver::resolve`].
pub fn resolve_projection(
    client_fields: Option<&str>,
    acl_columns: Option<&str>,
    all_field_names: &[String],
    raw_projection: Option<&str>,
) -> CrudResult<Projection> {
    ProjectionResolver::new(all_field_names.to_vec()).resolve(&ProjectionRequest {
        fields: client_fields,
        acl_columns,
        raw_projection,
    })
}

/// The projection used when nothing at all may be read.
pub fn id_only() -> Projection {
    Projection(doc! { ID_FIELD: 1 })
}
