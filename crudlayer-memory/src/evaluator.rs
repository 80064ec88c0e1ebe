//! Filter and projection evaluation for in-memory documents.
//!
//! Filters are lowered into the core [`Expr`] tree and evaluated per document by
//! [`DocumentEvaluator`]. Field names may be dotted to reach into embedded documents.
//! As in the store's query language, a comparison against an array field matches when
//! any element matches, and a missing field compares equal to `null`.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use crudlayer_core::{
    error::{CrudError, CrudResult},
    projection::{Projection, marker},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path inside a document.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    match (document.get(head)?, rest) {
        (value, None) => Some(value),
        (Bson::Document(inner), Some(rest)) => lookup(inner, rest),
        _ => None,
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> CrudResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> CrudResult<Vec<Document>> {
        documents
            .into_iter()
            .filter_map(|doc| match DocumentEvaluator::new(doc).evaluate(expr) {
                Ok(true) => Some(Ok(doc.clone())),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            })
            .collect()
    }

    fn matches_any(field_value: &Comparable<'_>, value: &Comparable<'_>) -> bool {
        match field_value {
            Comparable::Array(items) if !matches!(value, Comparable::Array(_)) => {
                items.iter().any(|item| item == value)
            }
            _ => field_value == value,
        }
    }

    fn compares(field_value: &Comparable<'_>, value: &Comparable<'_>, accept: fn(Ordering) -> bool) -> bool {
        match field_value {
            Comparable::Array(items) => items
                .iter()
                .any(|item| item.partial_cmp(value).is_some_and(accept)),
            _ => field_value.partial_cmp(value).is_some_and(accept),
        }
    }

    fn in_list(field_value: &Comparable<'_>, operand: &Bson) -> CrudResult<bool> {
        let Bson::Array(values) = operand else {
            return Err(CrudError::Backend("$in and $nin expect an array".to_string()));
        };

        Ok(values
            .iter()
            .any(|value| Self::matches_any(field_value, &Comparable::from(value))))
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = CrudError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_or(exprs)?)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup(self.document, field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let operand = Comparable::from(value);

        match op {
            FieldOp::Eq => Ok(Self::matches_any(&field_value, &operand)),
            FieldOp::Ne => Ok(!Self::matches_any(&field_value, &operand)),
            FieldOp::Gt => Ok(Self::compares(&field_value, &operand, Ordering::is_gt)),
            FieldOp::Gte => Ok(Self::compares(&field_value, &operand, Ordering::is_ge)),
            FieldOp::Lt => Ok(Self::compares(&field_value, &operand, Ordering::is_lt)),
            FieldOp::Lte => Ok(Self::compares(&field_value, &operand, Ordering::is_le)),
            FieldOp::In => Self::in_list(&field_value, value),
            FieldOp::Nin => Ok(!Self::in_list(&field_value, value)?),
        }
    }
}

/// Applies a resolved projection to a stored document.
///
/// Inclusion projections keep `_id` plus the listed paths, exclusion projections drop
/// the listed paths. Computed expressions cannot be evaluated in memory.
///
/// # Errors
///
/// Returns [`CrudError::Backend`] if the projection holds an expression or mixes
/// inclusions with exclusions other than `_id`.
pub(crate) fn apply_projection(document: &Document, projection: &Projection) -> CrudResult<Document> {
    let mut included: Vec<&str> = Vec::new();
    let mut excluded: Vec<&str> = Vec::new();

    for (key, value) in projection.as_document() {
        match marker(value) {
            Some(true) => included.push(key),
            Some(false) => excluded.push(key),
            None => {
                return Err(CrudError::Backend(format!(
                    "projection expression on `{key}` is not supported by this backend",
                )));
            }
        }
    }

    if included.is_empty() {
        let mut projected = document.clone();
        excluded.iter().for_each(|path| remove_path(&mut projected, path));
        return Ok(projected);
    }
    if excluded.iter().any(|path| *path != "_id") {
        return Err(CrudError::Backend(
            "cannot mix inclusions and exclusions in a projection".to_string(),
        ));
    }

    let mut projected = Document::new();
    if !excluded.contains(&"_id") && !included.contains(&"_id") {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }
    for path in included {
        copy_path(document, &mut projected, path);
    }

    Ok(projected)
}

fn copy_path(source: &Document, target: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = source.get(path) {
                target.insert(path, value.clone());
            }
        }
        Some((head, rest)) => {
            let Some(Bson::Document(inner)) = source.get(head) else {
                return;
            };
            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner_target)) = target.get_mut(head) {
                copy_path(inner, inner_target, rest);
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        let expr = Expr::from_filter(&filter).unwrap();
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    #[test]
    fn test_field_comparisons() {
        let book = doc! { "title": "Dune", "pages": 412, "tags": ["sf", "classic"], "meta": { "isbn": "x1" } };

        assert!(matches(&book, doc! { "title": "Dune" }));
        assert!(matches(&book, doc! { "pages": { "$gt": 400, "$lte": 412 } }));
        assert!(matches(&book, doc! { "tags": "sf" }));
        assert!(matches(&book, doc! { "meta.isbn": { "$in": ["x1", "x2"] } }));
        assert!(matches(&book, doc! { "missing": null }));
        assert!(!matches(&book, doc! { "pages": { "$lt": 100 } }));
        assert!(!matches(&book, doc! { "title": { "$nin": ["Dune"] } }));
    }

    #[test]
    fn test_logical_operators() {
        let book = doc! { "title": "Dune", "pages": 412 };

        assert!(matches(&book, doc! { "$or": [{ "title": "Emma" }, { "pages": 412 }] }));
        assert!(matches(&book, doc! { "$nor": [{ "title": "Emma" }] }));
        assert!(matches(&book, doc! { "pages": { "$not": { "$lt": 10 } } }));
        assert!(matches(&book, doc! { "author": { "$exists": false } }));
        assert!(!matches(&book, doc! { "$and": [{ "title": "Dune" }, { "pages": 1 }] }));
    }

    #[test]
    fn test_unsupported_operator_is_backend_error() {
        let err = Expr::from_filter(&doc! { "title": { "$regex": "^D" } }).unwrap_err();
        assert!(matches!(err, CrudError::Backend(_)));
    }

    #[test]
    fn test_apply_inclusion_projection() {
        let book = doc! { "_id": 1, "title": "Dune", "pages": 412, "meta": { "isbn": "x1", "lang": "en" } };
        let projection = Projection::from_fragments([
            crudlayer_core::projection::ProjectionFragment::Expression(doc! { "title": 1, "meta.isbn": 1 }),
        ]);

        assert_eq!(
            apply_projection(&book, &projection).unwrap(),
            doc! { "_id": 1, "title": "Dune", "meta": { "isbn": "x1" } },
        );
    }

    #[test]
    fn test_apply_exclusion_projection() {
        let book = doc! { "_id": 1, "title": "Dune", "pages": 412 };
        let projection = Projection::from_fragments([
            crudlayer_core::projection::ProjectionFragment::Expression(doc! { "pages": 0 }),
        ]);

        assert_eq!(apply_projection(&book, &projection).unwrap(), doc! { "_id": 1, "title": "Dune" });
    }
}
