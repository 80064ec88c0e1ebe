//! Query filters.
//!
//! Callers may narrow a read with a filter fragment in the store's query language and a
//! list of soft-delete states. [`parse_query_filter`] checks the fragment against the
//! query [`Grammar`] before it goes anywhere near the store, and [`build_filter`]
//! combines it with a [`StateFilter`].
//!
//! Backends that do not speak the store's query language natively can lower a filter
//! into the [`Expr`] tree with [`Expr::from_filter`] and evaluate it with a
//! [`QueryVisitor`].

use bson::{Bson, Document, doc};

use crate::{
    definition::{DocumentState, STATE_FIELD},
    error::{CrudError, CrudResult},
    grammar::Grammar,
    json,
};

/// Parses and validates a client query fragment.
///
/// `$field` references inside expressions must name one of `all_field_names`.
///
/// # Errors
///
/// Returns [`CrudError::InvalidRequest`] if the text is not a JSON object or uses a
/// token outside the query grammar.
pub fn parse_query_filter(text: &str, all_field_names: &[String]) -> CrudResult<Document> {
    let parsed = json::parse_object(text, "query filter")?;
    let readable = |name: &str| all_field_names.iter().any(|field| field == name);

    Grammar::query()
        .validate_object(&parsed, &readable)
        .inspect_err(|err| tracing::warn!(reason = %err, "rejected query filter"))?;

    Ok(json::to_document(parsed))
}

/// The soft-delete states a read is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFilter(Vec<DocumentState>);

impl Default for StateFilter {
    fn default() -> Self {
        Self(vec![DocumentState::Public])
    }
}

impl StateFilter {
    pub fn new(states: Vec<DocumentState>) -> Self {
        Self(states)
    }

    /// Parses a comma-separated state list. Blank or absent input means `PUBLIC`.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidRequest`] on an unknown state.
    pub fn parse(states: Option<&str>) -> CrudResult<Self> {
        let mut parsed: Vec<DocumentState> = Vec::new();
        for state in states.unwrap_or_default().split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let state = state.parse()?;
            if !parsed.contains(&state) {
                parsed.push(state);
            }
        }

        Ok(if parsed.is_empty() { Self::default() } else { Self(parsed) })
    }

    pub fn states(&self) -> &[DocumentState] {
        &self.0
    }

    /// Renders the restriction as a filter document.
    pub fn to_filter(&self) -> Document {
        let states = self.0.iter().map(|state| state.as_str()).collect::<Vec<_>>();
        doc! { STATE_FIELD: { "$in": states } }
    }
}

/// Combines an optional client filter with a state restriction.
pub fn build_filter(query: Option<Document>, states: &StateFilter) -> Document {
    match query {
        Some(query) if !query.is_empty() => doc! { "$and": [query, states.to_filter()] },
        _ => states.to_filter(),
    }
}

/// Field comparison operators of the lowered filter tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value equals one of the listed values.
    In,
    /// Value equals none of the listed values.
    Nin,
}

impl FieldOp {
    fn from_operator(operator: &str) -> Option<Self> {
        match operator {
            "$eq" => Some(FieldOp::Eq),
            "$ne" => Some(FieldOp::Ne),
            "$gt" => Some(FieldOp::Gt),
            "$gte" => Some(FieldOp::Gte),
            "$lt" => Some(FieldOp::Lt),
            "$lte" => Some(FieldOp::Lte),
            "$in" => Some(FieldOp::In),
            "$nin" => Some(FieldOp::Nin),
            _ => None,
        }
    }
}

/// A filter lowered into a tree of logical and field expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All must match. An empty list matches everything.
    And(Vec<Expr>),
    /// Any must match.
    Or(Vec<Expr>),
    /// None may match.
    Nor(Vec<Expr>),
    /// Inverts the inner expression.
    Not(Box<Expr>),
    /// Whether a (possibly dotted) field is present.
    Exists(String, bool),
    /// Field comparison.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    /// Lowers a filter document.
    ///
    /// Supported: `$and`, `$or`, `$nor`, implicit equality, and per-field `$eq`, `$ne`,
    /// `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists` and `$not`.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Backend`] for any other operator.
    pub fn from_filter(filter: &Document) -> CrudResult<Expr> {
        let mut exprs = filter
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Expr::And(Self::from_list(key, value)?)),
                "$or" => Ok(Expr::Or(Self::from_list(key, value)?)),
                "$nor" => Ok(Expr::Nor(Self::from_list(key, value)?)),
                other if other.starts_with('$') => Err(unsupported(other)),
                field => Self::from_condition(field, value),
            })
            .collect::<CrudResult<Vec<_>>>()?;

        Ok(if exprs.len() == 1 { exprs.remove(0) } else { Expr::And(exprs) })
    }

    fn from_list(operator: &str, value: &Bson) -> CrudResult<Vec<Expr>> {
        let Bson::Array(items) = value else {
            return Err(CrudError::Backend(format!("{operator} expects an array")));
        };

        items
            .iter()
            .map(|item| match item {
                Bson::Document(filter) => Self::from_filter(filter),
                _ => Err(CrudError::Backend(format!("{operator} expects an array of filters"))),
            })
            .collect()
    }

    fn from_condition(field: &str, value: &Bson) -> CrudResult<Expr> {
        let operators = match value {
            Bson::Document(condition) if condition.keys().any(|k| k.starts_with('$')) => condition,
            _ => return Ok(Expr::Field { field: field.to_string(), op: FieldOp::Eq, value: value.clone() }),
        };

        let mut exprs = operators
            .iter()
            .map(|(operator, operand)| match operator.as_str() {
                "$exists" => Ok(Expr::Exists(field.to_string(), truthy(operand))),
                "$not" => Ok(Expr::Not(Box::new(Self::from_condition(field, operand)?))),
                other => FieldOp::from_operator(other)
                    .map(|op| Expr::Field { field: field.to_string(), op, value: operand.clone() })
                    .ok_or_else(|| unsupported(other)),
            })
            .collect::<CrudResult<Vec<_>>>()?;

        Ok(if exprs.len() == 1 { exprs.remove(0) } else { Expr::And(exprs) })
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn unsupported(operator: &str) -> CrudError {
    CrudError::Backend(format!("filter operator {operator} is not supported by this backend"))
}

/// Visitor over a lowered filter tree.
pub trait QueryVisitor {
    type Output;
    type Error: Into<CrudError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Nor(exprs) => self.visit_nor(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}
