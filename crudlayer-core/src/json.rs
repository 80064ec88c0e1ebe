//! Conversion of client-supplied JSON fragments into BSON.
//!
//! Fragments are parsed as plain JSON first so that no extended-JSON key (such as
//! `$oid`) is interpreted before the grammar has had a chance to reject it.

use bson::{Bson, Document};
use serde_json::{Map, Value};

use crate::error::{CrudError, CrudResult};

/// Parses `text` as a JSON object. `what` names the fragment in error messages.
pub(crate) fn parse_object(text: &str, what: &str) -> CrudResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CrudError::invalid_request(format!("{what} must be a JSON object"))),
        Err(err) => Err(CrudError::invalid_request(format!("{what} is not valid JSON: {err}"))),
    }
}

/// Converts a parsed JSON object into a BSON document, keeping key order.
pub(crate) fn to_document(map: Map<String, Value>) -> Document {
    map.into_iter()
        .map(|(key, value)| (key, to_bson(value)))
        .collect()
}

fn to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map(Bson::Int32).unwrap_or(Bson::Int64(i)),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(to_bson).collect()),
        Value::Object(map) => Bson::Document(to_document(map)),
    }
}
