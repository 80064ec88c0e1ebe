//! Operator allow-list grammar for client-supplied query-language fragments.
//!
//! Raw projections and query filters reach the store verbatim, so every `$`-prefixed
//! token they contain is checked before forwarding:
//!
//! - `$name` is accepted when `name` is an allowed operator of the grammar, or when it
//!   is a reference to a field the caller may read.
//! - `$$name` is a variable reference. System variables (`$$ROOT`, `$$CURRENT`,
//!   `$$REMOVE`, ...) expose whole documents or server state and are always rejected;
//!   user variables cannot be tracked back to readable fields and are rejected too.
//!
//! Tokens are scanned in every key and every string value of the parsed fragment, so
//! escaped spellings such as `"$$ROOT"` are caught as well.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::{CrudError, CrudResult};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$+\w+").expect("token pattern is valid"));

/// Aggregation expression operators that only compute over their arguments.
///
/// Operators able to read fields by a non-`$` name (`$getField`), bind variables
/// (`$let`), run server-side code (`$function`, `$accumulator`, `$where`) or expose
/// metadata (`$meta`) are deliberately absent.
pub const PROJECTION_OPERATORS: &[&str] = &[
    // arithmetic
    "$abs", "$add", "$ceil", "$divide", "$exp", "$floor", "$ln", "$log", "$log10", "$mod",
    "$multiply", "$pow", "$round", "$sqrt", "$subtract", "$trunc",
    // array
    "$arrayElemAt", "$arrayToObject", "$concatArrays", "$elemMatch", "$filter", "$first",
    "$firstN", "$in", "$indexOfArray", "$isArray", "$last", "$lastN", "$map", "$maxN",
    "$minN", "$objectToArray", "$range", "$reduce", "$reverseArray", "$size", "$slice",
    "$sortArray", "$zip",
    // boolean and comparison
    "$and", "$not", "$or", "$cmp", "$eq", "$gt", "$gte", "$lt", "$lte", "$ne",
    // conditional
    "$cond", "$ifNull", "$switch",
    // date
    "$dateAdd", "$dateDiff", "$dateFromParts", "$dateFromString", "$dateSubtract",
    "$dateToParts", "$dateToString", "$dateTrunc", "$dayOfMonth", "$dayOfWeek",
    "$dayOfYear", "$hour", "$isoDayOfWeek", "$isoWeek", "$isoWeekYear", "$millisecond",
    "$minute", "$month", "$second", "$week", "$year",
    // literal and object
    "$literal", "$mergeObjects",
    // set
    "$allElementsTrue", "$anyElementTrue", "$setDifference", "$setEquals",
    "$setIntersection", "$setIsSubset", "$setUnion",
    // string
    "$concat", "$indexOfBytes", "$indexOfCP", "$ltrim", "$regexFind", "$regexFindAll",
    "$regexMatch", "$replaceAll", "$replaceOne", "$rtrim", "$split", "$strcasecmp",
    "$strLenBytes", "$strLenCP", "$substr", "$substrBytes", "$substrCP", "$toLower",
    "$toString", "$toUpper", "$trim",
    // type
    "$convert", "$isNumber", "$toBool", "$toDate", "$toDecimal", "$toDouble", "$toInt",
    "$toLong", "$toObjectId", "$type",
    // accumulators usable in projections
    "$avg", "$max", "$min", "$stdDevPop", "$stdDevSamp", "$sum",
];

/// Query operators accepted in filter fragments, on top of [`PROJECTION_OPERATORS`]
/// (which may appear inside `$expr`).
pub const QUERY_OPERATORS: &[&str] = &[
    "$all", "$and", "$box", "$caseSensitive", "$center", "$centerSphere", "$comment",
    "$diacriticSensitive", "$elemMatch", "$eq", "$exists", "$expr", "$geoIntersects",
    "$geometry", "$geoWithin", "$gt", "$gte", "$in", "$language", "$lt", "$lte",
    "$maxDistance", "$minDistance", "$mod", "$ne", "$near", "$nearSphere", "$nin", "$nor",
    "$not", "$options", "$or", "$polygon", "$regex", "$search", "$size", "$text", "$type",
];

/// Store system variables, referenced as `$$NAME`.
pub const SYSTEM_VARIABLES: &[&str] = &[
    "ROOT", "CURRENT", "REMOVE", "DESCEND", "PRUNE", "KEEP", "NOW", "CLUSTER_TIME",
    "SEARCH_META", "USER_ROLES",
];

/// A `$`-prefixed token found in a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `$name`: an operator or a field reference. Holds the text including the `$`.
    Dollar(&'a str),
    /// `$$name`: a variable reference. Holds the name without the dollars.
    Variable(&'a str),
}

/// Returns every `$`-prefixed token in `text`, in order of appearance.
pub fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    TOKEN.find_iter(text).map(|found| {
        let token = found.as_str();
        let name = token.trim_start_matches('$');
        if token.len() - name.len() > 1 {
            Token::Variable(name)
        } else {
            Token::Dollar(token)
        }
    })
}

/// Which family of fragments a grammar validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarKind {
    Projection,
    Query,
}

/// A fixed allow-list of operators plus the rules for field and variable references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grammar {
    kind: GrammarKind,
}

impl Grammar {
    /// Grammar for raw projections.
    pub fn projection() -> Self {
        Self { kind: GrammarKind::Projection }
    }

    /// Grammar for query filter fragments.
    pub fn query() -> Self {
        Self { kind: GrammarKind::Query }
    }

    pub fn kind(&self) -> GrammarKind {
        self.kind
    }

    /// Returns `true` if `operator` (including its `$`) is on this grammar's allow-list.
    pub fn is_allowed_operator(&self, operator: &str) -> bool {
        match self.kind {
            GrammarKind::Projection => PROJECTION_OPERATORS.contains(&operator),
            GrammarKind::Query => {
                QUERY_OPERATORS.contains(&operator) || PROJECTION_OPERATORS.contains(&operator)
            }
        }
    }

    /// Validates every token of `text`. `readable` decides which field names may be
    /// referenced as `$field`.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidRequest`] naming the first rejected token.
    pub fn validate_str<F>(&self, text: &str, readable: &F) -> CrudResult<()>
    where
        F: Fn(&str) -> bool,
    {
        for token in tokens(text) {
            match token {
                Token::Variable(name) if SYSTEM_VARIABLES.contains(&name) => {
                    return Err(CrudError::invalid_request(format!(
                        "system variable $${name} is not allowed",
                    )));
                }
                Token::Variable(name) => {
                    return Err(CrudError::invalid_request(format!(
                        "variable $${name} is not allowed",
                    )));
                }
                Token::Dollar(operator) if self.is_allowed_operator(operator) => {}
                Token::Dollar(reference) if readable(&reference[1..]) => {}
                Token::Dollar(other) => {
                    return Err(CrudError::invalid_request(format!(
                        "operator {other} is not allowed",
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validates every key and string value of a parsed fragment, recursively.
    pub fn validate_object<F>(&self, object: &Map<String, Value>, readable: &F) -> CrudResult<()>
    where
        F: Fn(&str) -> bool,
    {
        for (key, value) in object {
            self.validate_str(key, readable)?;
            self.validate_value(value, readable)?;
        }

        Ok(())
    }

    fn validate_value<F>(&self, value: &Value, readable: &F) -> CrudResult<()>
    where
        F: Fn(&str) -> bool,
    {
        match value {
            Value::String(s) => self.validate_str(s, readable),
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| self.validate_value(item, readable)),
            Value::Object(object) => self.validate_object(object, readable),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        }
    }
}
