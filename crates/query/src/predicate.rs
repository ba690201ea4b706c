//! Tagged query AST: `where(field, op, value)` compiles into a
//! [`WhereClause`] the executor can either hand to the index manager or use
//! directly as a scan predicate (§4.4, §9 redesign of dynamic predicate
//! metadata into an explicit structure).

use emberstore_core::{get_at_path, EmberError, Path, Result, Value};
use emberstore_index::Operator;
use std::str::FromStr;

/// A compiled `where` clause: a field path, an operator, and the operand to
/// compare against.
#[derive(Debug, Clone)]
pub struct WhereClause {
    /// Original dotted field name, as given by the caller.
    pub field: String,
    /// Parsed projection path for `field`.
    pub path: Path,
    /// Comparison operator.
    pub op: Operator,
    /// Operand to compare against.
    pub value: Value,
}

impl WhereClause {
    /// Parse `field` and assemble the clause.
    pub fn compile(field: &str, op: Operator, value: Value) -> Result<Self> {
        let path = Path::from_str(field).map_err(|e| EmberError::validation(e.to_string()))?;
        Ok(WhereClause { field: field.to_string(), path, op, value })
    }

    /// Evaluate the clause against a document. A field that is absent or
    /// type-incompatible never matches (B2: an empty result, not an error).
    pub fn matches(&self, candidate: &Value) -> bool {
        let Some(projected) = get_at_path(candidate, &self.path) else { return false };
        operator_matches(self.op, projected, &self.value)
    }
}

fn operator_matches(op: Operator, actual: &Value, expected: &Value) -> bool {
    match op {
        Operator::Eq => actual.as_json() == expected.as_json(),
        Operator::Ne => actual.as_json() != expected.as_json(),
        Operator::In => expected.as_json().as_array().map(|arr| arr.contains(actual.as_json())).unwrap_or(false),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => compare(op, actual, expected),
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => text_match(op, actual, expected),
    }
}

fn compare(op: Operator, actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return match op {
            Operator::Gt => a > b,
            Operator::Gte => a >= b,
            Operator::Lt => a < b,
            Operator::Lte => a <= b,
            _ => unreachable!(),
        };
    }
    if let (Some(a), Some(b)) = (actual.as_json().as_str(), expected.as_json().as_str()) {
        return match op {
            Operator::Gt => a > b,
            Operator::Gte => a >= b,
            Operator::Lt => a < b,
            Operator::Lte => a <= b,
            _ => unreachable!(),
        };
    }
    false
}

fn text_match(op: Operator, actual: &Value, expected: &Value) -> bool {
    let (Some(haystack), Some(needle)) = (actual.as_json().as_str(), expected.as_json().as_str()) else {
        return false;
    };
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    match op {
        Operator::Contains => haystack.contains(&needle),
        Operator::StartsWith => haystack.starts_with(&needle),
        Operator::EndsWith => haystack.ends_with(&needle),
        _ => unreachable!(),
    }
}
