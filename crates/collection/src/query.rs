//! Mongo-style query matching for collection documents (§4.5 "Query
//! match"): scalar equality, or a per-field object of `$gt`, `$gte`, `$lt`,
//! `$lte`, `$ne`, `$in` operators combined with logical AND.

use emberstore_core::{get_at_path, Path, Value};
use std::str::FromStr;

/// True if `doc` satisfies every field constraint in `query`. A `query`
/// that is not a JSON object matches nothing.
pub fn matches(query: &Value, doc: &Value) -> bool {
    let Some(fields) = query.as_json().as_object() else { return false };
    fields.iter().all(|(field, constraint)| {
        let path = Path::from_str(field).unwrap_or_default();
        let projected = get_at_path(doc, &path);
        matches_field(projected, constraint)
    })
}

fn matches_field(projected: Option<&Value>, constraint: &serde_json::Value) -> bool {
    match constraint.as_object() {
        Some(ops) if is_operator_object(ops) => ops.iter().all(|(op, operand)| matches_operator(projected, op, operand)),
        _ => projected.map(|p| p.as_json() == constraint).unwrap_or(false),
    }
}

fn is_operator_object(ops: &serde_json::Map<String, serde_json::Value>) -> bool {
    !ops.is_empty() && ops.keys().all(|k| k.starts_with('$'))
}

fn matches_operator(projected: Option<&Value>, op: &str, operand: &serde_json::Value) -> bool {
    match op {
        "$ne" => projected.map(|p| p.as_json() != operand).unwrap_or(true),
        "$in" => match (projected, operand.as_array()) {
            (Some(p), Some(candidates)) => candidates.contains(p.as_json()),
            _ => false,
        },
        "$gt" | "$gte" | "$lt" | "$lte" => match projected {
            Some(p) => compare(op, p.as_json(), operand),
            None => false,
        },
        _ => {
            tracing::warn!(op, "unrecognised query operator, treating as non-match");
            false
        }
    }
}

fn compare(op: &str, actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return match op {
            "$gt" => a > b,
            "$gte" => a >= b,
            "$lt" => a < b,
            "$lte" => a <= b,
            _ => unreachable!(),
        };
    }
    if let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) {
        return match op {
            "$gt" => a > b,
            "$gte" => a >= b,
            "$lt" => a < b,
            "$lte" => a <= b,
            _ => unreachable!(),
        };
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(age: i64, role: &str) -> Value {
        Value::from_json(serde_json::json!({"age": age, "role": role}))
    }

    #[test]
    fn scalar_equality_matches_exact_field() {
        let query = Value::from_json(serde_json::json!({"role": "admin"}));
        assert!(matches(&query, &doc(30, "admin")));
        assert!(!matches(&query, &doc(30, "user")));
    }

    #[test]
    fn gte_operator_matches_inclusive_bound() {
        let query = Value::from_json(serde_json::json!({"age": {"$gte": 30}}));
        assert!(matches(&query, &doc(30, "admin")));
        assert!(!matches(&query, &doc(29, "admin")));
    }

    #[test]
    fn ne_operator_excludes_value() {
        let query = Value::from_json(serde_json::json!({"role": {"$ne": "admin"}}));
        assert!(matches(&query, &doc(30, "user")));
        assert!(!matches(&query, &doc(30, "admin")));
    }

    #[test]
    fn in_operator_checks_membership() {
        let query = Value::from_json(serde_json::json!({"age": {"$in": [20, 30]}}));
        assert!(matches(&query, &doc(30, "admin")));
        assert!(!matches(&query, &doc(25, "admin")));
    }

    #[test]
    fn multiple_fields_combine_with_and() {
        let query = Value::from_json(serde_json::json!({"age": {"$gte": 18}, "role": "admin"}));
        assert!(matches(&query, &doc(30, "admin")));
        assert!(!matches(&query, &doc(30, "user")));
    }
}
