//! The document store's value type: any JSON-serialisable tree.
//!
//! `Value` is a thin newtype over [`serde_json::Value`]. Keeping the wire
//! representation identical to JSON means the WAL and snapshot encodings
//! (§4.1) can serialise a `Value` directly with no intermediate conversion,
//! and the dot-path projection in [`crate::path`] operates on exactly the
//! shape callers construct their documents with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used for TTL expiry timestamps and replication `ts` fields.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Any JSON-serialisable tree: scalars, ordered sequences, or string-keyed
/// maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Value(serde_json::Value);

impl Value {
    /// The `null` value.
    pub fn null() -> Self {
        Value(serde_json::Value::Null)
    }

    /// An empty object.
    pub fn object() -> Self {
        Value(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// An empty array.
    pub fn array() -> Self {
        Value(serde_json::Value::Array(Vec::new()))
    }

    /// An array built from `items`, used by callers (e.g. the store's
    /// `push`) that assemble a `Vec<Value>` without wanting a direct
    /// dependency on `serde_json`.
    pub fn from_array(items: Vec<Value>) -> Self {
        Value(serde_json::Value::Array(items.into_iter().map(Value::into_json).collect()))
    }

    /// Wrap an existing `serde_json::Value`.
    pub fn from_json(value: serde_json::Value) -> Self {
        Value(value)
    }

    /// Unwrap into the underlying `serde_json::Value`.
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// This value's array elements, or an empty `Vec` if it isn't an array.
    pub fn into_array(self) -> Vec<Value> {
        match self.0 {
            serde_json::Value::Array(items) => items.into_iter().map(Value::from_json).collect(),
            _ => Vec::new(),
        }
    }

    /// Borrow the underlying `serde_json::Value`.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Mutably borrow the underlying `serde_json::Value`.
    pub fn as_json_mut(&mut self) -> &mut serde_json::Value {
        &mut self.0
    }

    /// True if this value is `null`.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// True if this value is an object.
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// Number coercion used by aggregations, range-index projection, and the
    /// `add`/`subtract` store helpers. Non-numeric values (including
    /// missing/null) coerce to `None`, letting callers decide whether that
    /// means "skip" (aggregations) or "treat as zero" (`add`/`subtract`,
    /// per §9's open-question resolution).
    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    /// Approximate encoded size in bytes, used for size-limit enforcement.
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(&self.0).map(|v| v.len()).unwrap_or(0)
    }

    /// Recursive nesting depth (an object/array containing only scalars is
    /// depth 1).
    pub fn nesting_depth(&self) -> usize {
        fn depth(v: &serde_json::Value) -> usize {
            match v {
                serde_json::Value::Array(items) => {
                    1 + items.iter().map(depth).max().unwrap_or(0)
                }
                serde_json::Value::Object(map) => {
                    1 + map.values().map(depth).max().unwrap_or(0)
                }
                _ => 0,
            }
        }
        depth(&self.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value(value)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value(b.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value(serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        for v in [Value::from(42i64), Value::from(3.5), Value::from("hi"), Value::from(true), Value::null()] {
            let encoded = serde_json::to_string(&v).unwrap();
            let decoded: Value = serde_json::from_str(&encoded).unwrap();
            assert_eq!(v, decoded);
        }
    }

    #[test]
    fn as_f64_coerces_numeric_only() {
        assert_eq!(Value::from(7i64).as_f64(), Some(7.0));
        assert_eq!(Value::from("seven").as_f64(), None);
        assert_eq!(Value::null().as_f64(), None);
    }

    #[test]
    fn nesting_depth_counts_containers_only() {
        assert_eq!(Value::from(1i64).nesting_depth(), 0);
        let nested: Value = serde_json::json!({"a": {"b": [1, 2, 3]}}).into();
        assert_eq!(nested.nesting_depth(), 3);
    }

    #[test]
    fn object_and_array_constructors() {
        assert!(Value::object().is_object());
        assert!(!Value::array().is_object());
        assert!(Value::null().is_null());
    }
}
