//! Aggregations over a matched set: `count`, `sum`, `avg`, `min`, `max`,
//! `group_by` (§4.4). All numeric aggregations project the field via dot
//! path and silently skip documents where the projection is missing or
//! non-numeric.

use emberstore_core::{get_at_path, Path, Value};
use std::collections::HashMap;
use std::str::FromStr;

/// Number of matched documents.
pub fn count(entries: &[(String, Value)]) -> usize {
    entries.len()
}

/// Sum of the numeric values at `field` across matched documents.
pub fn sum(entries: &[(String, Value)], field: &str) -> f64 {
    numeric_values(entries, field).sum()
}

/// Arithmetic mean of the numeric values at `field`, or `None` if no
/// document projects a number there.
pub fn avg(entries: &[(String, Value)], field: &str) -> Option<f64> {
    let values: Vec<f64> = numeric_values(entries, field).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Smallest numeric value at `field`, or `None` if no document qualifies.
pub fn min(entries: &[(String, Value)], field: &str) -> Option<f64> {
    numeric_values(entries, field).fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.min(v))))
}

/// Largest numeric value at `field`, or `None` if no document qualifies.
pub fn max(entries: &[(String, Value)], field: &str) -> Option<f64> {
    numeric_values(entries, field).fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

/// Partition matched documents by the string representation of their value
/// at `field`. Documents where `field` is absent are grouped under `""`.
pub fn group_by(entries: &[(String, Value)], field: &str) -> HashMap<String, Vec<(String, Value)>> {
    let path = Path::from_str(field).unwrap_or_default();
    let mut groups: HashMap<String, Vec<(String, Value)>> = HashMap::new();
    for (key, value) in entries {
        let group_key = get_at_path(value, &path).map(group_key_of).unwrap_or_default();
        groups.entry(group_key).or_default().push((key.clone(), value.clone()));
    }
    groups
}

fn group_key_of(value: &Value) -> String {
    match value.as_json() {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn numeric_values<'a>(entries: &'a [(String, Value)], field: &'a str) -> impl Iterator<Item = f64> + 'a {
    let path = Path::from_str(field).unwrap_or_default();
    entries.iter().filter_map(move |(_, v)| get_at_path(v, &path).and_then(|p| p.as_f64()))
}
