//! Index manager: owns every registered secondary index and keeps them in
//! sync with store writes (§4.3 "Maintenance protocol").

use crate::hash::HashIndex;
use crate::kind::{IndexKind, Operator, Term};
use crate::range::RangeIndex;
use crate::text::TextIndex;
use emberstore_core::{get_at_path, Path, Value};
use std::collections::HashMap;
use std::str::FromStr;

enum Instance {
    Hash(HashIndex),
    Range(RangeIndex),
    Text(TextIndex),
}

/// One registered secondary index, identified by `(field path, kind)`.
struct Registered {
    path: Path,
    instance: Instance,
}

/// Owns every secondary index and dispatches maintenance and queries to
/// them. Field paths are stored as their original dotted string so callers
/// (the query engine) can look an index up without re-parsing.
#[derive(Default)]
pub struct IndexManager {
    indexes: HashMap<(String, IndexKind), Registered>,
}

impl IndexManager {
    /// An empty manager (no indexes registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new index on `field` of `kind`, then populate it from
    /// `snapshot` in fixed-size batches (§4.3 "Creation"). The index is not
    /// inserted into the manager until the build completes, so concurrent
    /// lookups never see a partially built index.
    pub fn create_index(&mut self, field: &str, kind: IndexKind, snapshot: &HashMap<String, Value>) -> Result<(), emberstore_core::EmberError> {
        let path = Path::from_str(field).map_err(|e| emberstore_core::EmberError::validation(e.to_string()))?;
        let mut instance = match kind {
            IndexKind::Hash => Instance::Hash(HashIndex::new()),
            IndexKind::Range => Instance::Range(RangeIndex::new()),
            IndexKind::Text => Instance::Text(TextIndex::new()),
        };

        const BATCH_SIZE: usize = 256;
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        for (key, value) in snapshot.iter() {
            batch.push((key, value));
            if batch.len() == BATCH_SIZE {
                Self::populate_batch(&mut instance, &path, &batch);
                batch.clear();
            }
        }
        Self::populate_batch(&mut instance, &path, &batch);

        self.indexes.insert((field.to_string(), kind), Registered { path, instance });
        Ok(())
    }

    fn populate_batch(instance: &mut Instance, path: &Path, batch: &[(&String, &Value)]) {
        for (key, value) in batch {
            if let Some(projected) = get_at_path(value, path) {
                Self::insert_one(instance, key, projected);
            }
        }
    }

    /// Drop the index on `(field, kind)` if registered.
    pub fn drop_index(&mut self, field: &str, kind: IndexKind) {
        self.indexes.remove(&(field.to_string(), kind));
    }

    /// True if `(field, kind)` is currently registered.
    pub fn has_index(&self, field: &str, kind: IndexKind) -> bool {
        self.indexes.contains_key(&(field.to_string(), kind))
    }

    /// Every `(field, kind)` pair currently registered.
    pub fn list(&self) -> Vec<(String, IndexKind)> {
        self.indexes.keys().cloned().collect()
    }

    fn insert_one(instance: &mut Instance, key: &str, projected: &Value) {
        match instance {
            Instance::Hash(h) => {
                if let Some(term) = Term::from_value(projected) {
                    h.insert(term, key.to_string());
                }
            }
            Instance::Range(r) => {
                if let Some(term) = Term::from_value(projected) {
                    if r.accepts(&term) {
                        r.insert(term, key.to_string());
                    }
                }
            }
            Instance::Text(t) => {
                if let Some(s) = projected.as_json().as_str() {
                    t.insert(key, s);
                }
            }
        }
    }

    fn remove_one(instance: &mut Instance, key: &str, projected: &Value) {
        match instance {
            Instance::Hash(h) => {
                if let Some(term) = Term::from_value(projected) {
                    h.remove(&term, key);
                }
            }
            Instance::Range(r) => {
                if let Some(term) = Term::from_value(projected) {
                    r.remove(&term, key);
                }
            }
            Instance::Text(t) => {
                t.remove(key);
            }
        }
    }

    /// Called after every successful store write with `(key, new, old)`.
    /// For each registered index: remove `key` from the bucket for the old
    /// projection (if defined), and add it to the bucket for the new
    /// projection (if defined and type-compatible). Never fails — a
    /// type-incompatible value just silently stays out of the index (B3).
    pub fn maintain(&mut self, key: &str, new_value: Option<&Value>, old_value: Option<&Value>) {
        for registered in self.indexes.values_mut() {
            if let Some(old) = old_value {
                if let Some(projected) = get_at_path(old, &registered.path) {
                    Self::remove_one(&mut registered.instance, key, projected);
                }
            }
            if let Some(new) = new_value {
                if let Some(projected) = get_at_path(new, &registered.path) {
                    Self::insert_one(&mut registered.instance, key, projected);
                }
            }
        }
    }

    /// Dispatch `field op value` to a registered compatible index. Returns
    /// `None` if no index covers `(field, an operator-supporting kind)` —
    /// the caller should fall back to a full scan. Never returns `Err`;
    /// `IndexUnsupported` is a fallback signal, not a failure (§7).
    pub fn query(&self, field: &str, op: Operator, value: &Value) -> Option<Vec<String>> {
        if op == Operator::In {
            let Some(registered) = self.indexes.get(&(field.to_string(), IndexKind::Hash)) else { return None };
            let Instance::Hash(h) = &registered.instance else { return None };
            let candidates = value.as_json().as_array()?;
            let mut keys = std::collections::HashSet::new();
            for candidate in candidates {
                if let Some(term) = Term::from_value(&Value::from_json(candidate.clone())) {
                    keys.extend(h.lookup_eq(&term));
                }
            }
            return Some(keys.into_iter().collect());
        }

        let term = Term::from_value(value);
        for kind in [IndexKind::Hash, IndexKind::Range, IndexKind::Text] {
            if !kind.supports(op) {
                continue;
            }
            let Some(registered) = self.indexes.get(&(field.to_string(), kind)) else { continue };
            return Some(match (&registered.instance, term.as_ref()) {
                (Instance::Hash(h), Some(t)) => h.lookup_eq(t),
                (Instance::Range(r), Some(t)) => r.query(op, t),
                (Instance::Text(t), _) => {
                    let needle = value.as_json().as_str().unwrap_or_default().to_lowercase();
                    match op {
                        Operator::Contains => t.contains(&needle),
                        Operator::StartsWith => t.starts_with(&needle),
                        Operator::EndsWith => t.ends_with(&needle),
                        _ => return None,
                    }
                }
                _ => return None,
            });
        }
        tracing::debug!(field, "no index covers this operator, falling back to scan");
        None
    }
}
