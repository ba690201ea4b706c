//! Namespaced document model over the key/value store (§4.5).
//!
//! A collection is a view over keys prefixed `<name>::`. Ids are assigned
//! monotonically within the process, seeded on construction by scanning
//! the namespace so a restart never reuses an id still present on disk.

use crate::query;
use crate::schema::Schema;
use emberstore_core::{merge_patch, set_at_path, EmberError, Path, Result, Value};
use emberstore_storage::Store;
use std::str::FromStr;

const ID_FIELD: &str = "_id";

/// A view over one namespace of the store, with optional schema
/// enforcement and document-oriented operations.
pub struct Collection<'a> {
    store: &'a mut Store,
    name: String,
    next_id: u64,
    schema: Option<Schema>,
}

impl<'a> Collection<'a> {
    /// Open a view over `name`, scanning existing keys to seed the id
    /// sequence past whatever is already on disk.
    pub fn new(store: &'a mut Store, name: impl Into<String>) -> Self {
        let name = name.into();
        let prefix = format!("{name}::");
        let next_id = store
            .all()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(1);
        Collection { store, name, next_id, schema: None }
    }

    /// Attach schema validation; every subsequent `insert`/`update` on this
    /// handle is checked against `rules` first.
    pub fn schema(mut self, rules: Schema) -> Self {
        self.schema = Some(rules);
        self
    }

    fn key_for(&self, id: u64) -> String {
        format!("{}::{id}", self.name)
    }

    fn prefix(&self) -> String {
        format!("{}::", self.name)
    }

    fn validate(&self, doc: &Value) -> Result<()> {
        if let Some(schema) = &self.schema {
            schema.validate(doc)?;
        }
        Ok(())
    }

    /// Insert `doc`, assigning it the next id in sequence. Sets `_id` on
    /// the stored document to the full `<collection>::<id>` key. Fails
    /// without writing anything if `doc` violates the attached schema.
    pub fn insert(&mut self, mut doc: Value) -> Result<String> {
        self.validate(&doc)?;
        let key = self.key_for(self.next_id);
        self.next_id += 1;
        set_id_field(&mut doc, &key);
        self.store.set(&key, doc, None)?;
        Ok(key)
    }

    /// Insert every document in `docs`. All documents are validated before
    /// any is written, so a single invalid document aborts the whole
    /// batch with no partial state.
    pub fn insert_many(&mut self, docs: Vec<Value>) -> Result<Vec<String>> {
        for doc in &docs {
            self.validate(doc)?;
        }
        docs.into_iter().map(|doc| self.insert(doc)).collect()
    }

    /// All documents in this namespace matching `query`.
    pub fn find(&self, query: &Value) -> Vec<(String, Value)> {
        let prefix = self.prefix();
        self.store
            .all()
            .into_iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .filter(|(_, v)| query::matches(query, v))
            .collect()
    }

    /// The first document matching `query`, if any.
    pub fn find_one(&self, query: &Value) -> Option<(String, Value)> {
        self.find(query).into_iter().next()
    }

    /// Apply `patch` to the first document matching `query`. `patch` may
    /// contain a top-level `$set` object naming only the fields to
    /// overwrite; otherwise it is applied as an RFC 7396 merge over the
    /// whole document. Returns `true` if a document was updated.
    pub fn update(&mut self, query: &Value, patch: &Value) -> Result<bool> {
        let Some((key, mut doc)) = self.find_one(query) else { return Ok(false) };
        apply_patch(&mut doc, patch)?;
        self.validate(&doc)?;
        self.store.set(&key, doc, None)?;
        Ok(true)
    }

    /// Apply `patch` to every document matching `query`. Every updated
    /// document is validated before any write; the first violation aborts
    /// the whole batch with no partial state.
    pub fn update_many(&mut self, query: &Value, patch: &Value) -> Result<usize> {
        let matched = self.find(query);
        let mut updated = Vec::with_capacity(matched.len());
        for (key, mut doc) in matched {
            apply_patch(&mut doc, patch)?;
            self.validate(&doc)?;
            updated.push((key, doc));
        }
        let count = updated.len();
        for (key, doc) in updated {
            self.store.set(&key, doc, None)?;
        }
        Ok(count)
    }

    /// Remove the first document matching `query`. Returns `true` if one
    /// was removed.
    pub fn remove(&mut self, query: &Value) -> Result<bool> {
        let Some((key, _)) = self.find_one(query) else { return Ok(false) };
        self.store.delete(&key)
    }

    /// Remove every document matching `query`, returning how many were
    /// removed.
    pub fn remove_many(&mut self, query: &Value) -> Result<usize> {
        let keys: Vec<String> = self.find(query).into_iter().map(|(k, _)| k).collect();
        let mut removed = 0;
        for key in keys {
            if self.store.delete(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of documents matching `query` (pass `&Value::object()` to
    /// count every document in the namespace).
    pub fn count(&self, query: &Value) -> usize {
        self.find(query).len()
    }

    /// Remove every document in this namespace and reset the id sequence.
    pub fn drop(&mut self) -> Result<usize> {
        let prefix = self.prefix();
        let keys: Vec<String> = self.store.all().into_keys().filter(|k| k.starts_with(&prefix)).collect();
        let mut removed = 0;
        for key in keys {
            if self.store.delete(&key)? {
                removed += 1;
            }
        }
        self.next_id = 1;
        Ok(removed)
    }
}

fn set_id_field(doc: &mut Value, key: &str) {
    if let Some(object) = doc.as_json_mut().as_object_mut() {
        object.insert(ID_FIELD.to_string(), serde_json::Value::String(key.to_string()));
    }
}

fn apply_patch(doc: &mut Value, patch: &Value) -> Result<()> {
    let set_fields = patch.as_json().as_object().and_then(|o| o.get("$set")).and_then(|v| v.as_object());
    match set_fields {
        Some(fields) => {
            for (field, value) in fields {
                let path = Path::from_str(field).map_err(|e| EmberError::validation(e.to_string()))?;
                set_at_path(doc, &path, Value::from_json(value.clone())).map_err(|e| EmberError::validation(e.to_string()))?;
            }
        }
        None => merge_patch(doc, patch),
    }
    Ok(())
}
