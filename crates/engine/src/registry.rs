//! Named store registry (§9 "globally mutable singletons... becomes an
//! explicit named store registry"): host code creates one of these at
//! program start and looks a store up by name, rather than relying on
//! module-level static state.

use crate::database::Database;
use emberstore_core::{EmberError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A process-scoped table of open [`Database`] handles, keyed by name.
/// Entirely owned by whoever constructs it — there is no global instance.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<Database>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `database` under `name`, replacing any prior entry.
    pub fn register(&self, name: impl Into<String>, database: Arc<Database>) {
        self.stores.write().insert(name.into(), database);
    }

    /// Look up a previously registered store.
    pub fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.stores.read().get(name).cloned()
    }

    /// Remove and return a previously registered store.
    pub fn remove(&self, name: &str) -> Option<Arc<Database>> {
        self.stores.write().remove(name)
    }

    /// Names of every currently registered store.
    pub fn names(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }

    /// Look up a store, failing with [`EmberError::NotFound`] if absent.
    pub fn require(&self, name: &str) -> Result<Arc<Database>> {
        self.get(name).ok_or_else(|| EmberError::NotFound(format!("no store registered under {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use tempfile::tempdir;

    #[test]
    fn register_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::init(EngineOptions::new(dir.path().join("db"))).unwrap());
        let registry = StoreRegistry::new();
        registry.register("primary", db.clone());
        assert!(Arc::ptr_eq(&registry.get("primary").unwrap(), &db));
    }

    #[test]
    fn require_on_missing_name_is_not_found() {
        let registry = StoreRegistry::new();
        assert!(matches!(registry.require("missing"), Err(EmberError::NotFound(_))));
    }

    #[test]
    fn remove_drops_the_entry() {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::init(EngineOptions::new(dir.path().join("db"))).unwrap());
        let registry = StoreRegistry::new();
        registry.register("primary", db);
        assert!(registry.remove("primary").is_some());
        assert!(registry.get("primary").is_none());
    }
}
