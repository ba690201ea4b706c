//! The state behind the engine's single writer critical section (§5):
//! shared between [`crate::database::Database`]'s public methods and the
//! background tasks in [`crate::background`].

use emberstore_collection::Schema;
use emberstore_index::IndexManager;
use emberstore_query::QueryEngine;
use emberstore_replication::Replicator;
use emberstore_storage::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Inner {
    pub(crate) store: Store,
    pub(crate) indexes: Arc<Mutex<IndexManager>>,
    pub(crate) query: QueryEngine,
    pub(crate) replicator: Arc<Mutex<Option<Replicator>>>,
    pub(crate) collections: HashMap<String, Schema>,
}
