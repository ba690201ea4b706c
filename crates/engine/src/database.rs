//! The embeddable engine facade (§6 "Embedded API"): wires the store,
//! secondary indexes, query engine, collections, and replication behind
//! one writer critical section (§5).

use crate::config::EngineOptions;
use crate::inner::Inner;
use crate::interceptor::{InterceptorChain, PostRead, PostWrite, PreRead, PreReadOutcome, PreWrite, PreWriteOutcome};
use emberstore_collection::{Collection, Schema};
use emberstore_core::{now_millis, Result, Value};
use emberstore_index::{IndexKind, IndexManager, Operator};
use emberstore_query::{aggregate, QueryEngine, ResultPipeline};
use emberstore_replication::{ApplyOutcome, ConflictEntry, Envelope, Replicator, Role};
use emberstore_storage::{EventCallback, Stats, Store, StoreOptions, SubscriptionId, WatchCallback, WatcherId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Reserved internal key the conflict log is persisted under (§4.6
/// "Every conflict is appended to a bounded conflict log persisted under
/// a reserved internal key"). `_`-prefixed keys are excluded from
/// replication, so this never round-trips back out to a follower.
const CONFLICT_LOG_KEY: &str = "_conflict_log";
/// Matches `ConflictLog`'s in-memory capacity so the persisted log
/// doesn't grow unbounded.
const CONFLICT_LOG_CAPACITY: usize = 100;

/// A status snapshot of the replication subsystem.
#[derive(Debug, Clone)]
pub struct ReplicationStatus {
    pub role: Option<Role>,
    pub node_id: Option<String>,
    pub health: HashMap<String, emberstore_replication::FollowerHealth>,
    pub conflicts_logged: usize,
}

/// The top-level handle a host process opens and holds for the life of
/// the store. `init`/`close` bracket the background tasks (§5
/// "Background tasks"); every other method locks the single writer
/// critical section for its duration.
pub struct Database {
    inner: Arc<Mutex<Inner>>,
    background: crate::background::BackgroundTasks,
    interceptors: Mutex<InterceptorChain>,
}

impl Database {
    /// Open (or recover) the store at `options.base_path` and start the
    /// TTL sweep, compaction, and (if configured) heartbeat background
    /// tasks.
    pub fn init(options: EngineOptions) -> Result<Self> {
        let store_options = StoreOptions {
            base_path: options.base_path.clone(),
            durability_mode: options.durability_mode,
            cache_limit: options.cache_limit,
            backup_retention: options.backup_retention,
            limits: emberstore_core::Limits::default(),
        };
        let mut store = Store::open(store_options)?;

        let indexes = Arc::new(Mutex::new(IndexManager::new()));
        let replicator = Arc::new(Mutex::new(match options.replication {
            Some(repl_options) => Some(Replicator::new(repl_options)?),
            None => None,
        }));

        let idx_hook = indexes.clone();
        store.add_mutation_hook(Box::new(move |key, new, old| {
            idx_hook.lock().maintain(key, new, old);
        }));

        let repl_hook = replicator.clone();
        store.add_mutation_hook(Box::new(move |key, new, _old| {
            let mut guard = repl_hook.lock();
            if let Some(replicator) = guard.as_mut() {
                if !replicator.role().is_primary() {
                    return;
                }
                let node_id = replicator.node_id().to_string();
                let envelope = match new {
                    Some(value) => Envelope::set(key, value.clone(), now_millis(), node_id),
                    None => Envelope::delete(key, now_millis(), node_id),
                };
                replicator.broadcast(&envelope);
            }
        }));

        tracing::info!(path = %options.base_path.display(), "store opened");

        let inner = Arc::new(Mutex::new(Inner { store, indexes, query: QueryEngine::new(), replicator, collections: HashMap::new() }));
        let background = crate::background::BackgroundTasks::spawn(
            inner.clone(),
            options.save_interval,
            options.ttl_sweep_interval,
            options.heartbeat_interval,
        );
        Ok(Database { inner, background, interceptors: Mutex::new(InterceptorChain::new()) })
    }

    /// Register a pre-write interceptor (§9): runs before the WAL append,
    /// may transform the value or veto the write.
    pub fn add_pre_write(&self, interceptor: Box<dyn PreWrite>) {
        self.interceptors.lock().add_pre_write(interceptor);
    }

    /// Register a post-write interceptor: runs after the write is durable.
    pub fn add_post_write(&self, interceptor: Box<dyn PostWrite>) {
        self.interceptors.lock().add_post_write(interceptor);
    }

    /// Register a pre-read interceptor: may veto a `get` before it touches
    /// the store.
    pub fn add_pre_read(&self, interceptor: Box<dyn PreRead>) {
        self.interceptors.lock().add_pre_read(interceptor);
    }

    /// Register a post-read interceptor: may transform a value before it
    /// reaches the caller of `get`.
    pub fn add_post_read(&self, interceptor: Box<dyn PostRead>) {
        self.interceptors.lock().add_post_read(interceptor);
    }

    /// Fail with [`EmberError::ConstraintViolation`] if this node is a
    /// replica: §4.6 "A replica MUST reject local writes that originate
    /// from its own public write API." `apply_op` bypasses this by writing
    /// through `inner.store` directly rather than through these methods.
    fn reject_if_replica(&self) -> Result<()> {
        let is_replica = self.inner.lock().replicator.lock().as_ref().map(|r| r.role().is_replica()).unwrap_or(false);
        if is_replica {
            return Err(emberstore_core::EmberError::constraint_violation(
                "this node is a replica; writes must arrive through apply_op",
            ));
        }
        Ok(())
    }

    /// Write `key = value`, optionally with a TTL. Traverses the pre-write
    /// and post-write interceptor chains (§9).
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.reject_if_replica()?;
        let value = match self.interceptors.lock().apply_pre_write(key, value) {
            PreWriteOutcome::Continue(v) => v,
            PreWriteOutcome::Veto(e) => return Err(e),
        };
        self.inner.lock().store.set(key, value.clone(), ttl)?;
        self.interceptors.lock().apply_post_write(key, &value);
        Ok(())
    }

    /// Read `key`, if present. Traverses the pre-read and post-read
    /// interceptor chains (§9); a pre-read veto reads as absence.
    pub fn get(&self, key: &str) -> Option<Value> {
        if matches!(self.interceptors.lock().apply_pre_read(key), PreReadOutcome::Veto) {
            return None;
        }
        let value = self.inner.lock().store.get(key)?;
        Some(self.interceptors.lock().apply_post_read(key, value))
    }

    /// Delete `key`. Returns `false` if it was absent.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.reject_if_replica()?;
        self.inner.lock().store.delete(key)
    }

    /// True if `key` is present (ignoring cache state).
    pub fn has(&self, key: &str) -> bool {
        self.inner.lock().store.has(key)
    }

    /// Every key/value pair currently in the store.
    pub fn all(&self) -> HashMap<String, Value> {
        self.inner.lock().store.all()
    }

    /// Remove every key.
    pub fn clear(&self) -> Result<()> {
        self.reject_if_replica()?;
        self.inner.lock().store.clear()
    }

    /// Set or clear `key`'s TTL without changing its value.
    pub fn expire(&self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        self.reject_if_replica()?;
        self.inner.lock().store.expire(key, ttl)
    }

    /// Add `delta` to the numeric value at `key` (missing/non-numeric
    /// coerces to 0), returning the new value.
    pub fn add(&self, key: &str, delta: f64) -> Result<f64> {
        self.reject_if_replica()?;
        self.inner.lock().store.add(key, delta)
    }

    /// Subtract `delta` from the numeric value at `key`.
    pub fn subtract(&self, key: &str, delta: f64) -> Result<f64> {
        self.reject_if_replica()?;
        self.inner.lock().store.subtract(key, delta)
    }

    /// Append `value` to the array at `key`, creating it if absent.
    pub fn push(&self, key: &str, value: Value) -> Result<Value> {
        self.reject_if_replica()?;
        self.inner.lock().store.push(key, value)
    }

    /// Remove every occurrence of `value` from the array at `key`.
    pub fn pull(&self, key: &str, value: Value) -> Result<Value> {
        self.reject_if_replica()?;
        self.inner.lock().store.pull(key, value)
    }

    /// Register a watcher on `key`, invoked synchronously after writes
    /// to it.
    pub fn watch(&self, key: &str, cb: WatchCallback) -> WatcherId {
        self.inner.lock().store.watch(key, cb)
    }

    /// Unregister a watcher (all of them on `key` if `id` is `None`).
    pub fn unwatch(&self, key: &str, id: Option<WatcherId>) {
        self.inner.lock().store.unwatch(key, id)
    }

    /// Subscribe to the store's event taxonomy.
    pub fn on_event(&self, cb: EventCallback) -> SubscriptionId {
        self.inner.lock().store.on_event(cb)
    }

    /// Unsubscribe from events.
    pub fn off_event(&self, id: SubscriptionId) {
        self.inner.lock().store.off_event(id)
    }

    /// Full scan, keeping entries matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&str, &Value) -> bool) -> ResultPipeline {
        let inner = self.inner.lock();
        let entries: Vec<(String, Value)> = inner.store.all().into_iter().collect();
        inner.query.find(&entries, predicate)
    }

    /// Evaluate `field op value`, dispatching to a secondary index when
    /// one covers the operator and falling back to a full scan otherwise
    /// (B2: an unmatched field yields an empty pipeline, not an error).
    pub fn where_clause(&self, field: &str, op: Operator, value: &Value) -> Result<ResultPipeline> {
        let mut inner = self.inner.lock();
        let entries: Vec<(String, Value)> = inner.store.all().into_iter().collect();
        let indexes = inner.indexes.clone();
        let indexes = indexes.lock();
        inner.query.where_clause(&entries, &indexes, field, op, value)
    }

    /// Number of documents in the store.
    pub fn count(&self) -> usize {
        self.inner.lock().store.all().len()
    }

    /// Sum of the numeric values at `field` across the whole store.
    pub fn sum(&self, field: &str) -> f64 {
        let entries: Vec<(String, Value)> = self.all().into_iter().collect();
        aggregate::sum(&entries, field)
    }

    /// Arithmetic mean of the numeric values at `field`.
    pub fn avg(&self, field: &str) -> Option<f64> {
        let entries: Vec<(String, Value)> = self.all().into_iter().collect();
        aggregate::avg(&entries, field)
    }

    /// Smallest numeric value at `field`.
    pub fn min(&self, field: &str) -> Option<f64> {
        let entries: Vec<(String, Value)> = self.all().into_iter().collect();
        aggregate::min(&entries, field)
    }

    /// Largest numeric value at `field`.
    pub fn max(&self, field: &str) -> Option<f64> {
        let entries: Vec<(String, Value)> = self.all().into_iter().collect();
        aggregate::max(&entries, field)
    }

    /// Partition the whole store by the string representation of `field`.
    pub fn group_by(&self, field: &str) -> HashMap<String, Vec<(String, Value)>> {
        let entries: Vec<(String, Value)> = self.all().into_iter().collect();
        aggregate::group_by(&entries, field)
    }

    /// Register a secondary index on `field`, populated from the current
    /// contents of the store (§4.3 "Creation").
    pub fn create_index(&self, field: &str, kind: IndexKind) -> Result<()> {
        let inner = self.inner.lock();
        let snapshot = inner.store.all();
        inner.indexes.lock().create_index(field, kind, &snapshot)
    }

    /// Drop the index on `(field, kind)`.
    pub fn drop_index(&self, field: &str, kind: IndexKind) {
        self.inner.lock().indexes.lock().drop_index(field, kind);
    }

    /// Every currently registered `(field, kind)` index.
    pub fn list_indexes(&self) -> Vec<(String, IndexKind)> {
        self.inner.lock().indexes.lock().list()
    }

    /// Register (or replace) the schema enforced on `name`'s documents.
    pub fn set_collection_schema(&self, name: impl Into<String>, schema: Schema) {
        self.inner.lock().collections.insert(name.into(), schema);
    }

    /// Run `f` against a scoped view of the `name` collection. The
    /// callback style avoids exposing a `Collection` tied to the lifetime
    /// of an internal lock guard.
    pub fn collection<R>(&self, name: &str, f: impl FnOnce(&mut Collection) -> R) -> R {
        let mut inner = self.inner.lock();
        let schema = inner.collections.get(name).cloned();
        let mut handle = Collection::new(&mut inner.store, name);
        if let Some(schema) = schema {
            handle = handle.schema(schema);
        }
        f(&mut handle)
    }

    /// This node's replication role, if replication is configured.
    pub fn role(&self) -> Option<Role> {
        self.inner.lock().replicator.lock().as_ref().map(|r| r.role())
    }

    /// This node's id, if replication is configured.
    pub fn node_id(&self) -> Option<String> {
        self.inner.lock().replicator.lock().as_ref().map(|r| r.node_id().to_string())
    }

    /// Replication health and conflict-log size.
    pub fn replication_status(&self) -> ReplicationStatus {
        let inner = self.inner.lock();
        let guard = inner.replicator.lock();
        match guard.as_ref() {
            Some(replicator) => ReplicationStatus {
                role: Some(replicator.role()),
                node_id: Some(replicator.node_id().to_string()),
                health: replicator.health().snapshot(),
                conflicts_logged: replicator.conflicts().len(),
            },
            None => ReplicationStatus { role: None, node_id: None, health: HashMap::new(), conflicts_logged: 0 },
        }
    }

    /// Apply an incoming replicated op (replica role). Resolves conflicts
    /// against the last locally observed write for the key, then writes
    /// the resolved value through the normal store pipeline.
    pub fn apply_op(&self, envelope: Envelope) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut guard = inner.replicator.lock();
        let Some(replicator) = guard.as_mut() else {
            return Err(emberstore_core::EmberError::constraint_violation("replication is not configured"));
        };
        match replicator.apply_op(envelope) {
            ApplyOutcome::Excluded => Ok(()),
            ApplyOutcome::Apply { key, value: Some(value), .. } => {
                drop(guard);
                inner.store.set(&key, value, None)
            }
            ApplyOutcome::Apply { key, value: None, .. } => {
                drop(guard);
                inner.store.delete(&key).map(|_| ())
            }
            ApplyOutcome::Conflict { key, value, entry, .. } => {
                tracing::warn!(key, "replica conflict resolved, applying reconciled value");
                drop(guard);
                Self::persist_conflict_entry(&mut inner.store, &entry);
                inner.store.set(&key, value, None)
            }
        }
    }

    /// Append `entry` to the persisted conflict log (§4.6), trimming to
    /// [`CONFLICT_LOG_CAPACITY`] oldest-dropped entries. Logged and
    /// otherwise ignored on failure: a write that failed to persist its
    /// conflict-log entry should still apply the reconciled value.
    fn persist_conflict_entry(store: &mut Store, entry: &ConflictEntry) {
        let mut log = match store.get(CONFLICT_LOG_KEY) {
            Some(existing) => existing.into_array(),
            None => Vec::new(),
        };
        let encoded = serde_json::to_value(entry).unwrap_or(serde_json::Value::Null);
        log.push(Value::from_json(encoded));
        if log.len() > CONFLICT_LOG_CAPACITY {
            let overflow = log.len() - CONFLICT_LOG_CAPACITY;
            log.drain(0..overflow);
        }
        if let Err(e) = store.set(CONFLICT_LOG_KEY, Value::from_array(log), None) {
            tracing::warn!(error = %e, "failed to persist conflict log entry");
        }
    }

    /// Record that `key` was written locally at `ts`, for conflict
    /// comparison against later incoming replicated ops.
    pub fn record_local_write(&self, key: &str, ts: i64, value: Value) {
        if let Some(replicator) = self.inner.lock().replicator.lock().as_mut() {
            replicator.record_local_write(key, ts, value);
        }
    }

    /// Current read/write/hit/miss counters.
    pub fn stats(&self) -> Stats {
        self.inner.lock().store.stats()
    }

    /// Flush the snapshot and stop background tasks.
    pub fn close(&mut self) -> Result<()> {
        self.background.stop();
        self.inner.lock().store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn database() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::init(EngineOptions::new(dir.path().join("db"))).unwrap();
        (dir, db)
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, db) = database();
        db.set("a", Value::from(1i64), None).unwrap();
        assert_eq!(db.get("a"), Some(Value::from(1i64)));
    }

    #[test]
    fn pre_write_veto_rejects_the_write_before_the_wal() {
        struct RejectSecrets;
        impl PreWrite for RejectSecrets {
            fn intercept(&self, key: &str, value: Value) -> PreWriteOutcome {
                if key.starts_with("secret:") {
                    PreWriteOutcome::Veto(emberstore_core::EmberError::validation("no secrets"))
                } else {
                    PreWriteOutcome::Continue(value)
                }
            }
        }
        let (_dir, db) = database();
        db.add_pre_write(Box::new(RejectSecrets));
        assert!(db.set("secret:token", Value::from("x"), None).is_err());
        assert!(!db.has("secret:token"));
    }

    #[test]
    fn post_read_transforms_the_returned_value() {
        struct UpperCaseStrings;
        impl PostRead for UpperCaseStrings {
            fn intercept(&self, _key: &str, value: Value) -> Value {
                match value.as_json().as_str() {
                    Some(s) => Value::from(s.to_uppercase()),
                    None => value,
                }
            }
        }
        let (_dir, db) = database();
        db.set("greeting", Value::from("hi"), None).unwrap();
        db.add_post_read(Box::new(UpperCaseStrings));
        assert_eq!(db.get("greeting"), Some(Value::from("HI")));
    }

    #[test]
    fn create_index_then_where_clause_dispatches_through_it() {
        let (_dir, db) = database();
        db.set("u1", Value::from_json(serde_json::json!({"age": 20})), None).unwrap();
        db.set("u2", Value::from_json(serde_json::json!({"age": 30})), None).unwrap();
        db.create_index("age", IndexKind::Range).unwrap();
        let result = db.where_clause("age", Operator::Gte, &Value::from(25i64)).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn collection_insert_is_visible_through_find() {
        let (_dir, db) = database();
        let key = db.collection("users", |c| c.insert(Value::from_json(serde_json::json!({"name": "a"}))).unwrap());
        assert!(db.has(&key));
    }

    #[test]
    fn list_indexes_reports_created_index() {
        let (_dir, db) = database();
        db.create_index("age", IndexKind::Hash).unwrap();
        assert_eq!(db.list_indexes(), vec![("age".to_string(), IndexKind::Hash)]);
    }

    #[test]
    fn no_replication_configured_reports_empty_status() {
        let (_dir, db) = database();
        let status = db.replication_status();
        assert!(status.role.is_none());
        assert_eq!(status.conflicts_logged, 0);
    }

    #[test]
    fn replica_rejects_local_writes_through_the_public_api() {
        use emberstore_replication::ReplicatorOptions;
        let dir = tempdir().unwrap();
        let options = EngineOptions::new(dir.path().join("db")).replication(ReplicatorOptions::new(Role::Replica));
        let db = Database::init(options).unwrap();
        assert!(db.set("a", Value::from(1i64), None).is_err());
        assert!(db.delete("a").is_err());
        assert!(db.clear().is_err());
        assert!(!db.has("a"));
    }

    #[test]
    fn apply_op_persists_a_conflict_under_the_reserved_key() {
        use emberstore_replication::ReplicatorOptions;
        let dir = tempdir().unwrap();
        let options = EngineOptions::new(dir.path().join("db")).replication(ReplicatorOptions::new(Role::Replica));
        let db = Database::init(options).unwrap();

        // A local write observed at ts=2000, then an incoming op timestamped
        // earlier (ts=1000) for the same key: the remote loses the race but
        // still wins under the default lww-remote-preferred rule, and the
        // conflict must be recorded.
        db.record_local_write("a", 2_000, Value::from(1i64));
        db.apply_op(Envelope::set("a", Value::from(2i64), 1_000, "primary-1")).unwrap();

        let log = db.get(CONFLICT_LOG_KEY).unwrap().into_array();
        assert_eq!(log.len(), 1);
        assert_eq!(db.replication_status().conflicts_logged, 1);
    }
}
