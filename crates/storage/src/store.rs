//! The in-memory store: map + hot cache + TTL tracking + watchers + events,
//! serialised through a WAL-backed write pipeline (§4.2).
//!
//! `Store` owns its WAL handle directly; every mutating method appends the
//! WAL record(s) for the operation before touching the in-memory map, and
//! returns the durability error (without having mutated state) if the append
//! fails. Index maintenance and replication broadcast are not store
//! concerns — they're wired in by the engine as mutation hooks (see
//! [`Store::add_mutation_hook`]) so this crate has no dependency on either.

use crate::cache::Cache;
use crate::events::{Event, EventBus, SubscriptionId};
use crate::ttl::TtlIndex;
use crate::watchers::{WatchCallback, WatcherId, WatcherRegistry};
use emberstore_core::{now_millis, EmberError, Limits, Result, Value};
use emberstore_durability::{checkpoint as durable_checkpoint, recover, DurabilityMode, SnapshotEntry, Wal, WalRecord};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

/// Configuration for [`Store::open`].
pub struct StoreOptions {
    /// Path stem; the snapshot and WAL files are derived from it
    /// (`<base>.json`, `<base>.log`).
    pub base_path: PathBuf,
    /// WAL fsync policy.
    pub durability_mode: DurabilityMode,
    /// Maximum hot-cache size; `0` disables caching.
    pub cache_limit: usize,
    /// Snapshot backups to retain.
    pub backup_retention: usize,
    /// Key/value size limits.
    pub limits: Limits,
}

impl StoreOptions {
    /// Defaults matching §6: durability `Batched`, 1000-entry cache,
    /// 5 kept backups, default [`Limits`].
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        StoreOptions {
            base_path: base_path.into(),
            durability_mode: DurabilityMode::default(),
            cache_limit: 1000,
            backup_retention: 5,
            limits: Limits::default(),
        }
    }
}

/// Snapshot of the store's running counters, per §6 `stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    /// Total `get` calls.
    pub reads: u64,
    /// Total `set`/`delete`/`clear` calls.
    pub writes: u64,
    /// `get` calls served from the hot cache.
    pub hits: u64,
    /// `get` calls that missed the cache.
    pub misses: u64,
    /// Current number of live keys.
    pub size: usize,
    /// Current number of keys carrying a TTL.
    pub ttl_count: usize,
}

impl Stats {
    /// `hits / (hits + misses)`, or `0.0` with no reads yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Called after every successful mutation with `(key, new_value, old_value)`;
/// `new_value` is `None` on delete, `old_value` is `None` on first insert.
/// Used by the engine to wire index maintenance and replication broadcast.
pub type MutationHook = Box<dyn FnMut(&str, Option<&Value>, Option<&Value>) + Send>;

/// The in-memory key/value store.
pub struct Store {
    entries: HashMap<String, Entry>,
    cache: Cache,
    ttl: TtlIndex,
    watchers: WatcherRegistry,
    events: EventBus,
    wal: Wal,
    snapshot_path: PathBuf,
    backup_retention: usize,
    limits: Limits,
    counters: Stats,
    mutation_hooks: Vec<MutationHook>,
}

impl Store {
    /// Recover from `options.base_path`'s snapshot + WAL (or start empty if
    /// neither exists) and open for further writes.
    pub fn open(options: StoreOptions) -> Result<Self> {
        let snapshot_path = options.base_path.with_extension("json");
        let wal_path = options.base_path.with_extension("log");

        let recovered = recover(&snapshot_path, &wal_path, options.backup_retention, options.durability_mode)?;

        let now = now_millis();
        let mut entries = HashMap::new();
        let mut ttl = TtlIndex::new();
        for (key, snap_entry) in recovered.entries {
            if let Some(exp) = snap_entry.expires_at {
                if exp <= now {
                    // Already expired by the time we replayed it; discard
                    // rather than resurrecting it only to sweep it next tick.
                    continue;
                }
                ttl.insert(exp, key.clone());
            }
            entries.insert(key, Entry { value: snap_entry.value, expires_at: snap_entry.expires_at });
        }
        let size = entries.len();
        let ttl_count = ttl.len();

        Ok(Store {
            entries,
            cache: Cache::new(options.cache_limit),
            ttl,
            watchers: WatcherRegistry::new(),
            events: EventBus::new(),
            wal: recovered.wal,
            snapshot_path,
            backup_retention: options.backup_retention,
            limits: options.limits,
            counters: Stats { size, ttl_count, ..Stats::default() },
            mutation_hooks: Vec::new(),
        })
    }

    /// Register a hook invoked after every mutation's WAL append and
    /// in-memory update but before the event/watcher fan-out.
    pub fn add_mutation_hook(&mut self, hook: MutationHook) {
        self.mutation_hooks.push(hook);
    }

    fn run_hooks(&mut self, key: &str, new_value: Option<&Value>, old_value: Option<&Value>) {
        for hook in self.mutation_hooks.iter_mut() {
            hook(key, new_value, old_value);
        }
    }

    /// Write `key = value`, optionally with a TTL. Fails (with nothing
    /// mutated) if the key/value violate size limits or the WAL append
    /// fails.
    pub fn set(&mut self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.limits.validate_key(key).map_err(|e| EmberError::constraint_violation(e.to_string()))?;
        self.limits.validate_value(&value).map_err(|e| EmberError::constraint_violation(e.to_string()))?;

        let previous = self.entries.get(key).cloned();

        let expires_at = ttl.map(|d| now_millis() + d.as_millis() as i64);
        self.wal.append(&WalRecord::Put { k: key.to_string(), v: value.clone(), exp: expires_at })?;

        if let Some(prev_exp) = previous.as_ref().and_then(|p| p.expires_at) {
            self.ttl.remove(prev_exp, key);
        }
        if let Some(exp) = expires_at {
            self.ttl.insert(exp, key.to_string());
        }

        self.entries.insert(key.to_string(), Entry { value: value.clone(), expires_at });
        self.cache.put(key.to_string(), value.clone());
        self.counters.writes += 1;
        self.counters.size = self.entries.len();
        self.counters.ttl_count = self.ttl.len();

        let old_value = previous.map(|p| p.value);
        self.run_hooks(key, Some(&value), old_value.as_ref());
        self.watchers.notify(key, Some(&value), old_value.as_ref());
        self.events.emit(Event::Set { key: key.to_string(), value, old: old_value });
        Ok(())
    }

    /// Read `key`, promoting it to most-recently-used in the cache on a hit.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.counters.reads += 1;
        if let Some(value) = self.cache.get(key) {
            self.counters.hits += 1;
            return Some(value.clone());
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.counters.misses += 1;
                let value = entry.value.clone();
                self.cache.put(key.to_string(), value.clone());
                Some(value)
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Remove `key`. Returns `false` (no-op, no WAL write) if it was absent.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let Some(entry) = self.entries.get(key).cloned() else {
            return Ok(false);
        };

        self.wal.append(&WalRecord::Del { k: key.to_string() })?;
        self.entries.remove(key);
        self.cache.remove(key);
        if let Some(exp) = entry.expires_at {
            self.ttl.remove(exp, key);
        }
        self.counters.writes += 1;
        self.counters.size = self.entries.len();
        self.counters.ttl_count = self.ttl.len();

        self.run_hooks(key, None, Some(&entry.value));
        self.watchers.notify(key, None, Some(&entry.value));
        self.events.emit(Event::Delete { key: key.to_string(), old: entry.value });
        Ok(true)
    }

    /// True if `key` is present (regardless of cache state).
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Every live key and its value.
    pub fn all(&self) -> HashMap<String, Value> {
        self.entries.iter().map(|(k, e)| (k.clone(), e.value.clone())).collect()
    }

    /// Remove every key. Watchers are not notified (per §4.2); the event bus
    /// still emits `Clear`.
    pub fn clear(&mut self) -> Result<()> {
        self.wal.append(&WalRecord::Clr)?;
        self.entries.clear();
        self.cache.clear();
        self.ttl = TtlIndex::new();
        self.counters.writes += 1;
        self.counters.size = 0;
        self.counters.ttl_count = 0;
        self.events.emit(Event::Clear);
        Ok(())
    }

    /// Set or clear the expiry on an existing key without touching its
    /// value. Returns `false` if the key does not exist.
    pub fn expire(&mut self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        let Some(prev_exp) = self.entries.get(key).map(|e| e.expires_at) else {
            return Ok(false);
        };
        let expires_at = ttl.map(|d| now_millis() + d.as_millis() as i64);
        self.wal.append(&WalRecord::Ttl { k: key.to_string(), exp: expires_at })?;

        if let Some(exp) = prev_exp {
            self.ttl.remove(exp, key);
        }
        if let Some(exp) = expires_at {
            self.ttl.insert(exp, key.to_string());
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.expires_at = expires_at;
        }
        self.counters.ttl_count = self.ttl.len();
        Ok(true)
    }

    /// Read the current numeric value (missing/non-numeric coerces to `0`),
    /// add `delta`, and `set` the result through the normal write pipeline.
    pub fn add(&mut self, key: &str, delta: f64) -> Result<f64> {
        let current = self.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
        let result = current + delta;
        self.set(key, Value::from(result), None)?;
        self.events.emit(Event::Add { key: key.to_string(), delta, result });
        Ok(result)
    }

    /// `add(key, -delta)`.
    pub fn subtract(&mut self, key: &str, delta: f64) -> Result<f64> {
        self.add(key, -delta)
    }

    /// Append `value` to the array at `key` (creating an empty array first
    /// if the key is absent), and `set` the result through the normal write
    /// pipeline.
    pub fn push(&mut self, key: &str, value: Value) -> Result<Value> {
        let mut items = match self.get(key) {
            Some(existing) => existing.into_array(),
            None => Vec::new(),
        };
        items.push(value.clone());
        let array = Value::from_array(items);
        self.set(key, array.clone(), None)?;
        self.events.emit(Event::Push { key: key.to_string(), value });
        Ok(array)
    }

    /// Remove every occurrence of `value` from the array at `key`, and `set`
    /// the result through the normal write pipeline. A missing key or a
    /// non-array value is a no-op that returns the value unchanged.
    pub fn pull(&mut self, key: &str, value: Value) -> Result<Value> {
        let Some(mut current) = self.get(key) else {
            return Ok(Value::array());
        };
        let target = value.as_json().clone();
        let Some(array) = current.as_json_mut().as_array_mut() else {
            return Ok(current);
        };
        array.retain(|v| *v != target);
        self.set(key, current.clone(), None)?;
        self.events.emit(Event::Pull { key: key.to_string(), value });
        Ok(current)
    }

    /// Register a watcher on `key`.
    pub fn watch(&mut self, key: &str, cb: WatchCallback) -> WatcherId {
        self.watchers.watch(key, cb)
    }

    /// Remove one watcher by id, or every watcher on `key` if `id` is `None`.
    pub fn unwatch(&mut self, key: &str, id: Option<WatcherId>) {
        self.watchers.unwatch(key, id)
    }

    /// Subscribe to the event bus.
    pub fn on_event(&mut self, cb: crate::events::EventCallback) -> SubscriptionId {
        self.events.subscribe(cb)
    }

    /// Unsubscribe from the event bus.
    pub fn off_event(&mut self, id: SubscriptionId) {
        self.events.unsubscribe(id)
    }

    /// Delete every key whose TTL has expired as of now, via the full
    /// delete path (WAL, hooks, watchers, events). Returns the count
    /// deleted.
    pub fn sweep_ttl(&mut self) -> Result<usize> {
        let due = self.ttl.find_expired(now_millis());
        let mut swept = 0;
        for key in due {
            if self.delete(&key)? {
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Write the current state to a new snapshot and truncate the WAL.
    pub fn checkpoint(&mut self) -> Result<()> {
        let snapshot_entries: HashMap<String, SnapshotEntry> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), SnapshotEntry { value: e.value.clone(), expires_at: e.expires_at }))
            .collect();
        durable_checkpoint(&self.snapshot_path, self.backup_retention, &mut self.wal, &snapshot_entries)
    }

    /// Current counters.
    pub fn stats(&self) -> Stats {
        self.counters
    }

    /// Emit `Close` and fsync the WAL one last time.
    pub fn close(&mut self) -> Result<()> {
        self.events.emit(Event::Close);
        self.wal.fsync().map_err(|_| EmberError::durability("failed to fsync wal on close"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(StoreOptions::new(dir.path().join("db"))).unwrap()
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.set("a", Value::from(1i64), None).unwrap();
        assert_eq!(store.get("a"), Some(Value::from(1i64)));
        assert!(store.has("a"));
    }

    #[test]
    fn delete_absent_key_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        assert!(!store.delete("missing").unwrap());
    }

    #[test]
    fn delete_removes_key_and_cache_entry() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.set("a", Value::from(1i64), None).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.has("a"));
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn set_without_ttl_clears_previous_ttl() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.set("a", Value::from(1i64), Some(Duration::from_secs(60))).unwrap();
        assert_eq!(store.stats().ttl_count, 1);
        store.set("a", Value::from(2i64), None).unwrap();
        assert_eq!(store.stats().ttl_count, 0);
    }

    #[test]
    fn sweep_ttl_deletes_expired_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.set("a", Value::from(1i64), Some(Duration::from_millis(0))).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let swept = store.sweep_ttl().unwrap();
        assert_eq!(swept, 1);
        assert!(!store.has("a"));
    }

    #[test]
    fn clear_resets_store_without_notifying_watchers() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.set("a", Value::from(1i64), None).unwrap();
        let notified = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = notified.clone();
        store.watch("a", Box::new(move |_, _| flag.store(true, std::sync::atomic::Ordering::SeqCst)));
        store.clear().unwrap();
        assert!(!store.has("a"));
        assert!(!notified.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn add_and_subtract_coerce_missing_to_zero() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        assert_eq!(store.add("counter", 5.0).unwrap(), 5.0);
        assert_eq!(store.subtract("counter", 2.0).unwrap(), 3.0);
    }

    #[test]
    fn push_appends_to_a_missing_key_as_a_fresh_array() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let result = store.push("tags", Value::from("a")).unwrap();
        assert_eq!(result.into_array(), vec![Value::from("a")]);
    }

    #[test]
    fn pull_removes_every_matching_occurrence() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let seeded = Value::from_array(vec![Value::from("a"), Value::from("b"), Value::from("a")]);
        store.set("tags", seeded, None).unwrap();
        let result = store.pull("tags", Value::from("a")).unwrap();
        assert_eq!(result.into_array(), vec![Value::from("b")]);
    }

    #[test]
    fn checkpoint_then_reopen_recovers_state() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        {
            let mut store = Store::open(StoreOptions::new(&base)).unwrap();
            store.set("a", Value::from(1i64), None).unwrap();
            store.checkpoint().unwrap();
            store.set("b", Value::from(2i64), None).unwrap();
        }
        let mut reopened = Store::open(StoreOptions::new(&base)).unwrap();
        assert_eq!(reopened.get("a"), Some(Value::from(1i64)));
        assert_eq!(reopened.get("b"), Some(Value::from(2i64)));
    }

    #[test]
    fn mutation_hook_observes_key_new_and_old() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let seen: std::sync::Arc<std::sync::Mutex<Vec<String>>> = Default::default();
        let seen_clone = seen.clone();
        store.add_mutation_hook(Box::new(move |key, _new, _old| {
            seen_clone.lock().unwrap().push(key.to_string());
        }));
        store.set("a", Value::from(1i64), None).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
    }
}
