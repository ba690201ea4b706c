//! Per-key watcher registry (§4.2 `watch`/`unwatch`).
//!
//! Delivery is synchronous, in registration order, after the writer critical
//! section has already applied the mutation. A callback that panics is
//! caught and logged rather than allowed to unwind into the writer.

use emberstore_core::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Handle returned by [`WatcherRegistry::watch`], usable to unregister a
/// single callback via [`WatcherRegistry::unwatch`].
pub type WatcherId = u64;

/// `(new_value, old_value)`; `new_value` is `None` on delete.
pub type WatchCallback = Box<dyn FnMut(Option<&Value>, Option<&Value>) + Send>;

/// Maps key → subscribed callbacks.
#[derive(Default)]
pub struct WatcherRegistry {
    next_id: WatcherId,
    by_key: HashMap<String, Vec<(WatcherId, WatchCallback)>>,
}

impl WatcherRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cb` on `key`, returning an id for later removal.
    pub fn watch(&mut self, key: &str, cb: WatchCallback) -> WatcherId {
        self.next_id += 1;
        let id = self.next_id;
        self.by_key.entry(key.to_string()).or_default().push((id, cb));
        id
    }

    /// Remove one callback by id, or every callback on `key` if `id` is `None`.
    pub fn unwatch(&mut self, key: &str, id: Option<WatcherId>) {
        match id {
            Some(id) => {
                if let Some(subs) = self.by_key.get_mut(key) {
                    subs.retain(|(existing, _)| *existing != id);
                    if subs.is_empty() {
                        self.by_key.remove(key);
                    }
                }
            }
            None => {
                self.by_key.remove(key);
            }
        }
    }

    /// Invoke every subscriber on `key`, in registration order. A panicking
    /// callback is caught and logged; it does not stop delivery to the rest.
    pub fn notify(&mut self, key: &str, new_value: Option<&Value>, old_value: Option<&Value>) {
        let Some(subs) = self.by_key.get_mut(key) else { return };
        for (id, cb) in subs.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| cb(new_value, old_value)));
            if result.is_err() {
                tracing::warn!(key, watcher_id = id, "watcher callback panicked, isolated from writer");
            }
        }
    }

    /// Number of keys with at least one watcher.
    pub fn watched_key_count(&self) -> usize {
        self.by_key.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn notifies_registered_watcher_with_new_and_old() {
        let mut registry = WatcherRegistry::new();
        let seen: Arc<std::sync::Mutex<Vec<(Option<Value>, Option<Value>)>>> = Arc::default();
        let seen_clone = seen.clone();
        registry.watch(
            "a",
            Box::new(move |new, old| {
                seen_clone.lock().unwrap().push((new.cloned(), old.cloned()));
            }),
        );
        registry.notify("a", Some(&Value::from(2i64)), Some(&Value::from(1i64)));
        let recorded = seen.lock().unwrap();
        assert_eq!(recorded[0], (Some(Value::from(2i64)), Some(Value::from(1i64))));
    }

    #[test]
    fn unwatch_with_id_removes_only_that_callback() {
        let mut registry = WatcherRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        let id1 = registry.watch("a", Box::new(move |_, _| { c1.fetch_add(1, Ordering::SeqCst); }));
        registry.watch("a", Box::new(move |_, _| { c2.fetch_add(1, Ordering::SeqCst); }));

        registry.unwatch("a", Some(id1));
        registry.notify("a", None, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unwatch_without_id_clears_all_for_key() {
        let mut registry = WatcherRegistry::new();
        registry.watch("a", Box::new(|_, _| {}));
        registry.watch("a", Box::new(|_, _| {}));
        registry.unwatch("a", None);
        assert_eq!(registry.watched_key_count(), 0);
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let mut registry = WatcherRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        registry.watch("a", Box::new(|_, _| panic!("boom")));
        registry.watch("a", Box::new(move |_, _| { c.fetch_add(1, Ordering::SeqCst); }));
        registry.notify("a", None, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
