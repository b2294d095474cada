// ── Observable state store ──
//
// A single shared key/value map. Every mutation that changes a value is
// announced synchronously to per-key and wildcard listeners before the
// mutating call returns. Attribute notify triggers and the control plane
// both hang off this.

mod listeners;

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::value::same_value;
use listeners::Dispatcher;
pub use listeners::{Subscription, Topic};

/// A single change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: String,
    /// New value; `None` when the key was deleted.
    pub value: Option<Value>,
    /// Value before the change; `None` when the key was created.
    pub previous: Option<Value>,
}

impl StateChange {
    pub fn is_deletion(&self) -> bool {
        self.value.is_none()
    }
}

struct StoreInner {
    values: DashMap<String, Value>,
    listeners: Arc<Dispatcher<StateChange>>,
}

/// Shared, cheaply cloneable handle to the state map.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("keys", &self.inner.values.len())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                values: DashMap::new(),
                listeners: Arc::new(Dispatcher::new()),
            }),
        }
    }

    /// Seed a store without emitting any events.
    pub fn with_values(values: Map<String, Value>) -> Self {
        let store = Self::new();
        for (key, value) in values {
            store.inner.values.insert(key, value);
        }
        store
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.values.get(key).map(|entry| entry.value().clone())
    }

    /// Stored value, or `default` when the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.values.contains_key(key)
    }

    /// Sorted key list.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .values
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Independent copy of the whole map, keys sorted.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut entries: Vec<(String, Value)> = self
            .inner
            .values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Store `value` under `key` and return it.
    ///
    /// Emits one event when the key is new or the value differs from the
    /// stored one; an identical re-set is silent. Numbers compare by value.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Value {
        let key = key.into();
        // Shard guard is dropped at the end of this statement, before dispatch.
        let previous = self.inner.values.insert(key.clone(), value.clone());
        if !previous.as_ref().is_some_and(|prev| same_value(prev, &value)) {
            self.emit(StateChange {
                key,
                value: Some(value.clone()),
                previous,
            });
        }
        value
    }

    /// `set` each entry in map order.
    pub fn set_many(&self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(key, value);
        }
    }

    /// Fill in keys that are absent. Existing values, including `null`,
    /// are left untouched.
    pub fn ensure_defaults(&self, defaults: &Map<String, Value>) {
        for (key, value) in defaults {
            if !self.contains(key) {
                self.set(key.clone(), value.clone());
            }
        }
    }

    /// Swap the whole map. Keys missing from `values` are deleted first
    /// (with deletion events), then every entry of `values` is `set`.
    pub fn replace(&self, values: Map<String, Value>) {
        for key in self.keys() {
            if !values.contains_key(&key) {
                self.delete(&key);
            }
        }
        self.set_many(values);
    }

    /// Delete one key. Returns the removed value, if any.
    pub fn delete(&self, key: &str) -> Option<Value> {
        let (key, previous) = self.inner.values.remove(key)?;
        self.emit(StateChange {
            key,
            value: None,
            previous: Some(previous.clone()),
        });
        Some(previous)
    }

    /// Delete every key, emitting a deletion event for each.
    pub fn clear(&self) {
        for key in self.keys() {
            self.delete(&key);
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Listen for changes to a single key.
    pub fn on_change(
        &self,
        key: impl Into<String>,
        listener: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner
            .listeners
            .subscribe(Topic::Key(key.into()), listener)
    }

    /// Listen for changes to any key.
    pub fn on_any_change(
        &self,
        listener: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.listeners.subscribe(Topic::Any, listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn emit(&self, change: StateChange) {
        self.inner.listeners.dispatch(&change.key, &change);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn recorder(store: &StateStore) -> (Arc<Mutex<Vec<StateChange>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let sub = store.on_any_change(move |change| sink.lock().push(change.clone()));
        (log, sub)
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn set_emits_on_create_and_change_only() {
        let store = StateStore::new();
        let (log, _sub) = recorder(&store);

        store.set("temp", json!(20));
        store.set("temp", json!(20));
        store.set("temp", json!(21));

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].previous, None);
        assert_eq!(log[1].previous, Some(json!(20)));
        assert_eq!(log[1].value, Some(json!(21)));
    }

    #[test]
    fn set_treats_integral_float_as_unchanged() {
        let store = StateStore::new();
        store.set("temp", json!(20));
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let _sub = store.on_change("temp", move |_| *counter.lock() += 1);

        store.set("temp", json!(20.0));
        assert_eq!(*hits.lock(), 0);

        store.set("temp", json!(20.5));
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn listeners_fire_before_set_returns() {
        let store = StateStore::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let _sub = store.on_change("a", move |_| *counter.lock() += 1);

        store.set("a", json!(1));
        assert_eq!(*hits.lock(), 1);
        store.set("b", json!(1));
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn replace_deletes_missing_keys() {
        let store = StateStore::with_values(map(json!({ "temp": 20 })));
        let (log, _sub) = recorder(&store);

        store.replace(map(json!({ "z": 9 })));

        assert_eq!(store.snapshot(), map(json!({ "z": 9 })));
        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].key, "temp");
        assert!(log[0].is_deletion());
        assert_eq!(log[1].key, "z");
    }

    #[test]
    fn clear_emits_deletion_per_key() {
        let store = StateStore::with_values(map(json!({ "a": 1, "b": 2 })));
        let (log, _sub) = recorder(&store);

        store.clear();

        assert!(store.is_empty());
        let keys: Vec<_> = log.lock().iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn ensure_defaults_preserves_existing_values() {
        let store = StateStore::with_values(map(json!({ "temp": 30, "unset": null })));
        store.ensure_defaults(&map(json!({ "temp": 0, "unset": 5, "mode": "idle" })));

        assert_eq!(store.get("temp"), Some(json!(30)));
        assert_eq!(store.get("unset"), Some(Value::Null));
        assert_eq!(store.get("mode"), Some(json!("idle")));
    }

    #[test]
    fn snapshot_is_independent() {
        let store = StateStore::new();
        store.set("a", json!(1));
        let mut snap = store.snapshot();
        snap.insert("a".into(), json!(99));
        snap.insert("b".into(), json!(2));

        assert_eq!(store.get("a"), Some(json!(1)));
        assert!(!store.contains("b"));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let store = StateStore::new();
        let (log, sub) = recorder(&store);

        store.set("a", json!(1));
        sub.unsubscribe();
        store.set("a", json!(2));

        assert_eq!(log.lock().len(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_may_write_back_into_store() {
        let store = StateStore::new();
        let mirror = store.clone();
        let _sub = store.on_change("input", move |change| {
            if let Some(v) = &change.value {
                mirror.set("mirror", v.clone());
            }
        });

        store.set("input", json!("x"));
        assert_eq!(store.get("mirror"), Some(json!("x")));
    }

    #[test]
    fn get_or_falls_back() {
        let store = StateStore::new();
        assert_eq!(store.get_or("missing", json!(7)), json!(7));
    }
}
