//! Per-session key-value state shared by every tool call in a session.
//!
//! A [`StateStore`] is a cheap handle: clones point at the same map, while
//! two stores created with [`StateStore::new`] never share anything. Values
//! are arbitrary JSON. Writes replace the whole value under the write lock,
//! so a concurrent reader sees either the old value or the new one.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Key holding the user's preferred temperature unit ("Celsius" / "Fahrenheit").
pub const TEMPERATURE_UNIT_KEY: &str = "user_preference_temperature_unit";

/// Key holding the last city passed to the weather lookup.
pub const LAST_CITY_CHECKED_KEY: &str = "last_city_checked";

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `initial`.
    pub fn with_values(initial: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    // A panic while holding the lock cannot leave a half-written value
    // behind (inserts are a single map operation), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the stored value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Get the stored value for `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// String convenience over [`get_or`](Self::get_or). A present but
    /// non-string value also yields `default`.
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            _ => default.to_string(),
        }
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        tracing::trace!(key = %key, "state set");
        self.write().insert(key, value);
    }

    /// Remove `key`, returning the previous value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    /// Merge every entry of `values` into the store (last write wins per key).
    pub fn merge(&self, values: Map<String, Value>) {
        let mut guard = self.write();
        for (k, v) in values {
            guard.insert(k, v);
        }
    }

    /// Point-in-time copy of the whole store.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.read().clone()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Serialize for StateStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::with_values(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_key_yields_default() {
        let store = StateStore::new();
        assert_eq!(store.get(TEMPERATURE_UNIT_KEY), None);
        assert_eq!(store.get_or(TEMPERATURE_UNIT_KEY, "Celsius"), json!("Celsius"));
        assert_eq!(store.get_str_or(TEMPERATURE_UNIT_KEY, "Celsius"), "Celsius");
    }

    #[test]
    fn test_set_then_get_last_write_wins() {
        let store = StateStore::new();
        store.set("counter", 1);
        store.set("counter", json!({"nested": [1, 2, 3]}));
        assert_eq!(store.get("counter"), Some(json!({"nested": [1, 2, 3]})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_non_string_value_falls_back_for_str_getter() {
        let store = StateStore::new();
        store.set(TEMPERATURE_UNIT_KEY, 42);
        assert_eq!(store.get_str_or(TEMPERATURE_UNIT_KEY, "Celsius"), "Celsius");
    }

    #[test]
    fn test_remove_restores_default() {
        let store = StateStore::new();
        store.set(LAST_CITY_CHECKED_KEY, "London");
        assert_eq!(store.remove(LAST_CITY_CHECKED_KEY), Some(json!("London")));
        assert_eq!(store.get_or(LAST_CITY_CHECKED_KEY, Value::Null), Value::Null);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_and_new_stores_do_not() {
        let a = StateStore::new();
        let a_clone = a.clone();
        let b = StateStore::new();

        a_clone.set("k", "v");
        assert_eq!(a.get("k"), Some(json!("v")));
        assert_eq!(b.get("k"), None);
    }

    #[test]
    fn test_merge_and_snapshot() {
        let store = StateStore::new();
        store.set("a", 1);
        let mut extra = Map::new();
        extra.insert("a".into(), json!(2));
        extra.insert("b".into(), json!(true));
        store.merge(extra);

        let snap = store.snapshot();
        assert_eq!(snap.get("a"), Some(&json!(2)));
        assert_eq!(snap.get("b"), Some(&json!(true)));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let store = StateStore::new();
        store.set(TEMPERATURE_UNIT_KEY, "Fahrenheit");
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json, json!({ "user_preference_temperature_unit": "Fahrenheit" }));

        let back: StateStore = serde_json::from_value(json).unwrap();
        assert_eq!(back.get_str_or(TEMPERATURE_UNIT_KEY, "Celsius"), "Fahrenheit");
    }

    #[test]
    fn test_concurrent_writers_never_tear_values() {
        let store = StateStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..200 {
                        store.set("shared", json!({"writer": i, "seq": j}));
                        let seen = store.get("shared").unwrap();
                        assert!(seen.get("writer").is_some() && seen.get("seq").is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
