//! Per-run node output memoization (§4.6).
//!
//! Keyed by `(nodeId, digest-of-resolved-inputs)` so the same node called
//! twice with different inputs (e.g. across loop iterations) does not
//! collide. Scoped to a single run; nothing here is persisted.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// A cache key: a node id plus a stable digest of its resolved inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    node_id: String,
    inputs_digest: u64,
}

impl CacheKey {
    /// Build a key from a node id and its already-resolved input value.
    pub fn new(node_id: &str, resolved_inputs: &Value) -> Self {
        Self {
            node_id: node_id.to_string(),
            inputs_digest: flowforge_tooling::serialization::generate_json_hash(resolved_inputs),
        }
    }
}

/// A run-scoped, thread-safe memoization table for node outputs.
#[derive(Default)]
pub struct NodeCache {
    entries: Mutex<HashMap<CacheKey, Value>>,
}

impl NodeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously cached output for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.lock().expect("node cache mutex poisoned").get(key).cloned()
    }

    /// Record `output` under `key`, replacing any prior entry.
    pub fn put(&self, key: CacheKey, output: Value) {
        self.entries
            .lock()
            .expect("node cache mutex poisoned")
            .insert(key, output);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("node cache mutex poisoned").len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_round_trips() {
        let cache = NodeCache::new();
        let key = CacheKey::new("n1", &json!({"a": 1}));
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), json!({"result": 42}));
        assert_eq!(cache.get(&key), Some(json!({"result": 42})));
    }

    #[test]
    fn different_inputs_produce_different_keys() {
        let a = CacheKey::new("n1", &json!({"a": 1}));
        let b = CacheKey::new("n1", &json!({"a": 2}));
        assert_ne!(a, b);
    }

    #[test]
    fn key_order_of_object_fields_does_not_matter() {
        let a = CacheKey::new("n1", &json!({"a": 1, "b": 2}));
        let b = CacheKey::new("n1", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }
}
