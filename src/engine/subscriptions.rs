//! Subscription Registry - slice key → render callbacks.
//!
//! Subscriptions are kept per key in registration order. Each one is a
//! render-callback identity: it owns exactly one live node, recorded in
//! [`super::bound::BoundNodes`].
//!
//! The memo table remembers the last slice value each subscription rendered,
//! so a notification carrying an equal value skips the re-render.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::pipeline::RenderContext;
use crate::types::{NodeId, SubscriptionId, Value};

/// Render callback. `None` renders an empty placeholder.
pub type RenderFn = Rc<dyn Fn(&RenderContext<'_>) -> Option<NodeId>>;

/// One registered render callback instance.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub key: String,
    pub render: RenderFn,
    /// Parameters captured when the view was created.
    pub params: Value,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_key: IndexMap<String, Vec<Subscription>>,
    key_of: HashMap<SubscriptionId, String>,
    memo: HashMap<SubscriptionId, Value>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a render callback under `key`.
    pub fn subscribe(&mut self, key: &str, render: RenderFn, params: Value) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.by_key
            .entry(key.to_string())
            .or_default()
            .push(Subscription {
                id,
                key: key.to_string(),
                render,
                params,
            });
        self.key_of.insert(id, key.to_string());
        id
    }

    /// Remove a subscription and its memo entry. Keys left without
    /// subscribers are dropped.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.memo.remove(&id);
        let Some(key) = self.key_of.remove(&id) else {
            return false;
        };
        if let Some(list) = self.by_key.get_mut(&key) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                self.by_key.shift_remove(&key);
            }
        }
        true
    }

    /// Snapshot of the subscriptions for `key`, in registration order.
    ///
    /// Callers iterate the snapshot, so subscriptions added or removed
    /// while iterating do not disturb the pass.
    pub fn subscriptions_for(&self, key: &str) -> Vec<Subscription> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        let key = self.key_of.get(&id)?;
        self.by_key.get(key)?.iter().find(|s| s.id == id).cloned()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.key_of.contains_key(&id)
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.by_key.get(key).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.key_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_of.is_empty()
    }

    // -------------------------------------------------------------------------
    // Memo
    // -------------------------------------------------------------------------

    pub fn remember(&mut self, id: SubscriptionId, value: Value) {
        if self.key_of.contains_key(&id) {
            self.memo.insert(id, value);
        }
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Whether `id` last rendered exactly `value`.
    pub fn is_current(&self, id: SubscriptionId, value: &Value) -> bool {
        self.memo.get(&id) == Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> RenderFn {
        Rc::new(|_: &RenderContext<'_>| -> Option<NodeId> { None })
    }

    #[test]
    fn test_subscriptions_keep_registration_order() {
        let mut registry = SubscriptionRegistry::new();
        let a = registry.subscribe("count", noop(), Value::Null);
        let b = registry.subscribe("count", noop(), json!({"label": "b"}));
        registry.subscribe("name", noop(), Value::Null);

        let ids: Vec<_> = registry.subscriptions_for("count").iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(registry.get(b).map(|s| s.params), Some(json!({"label": "b"})));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unsubscribe_drops_empty_keys_and_memo() {
        let mut registry = SubscriptionRegistry::new();
        let id = registry.subscribe("count", noop(), Value::Null);
        registry.remember(id, json!(1));
        assert!(registry.is_current(id, &json!(1)));

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert_eq!(registry.subscriber_count("count"), 0);
        assert!(!registry.is_current(id, &json!(1)));
        assert_eq!(registry.memo_len(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_memo_ignores_unknown_ids() {
        let mut registry = SubscriptionRegistry::new();
        let id = registry.subscribe("count", noop(), Value::Null);
        registry.unsubscribe(id);
        registry.remember(id, json!(2));
        assert!(!registry.is_current(id, &json!(2)));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = SubscriptionRegistry::new();
        let first = registry.subscribe("count", noop(), Value::Null);
        registry.unsubscribe(first);
        let second = registry.subscribe("count", noop(), Value::Null);
        assert_ne!(first, second);
    }
}
