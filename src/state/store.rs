//! State Store - the single copy-on-write state snapshot.
//!
//! Every mutation builds a fresh map and swaps the `Rc`. Anyone holding an
//! older snapshot keeps seeing exactly what it saw, so reads never need to
//! coordinate with the flush loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexSet;

use super::action::Payload;
use crate::error::{BindError, Result};
use crate::types::{State, Value};

/// Owner of the canonical state snapshot.
#[derive(Debug, Default)]
pub struct Store {
    snapshot: RefCell<Rc<State>>,
    version: Cell<u64>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot. Only JSON objects are accepted.
    pub fn initialize(&self, state: Value) -> Result<()> {
        let Value::Object(map) = state else {
            return Err(BindError::invalid(
                "createStore argument must be an object literal",
            ));
        };
        self.install(map);
        Ok(())
    }

    fn install(&self, next: State) {
        *self.snapshot.borrow_mut() = Rc::new(next);
        self.version.set(self.version.get() + 1);
    }

    /// Current value of slice `key`.
    pub fn read(&self, key: &str) -> Option<Value> {
        self.snapshot.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot.borrow().contains_key(key)
    }

    /// The current snapshot. Later mutations never show through it.
    pub fn snapshot(&self) -> Rc<State> {
        self.snapshot.borrow().clone()
    }

    /// Number of snapshots installed so far (initialization included).
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Apply one payload to `key` and install the result.
    ///
    /// The updater runs against a held snapshot, with no borrow of the store
    /// active, so it may read the store itself.
    pub fn apply(&self, key: &str, payload: &Payload) -> Value {
        let current = self.snapshot();
        let value = payload.resolve(current.get(key));
        let mut next = (*current).clone();
        next.insert(key.to_string(), value.clone());
        self.install(next);
        value
    }

    /// Fold every payload into one transition and install it once.
    ///
    /// Later payloads see the results of earlier ones. Returns the affected
    /// keys in first-touched order.
    pub fn apply_batch<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, &'a Payload)>,
    ) -> Vec<String> {
        let mut next = (*self.snapshot()).clone();
        let mut touched = IndexSet::new();
        for (key, payload) in entries {
            let value = payload.resolve(next.get(key));
            next.insert(key.to_string(), value);
            touched.insert(key.to_string());
        }
        self.install(next);
        touched.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_initialize_rejects_non_objects() {
        let store = Store::new();
        for input in [json!([1, 2, 3]), json!(5), json!("state"), Value::Null] {
            assert!(matches!(
                store.initialize(input),
                Err(BindError::InvalidArgument { .. })
            ));
        }
        assert!(store.initialize(json!({"count": 0})).is_ok());
    }

    #[test]
    fn test_read_missing_is_none() {
        let store = Store::new();
        store.initialize(json!({"count": 0})).unwrap();
        assert_eq!(store.read("count"), Some(json!(0)));
        assert_eq!(store.read("missing"), None);
    }

    #[test]
    fn test_apply_is_copy_on_write() {
        let store = Store::new();
        store.initialize(json!({"count": 0, "name": "a"})).unwrap();

        let held = store.snapshot();
        store.apply("count", &Payload::Value(json!(1)));

        assert_eq!(held.get("count"), Some(&json!(0)));
        assert_eq!(store.read("count"), Some(json!(1)));
        assert_eq!(store.read("name"), Some(json!("a")));
        assert!(!Rc::ptr_eq(&held, &store.snapshot()));
    }

    #[test]
    fn test_apply_batch_installs_once_with_final_values() {
        let store = Store::new();
        store.initialize(json!({"a": 0, "b": 0})).unwrap();
        let before = store.version();

        let inc: Payload = Payload::Updater(Rc::new(|v: &Value| json!(v.as_i64().unwrap_or(0) + 1)));
        let set_b = Payload::Value(json!(10));
        let keys = store.apply_batch([("b", &set_b), ("a", &inc), ("b", &inc), ("a", &inc)]);

        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(store.read("a"), Some(json!(2)));
        assert_eq!(store.read("b"), Some(json!(11)));
        assert_eq!(store.version(), before + 1);
    }
}
