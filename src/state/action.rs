//! Actions - requests to change one slice of state.
//!
//! An action names a slice key and carries either a replacement value or an
//! updater that maps the current value to the next one. Actions are
//! immutable once built; the scheduler owns them from dispatch until they
//! are applied.

use std::fmt;
use std::rc::Rc;

use crate::error::{BindError, Result};
use crate::types::Value;

// =============================================================================
// Payload
// =============================================================================

/// Functional update: current slice value → next value.
pub type Updater = Rc<dyn Fn(&Value) -> Value>;

/// What an action does to its slice.
#[derive(Clone)]
pub enum Payload {
    /// Replace the slice with this value.
    Value(Value),
    /// Compute the next value from the current one.
    Updater(Updater),
}

impl Payload {
    /// Compute the next slice value. Missing slices read as `null`.
    pub fn resolve(&self, current: Option<&Value>) -> Value {
        match self {
            Payload::Value(value) => value.clone(),
            Payload::Updater(updater) => updater(current.unwrap_or(&Value::Null)),
        }
    }

    pub fn is_updater(&self) -> bool {
        matches!(self, Payload::Updater(_))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Payload::Updater(_) => f.write_str("Updater(..)"),
        }
    }
}

// =============================================================================
// Action
// =============================================================================

/// `{ key, payload }`.
#[derive(Debug, Clone)]
pub struct Action {
    key: String,
    payload: Payload,
}

impl Action {
    /// Replace slice `key` with `value`.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            payload: Payload::Value(value.into()),
        }
    }

    /// Update slice `key` with `updater(current)`.
    pub fn update(key: impl Into<String>, updater: impl Fn(&Value) -> Value + 'static) -> Self {
        Self {
            key: key.into(),
            payload: Payload::Updater(Rc::new(updater)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Decode `{"key": .., "payload": ..}` (`"type"` is accepted for `"key"`).
    ///
    /// A present-but-null payload is a valid replacement with `null`; a
    /// missing payload field is malformed.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(BindError::malformed("dispatch argument must be an object"));
        };
        let key = object
            .get("key")
            .or_else(|| object.get("type"))
            .ok_or_else(|| BindError::malformed("actions must have a property of \"key\""))?;
        let Some(key) = key.as_str() else {
            return Err(BindError::malformed("action \"key\" must be a string"));
        };
        let payload = object
            .get("payload")
            .ok_or_else(|| BindError::malformed("actions must have a property of \"payload\""))?;
        Ok(Self::new(key, payload.clone()))
    }
}

impl TryFrom<Value> for Action {
    type Error = BindError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_payload_resolves_to_itself() {
        let action = Action::new("count", 3);
        assert_eq!(action.key(), "count");
        assert_eq!(action.payload().resolve(Some(&json!(1))), json!(3));
        assert!(!action.payload().is_updater());
    }

    #[test]
    fn test_updater_payload_uses_current_value() {
        let action = Action::update("count", |v| json!(v.as_i64().unwrap_or(0) + 1));
        assert!(action.payload().is_updater());
        assert_eq!(action.payload().resolve(Some(&json!(41))), json!(42));
        assert_eq!(action.payload().resolve(None), json!(1));
    }

    #[test]
    fn test_from_json() {
        let action = Action::from_json(&json!({"key": "name", "payload": "Ada"})).unwrap();
        assert_eq!(action.key(), "name");

        let action = Action::from_json(&json!({"type": "name", "payload": null})).unwrap();
        assert_eq!(action.payload().resolve(None), Value::Null);
    }

    #[test]
    fn test_from_json_malformed() {
        for input in [
            json!([1, 2]),
            json!({"payload": 1}),
            json!({"key": "count"}),
            json!({"key": 7, "payload": 1}),
        ] {
            let err = Action::from_json(&input).unwrap_err();
            assert!(matches!(err, BindError::MalformedAction { .. }), "{input}");
        }
    }
}
