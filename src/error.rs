//! Error taxonomy for the binding runtime.
//!
//! Validation errors at the public boundary (`create_store`, `dispatch`,
//! `bind`, `html`) are returned to the caller. Failures inside a
//! notification pass or a cleanup cascade are logged and counted instead,
//! so one broken callback never aborts the rest of the pass.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BindError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// Shape violation on a store, bind, hook, or builder input.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Action is missing its key or payload, or is not an object.
    #[error("malformed action: {message}")]
    MalformedAction { message: String },

    /// Action targets a slice that does not exist in the current state.
    #[error("action key `{key}` is not found in current state")]
    UnknownSliceKey { key: String },

    /// Updater payload dispatched while functional updates are disabled.
    #[error("invalid payload for `{key}`: {message}")]
    InvalidPayload { key: String, message: String },

    /// Render callback panicked or produced something that is not a live node.
    #[error("reconciliation failed for `{key}`: {message}")]
    ReconciliationFailure { key: String, message: String },
}

impl BindError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedAction {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn reconciliation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReconciliationFailure {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Render a caught panic payload as text for logs and errors.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}
