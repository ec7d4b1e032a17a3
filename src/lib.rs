//! # spark-bind
//!
//! Reactive state-to-view binding runtime for Rust.
//!
//! A single store holds the application state as named slices. Render
//! callbacks are bound to a slice key; every time an action changes that
//! slice, the callbacks run again and their output is spliced into a live
//! host tree. Nodes that leave the tree are detected and their bindings
//! cleaned up.
//!
//! ## Architecture
//!
//! ```text
//! dispatch(action) → queue → tick → Store (single apply or merged batch)
//!                  → notify(key) → render callbacks → reconcile (replace | patch)
//!                  → Lifecycle Tracker → cleanup cascade on removal
//! ```
//!
//! Everything is single-threaded (`Rc`/`RefCell`). No internal borrow is
//! held while user code runs, so render callbacks, hooks and event handlers
//! may dispatch, build nodes and mutate the tree freely.
//!
//! ## Modules
//!
//! - [`types`] - Node and subscription identities, JSON value aliases
//! - [`host`] - Host tree, removal observer, node builder, event delegation
//! - [`state`] - Store, actions, scheduler, clock
//! - [`engine`] - Subscriptions, bound node records, hooks, lifecycle tracker
//! - [`pipeline`] - Runtime entry point, notifier, reconciler, cleanup cascade
//! - [`config`] - Runtime configuration
//! - [`error`] - Error taxonomy

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::{Reconciliation, RuntimeConfig};
pub use error::{BindError, Result};

pub use host::{attr, html, on, Attr, AttrValue, Child, Event, EventHandler, Host, HostTree};

pub use state::{Action, Clock, LabClock, Payload};

pub use engine::LifecycleHooks;

pub use pipeline::{Dispatcher, RenderContext, Runtime, ViewFactory};
