//! Binding pipeline
//!
//! ```text
//! dispatch → Scheduler queue → tick → flush → Store → notify(key)
//!          → render callbacks → reconcile → Lifecycle Tracker
//! ```
//!
//! - **runtime** - entry point, binder, dispatch, tick loop
//! - **notify** - per-key subscriber pass with failure isolation
//! - **reconcile** - replace or patch the live node
//! - **lifecycle** - cleanup cascade and hook dispatch

mod lifecycle;
mod notify;
mod reconcile;
mod runtime;

pub use runtime::{Dispatcher, RenderContext, Runtime, ViewFactory};
