//! Binding engine - the side tables that connect state to nodes.
//!
//! - [`SubscriptionRegistry`]: slice key → render callbacks, plus the memo
//!   of the last value each one rendered
//! - [`BoundNodes`]: render-callback identity ↔ live node
//! - [`HookTable`]: per-node mount / update / unmount hooks
//! - [`LifecycleTracker`]: removal watching and pending observation
//!
//! None of these call user code. The pipeline reads what it needs, drops the
//! borrow, and only then invokes callbacks.

mod bound;
mod subscriptions;
mod tracker;

pub use bound::{BoundNodes, Hook, HookKind, HookTable, LifecycleHooks};
pub use subscriptions::{RenderFn, Subscription, SubscriptionRegistry};
pub use tracker::{LifecycleTracker, Observation};
