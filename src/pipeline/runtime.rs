//! Runtime - the entry point that owns the store, the queue and the binder.
//!
//! ```ignore
//! let runtime = Runtime::new(RuntimeConfig::default())?;
//! runtime.create_store(json!({ "count": 0 }))?;
//!
//! let counter = runtime.bind("count", |cx| {
//!     cx.host().html("span", vec![attr("textContent", cx.value().to_string())], vec![]).ok()
//! })?;
//! let node = counter.create(Value::Null)?;
//! runtime.mount(node, runtime.host().root())?;
//!
//! runtime.dispatch(Action::update("count", |v| json!(v.as_i64().unwrap_or(0) + 1)))?;
//! runtime.run_until_idle();
//! ```
//!
//! # Ticks
//!
//! Nothing happens on `dispatch` except queueing. Each [`Runtime::tick`]
//! first processes removals reported by the host tree (cleanup cascades),
//! then runs the armed flush, if any.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::config::RuntimeConfig;
use crate::engine::{
    BoundNodes, HookTable, LifecycleHooks, LifecycleTracker, RenderFn, SubscriptionRegistry,
};
use crate::error::{panic_message, BindError, Result};
use crate::host::Host;
use crate::state::{Action, Clock, Scheduler, Step, Store};
use crate::types::{NodeId, State, Value};

/// Upper bound on busy ticks in [`Runtime::run_until_idle`].
const MAX_IDLE_TICKS: usize = 1024;

// =============================================================================
// Inner
// =============================================================================

pub(crate) struct Inner {
    pub(crate) this: Weak<Inner>,
    pub(crate) config: RuntimeConfig,
    pub(crate) host: Host,
    pub(crate) store: Store,
    pub(crate) scheduler: RefCell<Scheduler>,
    pub(crate) subscriptions: RefCell<SubscriptionRegistry>,
    pub(crate) bound: RefCell<BoundNodes>,
    pub(crate) hooks: RefCell<HookTable>,
    pub(crate) tracker: RefCell<LifecycleTracker>,
    /// Set while a tick runs; a nested tick from user code is a no-op.
    ticking: Cell<bool>,
    failure_count: Cell<usize>,
    last_failure: RefCell<Option<BindError>>,
}

impl Inner {
    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            runtime: self.this.clone(),
        }
    }

    pub(crate) fn record_failure(&self, err: BindError) {
        tracing::error!(error = %err, "render failed; keeping the previous node");
        self.failure_count.set(self.failure_count.get() + 1);
        *self.last_failure.borrow_mut() = Some(err);
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    fn dispatch(&self, action: Action) -> Result<()> {
        let key = action.key().to_string();
        if key.is_empty() {
            return Err(BindError::malformed("action key must be a non-empty string"));
        }
        if !self.store.contains(&key) {
            return Err(BindError::UnknownSliceKey { key });
        }
        if action.payload().is_updater() && !self.config.allow_updaters {
            return Err(BindError::InvalidPayload {
                key,
                message: "updater payloads are disabled".to_string(),
            });
        }

        let (seq, armed) = self.scheduler.borrow_mut().enqueue(action);
        tracing::debug!(seq, key = %key, "action queued");
        if armed {
            tracing::debug!("flush armed");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Flush
    // -------------------------------------------------------------------------

    /// Drain the queue. Actions dispatched while draining are drained too.
    fn flush(&self) {
        tracing::debug!(queued = self.scheduler.borrow().len(), "flush started");
        loop {
            let step = self.scheduler.borrow_mut().next_step();
            match step {
                None => break,
                Some(Step::Single(entry)) => {
                    let key = entry.action.key();
                    let applied = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.store.apply(key, entry.action.payload())
                    }));
                    match applied {
                        Ok(_) => self.notify(key),
                        Err(payload) => tracing::error!(
                            seq = entry.seq,
                            key,
                            message = %panic_message(payload.as_ref()),
                            "updater panicked; action dropped"
                        ),
                    }
                }
                Some(Step::Batch(entries)) => {
                    let applied = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.store.apply_batch(
                            entries
                                .iter()
                                .map(|e| (e.action.key(), e.action.payload())),
                        )
                    }));
                    match applied {
                        Ok(keys) => {
                            tracing::debug!(actions = entries.len(), keys = keys.len(), "batch applied");
                            for key in keys {
                                self.notify(&key);
                            }
                        }
                        Err(payload) => tracing::error!(
                            actions = entries.len(),
                            message = %panic_message(payload.as_ref()),
                            "updater panicked; batch dropped"
                        ),
                    }
                }
            }
        }
        tracing::debug!(version = self.store.version(), "flush finished");
    }

    // -------------------------------------------------------------------------
    // Binder
    // -------------------------------------------------------------------------

    fn create_view(&self, key: &str, render: &RenderFn, params: Value) -> Result<NodeId> {
        let id = self
            .subscriptions
            .borrow_mut()
            .subscribe(key, render.clone(), params);
        let Some(sub) = self.subscriptions.borrow().get(id) else {
            return Err(BindError::reconciliation(key, "subscription vanished"));
        };
        let value = self.store.read(key).unwrap_or(Value::Null);

        let node = match self.render(&sub, &value) {
            Ok(node) => node,
            Err(err) => {
                self.subscriptions.borrow_mut().unsubscribe(id);
                return Err(err);
            }
        };
        let owner = self.bound.borrow().owner(node);
        if let Some(owner) = owner {
            self.subscriptions.borrow_mut().unsubscribe(id);
            return Err(BindError::reconciliation(
                key,
                format!("render returned {node}, which is already bound to {owner}"),
            ));
        }

        self.subscriptions.borrow_mut().remember(id, value);
        self.bound.borrow_mut().insert(id, node);
        let observation = {
            let mut tree = self.host.tree_mut();
            self.tracker.borrow_mut().observe(&mut *tree, node)
        };
        tracing::debug!(%id, key, %node, ?observation, "view created");
        Ok(node)
    }

    // -------------------------------------------------------------------------
    // Removals
    // -------------------------------------------------------------------------

    /// Observe pending nodes that were attached since the last pass, then
    /// cascade cleanup for every observed node that left the tree.
    fn process_removals(&self) -> usize {
        let (dead, removed) = {
            let mut tree = self.host.tree_mut();
            let mut tracker = self.tracker.borrow_mut();
            let dead = tracker.retry_pending(&mut *tree);
            let removed = tracker.collect_removals(&mut *tree);
            (dead, removed)
        };
        let mut count = dead.len() + removed.len();
        for node in dead.into_iter().chain(removed) {
            self.cleanup(node);
        }

        // Hooks can sit on nodes nothing observes; drop them once disposed.
        let orphaned: Vec<NodeId> = {
            let hooks = self.hooks.borrow();
            hooks
                .nodes()
                .into_iter()
                .filter(|&node| !self.host.is_alive(node))
                .collect()
        };
        count += orphaned.len();
        for node in orphaned {
            self.cleanup(node);
        }
        count
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// A binding runtime instance.
///
/// Cloning is cheap and yields another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<Inner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::build(RuntimeConfig::default(), Clock::Real)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("version", &self.inner.store.version())
            .field("subscriptions", &self.inner.subscriptions.borrow().len())
            .field("bound", &self.inner.bound.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Create a runtime that reads real time.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_clock(config, Clock::Real)
    }

    /// Create a runtime with an explicit clock (use `Clock::Lab` in tests).
    pub fn with_clock(config: RuntimeConfig, clock: Clock) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: RuntimeConfig, clock: Clock) -> Self {
        let scheduler = Scheduler::new(config.batch_size, config.batch_wait(), clock);
        let inner = Rc::new_cyclic(|this| Inner {
            this: this.clone(),
            config,
            host: Host::new(),
            store: Store::new(),
            scheduler: RefCell::new(scheduler),
            subscriptions: RefCell::new(SubscriptionRegistry::new()),
            bound: RefCell::new(BoundNodes::new()),
            hooks: RefCell::new(HookTable::new()),
            tracker: RefCell::new(LifecycleTracker::new()),
            ticking: Cell::new(false),
            failure_count: Cell::new(0),
            last_failure: RefCell::new(None),
        });
        Self { inner }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The host tree this runtime renders into.
    pub fn host(&self) -> &Host {
        &self.inner.host
    }

    // -------------------------------------------------------------------------
    // Store
    // -------------------------------------------------------------------------

    /// Initialize (or wholesale replace) the state. Must be a JSON object.
    pub fn create_store(&self, initial: Value) -> Result<()> {
        self.inner.store.initialize(initial)?;
        tracing::debug!(version = self.inner.store.version(), "store initialized");
        Ok(())
    }

    pub fn read(&self, key: &str) -> Option<Value> {
        self.inner.store.read(key)
    }

    pub fn snapshot(&self) -> Rc<State> {
        self.inner.store.snapshot()
    }

    /// Number of state snapshots installed so far.
    pub fn version(&self) -> u64 {
        self.inner.store.version()
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Validate and queue an action. Applied on a later tick.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.inner.dispatch(action)
    }

    /// Decode `{"key": .., "payload": ..}` and queue it.
    pub fn dispatch_json(&self, action: Value) -> Result<()> {
        self.inner.dispatch(Action::try_from(action)?)
    }

    /// A dispatch handle that does not keep the runtime alive.
    pub fn dispatcher(&self) -> Dispatcher {
        self.inner.dispatcher()
    }

    /// Whether a flush is armed and waiting for the next tick.
    pub fn has_pending_flush(&self) -> bool {
        self.inner.scheduler.borrow().is_armed()
    }

    // -------------------------------------------------------------------------
    // Binding
    // -------------------------------------------------------------------------

    /// Bind a render callback to slice `key`.
    pub fn bind<F>(&self, key: &str, render: F) -> Result<ViewFactory>
    where
        F: Fn(&RenderContext<'_>) -> Option<NodeId> + 'static,
    {
        if key.is_empty() {
            return Err(BindError::invalid("bind key must be a non-empty string"));
        }
        Ok(ViewFactory {
            runtime: Rc::downgrade(&self.inner),
            key: key.to_string(),
            render: Rc::new(render),
        })
    }

    /// Number of live subscriptions on `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.subscriptions.borrow().subscriber_count(key)
    }

    /// Whether `node` is the live node of some subscription.
    pub fn is_bound(&self, node: NodeId) -> bool {
        self.inner.bound.borrow().owner(node).is_some()
    }

    pub fn is_observed(&self, node: NodeId) -> bool {
        self.inner.tracker.borrow().is_observed(node)
    }

    /// Whether `node` is bound but waiting for a parent before it can be
    /// observed.
    pub fn is_pending(&self, node: NodeId) -> bool {
        self.inner.tracker.borrow().is_pending(node)
    }

    /// Number of parent watchers installed by the lifecycle tracker.
    pub fn watcher_count(&self) -> usize {
        self.inner.tracker.borrow().watcher_count()
    }

    /// Number of live nodes currently bound to a subscription.
    pub fn bound_count(&self) -> usize {
        self.inner.bound.borrow().len()
    }

    /// Number of nodes with lifecycle hooks.
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.borrow().len()
    }

    /// Number of subscriptions with a remembered last-rendered value.
    pub fn memo_count(&self) -> usize {
        self.inner.subscriptions.borrow().memo_len()
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    /// Replace the lifecycle hooks of `node`.
    pub fn set_hooks(&self, node: NodeId, hooks: LifecycleHooks) -> Result<()> {
        if hooks.is_empty() {
            return Err(BindError::invalid(
                "lifecycle hooks need at least one of mount, update, unmount",
            ));
        }
        self.check_alive(node)?;
        self.inner.hooks.borrow_mut().set(node, hooks);
        Ok(())
    }

    pub fn on_mount(&self, node: NodeId, hook: impl Fn(NodeId) + 'static) -> Result<()> {
        self.merge_hooks(node, LifecycleHooks::new().on_mount(hook))
    }

    pub fn on_update(&self, node: NodeId, hook: impl Fn(NodeId) + 'static) -> Result<()> {
        self.merge_hooks(node, LifecycleHooks::new().on_update(hook))
    }

    pub fn on_unmount(&self, node: NodeId, hook: impl Fn(NodeId) + 'static) -> Result<()> {
        self.merge_hooks(node, LifecycleHooks::new().on_unmount(hook))
    }

    fn merge_hooks(&self, node: NodeId, hooks: LifecycleHooks) -> Result<()> {
        self.check_alive(node)?;
        self.inner.hooks.borrow_mut().merge(node, hooks);
        Ok(())
    }

    fn check_alive(&self, node: NodeId) -> Result<()> {
        if self.inner.host.is_alive(node) {
            Ok(())
        } else {
            Err(BindError::invalid(format!("node {node} is not alive")))
        }
    }

    // -------------------------------------------------------------------------
    // Mount / tick
    // -------------------------------------------------------------------------

    /// Append `node` to `parent`, start observing bound nodes that were
    /// waiting for a parent, and fire mount hooks in document order.
    pub fn mount(&self, node: NodeId, parent: NodeId) -> Result<()> {
        self.inner.host.append_child(parent, node)?;
        let dead = {
            let mut tree = self.inner.host.tree_mut();
            self.inner.tracker.borrow_mut().retry_pending(&mut *tree)
        };
        for node in dead {
            self.inner.cleanup(node);
        }
        self.inner.fire_mount_hooks(node);
        Ok(())
    }

    /// Run one turn: removals first, then the armed flush.
    /// Returns whether any work was done.
    ///
    /// Calling `tick` from a render callback, hook or handler while a tick
    /// is already running does nothing and returns `false`. Work queued by
    /// such callbacks is drained by the running tick.
    pub fn tick(&self) -> bool {
        if self.inner.ticking.replace(true) {
            tracing::debug!("tick re-entered from a callback; ignored");
            return false;
        }
        let cleaned = self.inner.process_removals();
        let armed = self.inner.scheduler.borrow().is_armed();
        if armed {
            self.inner.flush();
        }
        self.inner.ticking.set(false);
        cleaned > 0 || armed
    }

    /// Whether a tick is running right now.
    pub fn is_ticking(&self) -> bool {
        self.inner.ticking.get()
    }

    /// Tick until a turn does no work. Returns the number of busy ticks.
    pub fn run_until_idle(&self) -> usize {
        let mut ticks = 0;
        while self.tick() {
            ticks += 1;
            if ticks >= MAX_IDLE_TICKS {
                tracing::warn!(ticks, "runtime still busy; giving up on idle");
                break;
            }
        }
        ticks
    }

    // -------------------------------------------------------------------------
    // Failures
    // -------------------------------------------------------------------------

    /// Number of reconciliation failures logged so far.
    pub fn failure_count(&self) -> usize {
        self.inner.failure_count.get()
    }

    /// The most recent reconciliation failure, if any.
    pub fn last_failure(&self) -> Option<BindError> {
        self.inner.last_failure.borrow().clone()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Weak dispatch capability handed to render callbacks and event handlers.
#[derive(Clone)]
pub struct Dispatcher {
    runtime: Weak<Inner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("alive", &(self.runtime.strong_count() > 0))
            .finish()
    }
}

impl Dispatcher {
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.upgrade()?.dispatch(action)
    }

    pub fn dispatch_json(&self, action: Value) -> Result<()> {
        self.upgrade()?.dispatch(Action::try_from(action)?)
    }

    fn upgrade(&self) -> Result<Rc<Inner>> {
        self.runtime
            .upgrade()
            .ok_or_else(|| BindError::invalid("runtime has been dropped"))
    }
}

// =============================================================================
// Render context
// =============================================================================

/// What a render callback sees.
pub struct RenderContext<'a> {
    key: &'a str,
    value: &'a Value,
    params: &'a Value,
    dispatcher: Dispatcher,
    host: &'a Host,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        key: &'a str,
        value: &'a Value,
        params: &'a Value,
        dispatcher: Dispatcher,
        host: &'a Host,
    ) -> Self {
        Self {
            key,
            value,
            params,
            dispatcher,
            host,
        }
    }

    /// The slice key this callback is bound to.
    pub fn key(&self) -> &str {
        self.key
    }

    /// Current value of the slice (`null` if it does not exist).
    pub fn value(&self) -> &Value {
        self.value
    }

    /// Parameters passed to [`ViewFactory::create`].
    pub fn params(&self) -> &Value {
        self.params
    }

    pub fn host(&self) -> &Host {
        self.host
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.dispatcher.dispatch(action)
    }
}

// =============================================================================
// View factory
// =============================================================================

/// Produced by [`Runtime::bind`]. Every `create` call is a new
/// render-callback identity with its own live node.
#[derive(Clone)]
pub struct ViewFactory {
    runtime: Weak<Inner>,
    key: String,
    render: RenderFn,
}

impl fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFactory")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ViewFactory {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Subscribe, render once and return the bound node.
    ///
    /// A render that panics returns `ReconciliationFailure` and leaves no
    /// subscription behind.
    pub fn create(&self, params: impl Into<Value>) -> Result<NodeId> {
        let runtime = self
            .runtime
            .upgrade()
            .ok_or_else(|| BindError::invalid("runtime has been dropped"))?;
        runtime.create_view(&self.key, &self.render, params.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::attr;
    use serde_json::json;

    fn setup() -> Runtime {
        let runtime = Runtime::default();
        runtime.create_store(json!({"count": 0})).unwrap();
        runtime
    }

    #[test]
    fn test_dispatch_validation() {
        let runtime = setup();
        assert!(matches!(
            runtime.dispatch(Action::new("", 1)),
            Err(BindError::MalformedAction { .. })
        ));
        assert!(matches!(
            runtime.dispatch(Action::new("todos", 1)),
            Err(BindError::UnknownSliceKey { .. })
        ));
        assert!(!runtime.has_pending_flush());

        runtime.dispatch(Action::new("count", 1)).unwrap();
        assert!(runtime.has_pending_flush());
    }

    #[test]
    fn test_strict_mode_rejects_updaters() {
        let runtime = Runtime::new(RuntimeConfig::default().with_updaters(false)).unwrap();
        runtime.create_store(json!({"count": 0})).unwrap();

        let err = runtime
            .dispatch(Action::update("count", |v| v.clone()))
            .unwrap_err();
        assert!(matches!(err, BindError::InvalidPayload { .. }));
        runtime.dispatch(Action::new("count", 2)).unwrap();
    }

    #[test]
    fn test_dispatch_is_deferred_to_tick() {
        let runtime = setup();
        runtime.dispatch(Action::new("count", 1)).unwrap();
        assert_eq!(runtime.read("count"), Some(json!(0)));

        assert!(runtime.tick());
        assert_eq!(runtime.read("count"), Some(json!(1)));
        assert!(!runtime.tick());
    }

    #[test]
    fn test_bind_rejects_empty_key() {
        let runtime = setup();
        assert!(matches!(
            runtime.bind("", |_| None),
            Err(BindError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_create_renders_current_value() {
        let runtime = setup();
        let view = runtime
            .bind("count", |cx| {
                cx.host()
                    .html("span", vec![attr("textContent", cx.value().to_string())], vec![])
                    .ok()
            })
            .unwrap();
        let node = view.create(Value::Null).unwrap();

        assert_eq!(runtime.host().text_content(node), "0");
        assert!(runtime.is_bound(node));
        assert!(runtime.is_pending(node));
        assert_eq!(runtime.subscriber_count("count"), 1);
    }

    #[test]
    fn test_none_render_is_bound_placeholder() {
        let runtime = setup();
        let view = runtime.bind("count", |_| None).unwrap();
        let node = view.create(Value::Null).unwrap();
        assert_eq!(
            runtime.host().kind(node),
            Some(crate::types::NodeKind::Placeholder)
        );
        assert!(runtime.is_bound(node));
    }

    #[test]
    fn test_dispatcher_outlives_runtime_gracefully() {
        let runtime = setup();
        let dispatcher = runtime.dispatcher();
        drop(runtime);
        assert!(matches!(
            dispatcher.dispatch(Action::new("count", 1)),
            Err(BindError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_set_hooks_validation() {
        let runtime = setup();
        let node = runtime.host().placeholder();
        assert!(runtime.set_hooks(node, LifecycleHooks::new()).is_err());
        assert!(runtime
            .set_hooks(node, LifecycleHooks::new().on_mount(|_| {}))
            .is_ok());

        runtime.host().dispose(node);
        assert!(runtime.on_unmount(node, |_| {}).is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Runtime::new(RuntimeConfig::default().with_batch_size(0)).is_err());
    }
}
