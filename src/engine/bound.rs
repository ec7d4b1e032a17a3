//! Bound Node Records and lifecycle hooks.
//!
//! `SubscriptionId ↔ NodeId`, kept in both directions so the reconciler can
//! find the live node of a subscription and the cleanup cascade can find the
//! subscription of a removed node.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::types::{NodeId, SubscriptionId};

// =============================================================================
// Bound nodes
// =============================================================================

#[derive(Debug, Default)]
pub struct BoundNodes {
    node_of: HashMap<SubscriptionId, NodeId>,
    owner_of: HashMap<NodeId, SubscriptionId>,
}

impl BoundNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SubscriptionId, node: NodeId) {
        if let Some(old) = self.node_of.insert(id, node) {
            self.owner_of.remove(&old);
        }
        self.owner_of.insert(node, id);
    }

    /// Live node of a subscription.
    pub fn node(&self, id: SubscriptionId) -> Option<NodeId> {
        self.node_of.get(&id).copied()
    }

    /// Subscription that owns `node`.
    pub fn owner(&self, node: NodeId) -> Option<SubscriptionId> {
        self.owner_of.get(&node).copied()
    }

    /// Point `id` at a new live node. Returns the previous one.
    pub fn retarget(&mut self, id: SubscriptionId, node: NodeId) -> Option<NodeId> {
        let old = self.node_of.get(&id).copied()?;
        self.insert(id, node);
        Some(old)
    }

    /// Forget the record for `node`. Returns its owner.
    pub fn remove_node(&mut self, node: NodeId) -> Option<SubscriptionId> {
        let id = self.owner_of.remove(&node)?;
        self.node_of.remove(&id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.node_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_of.is_empty()
    }
}

// =============================================================================
// Lifecycle hooks
// =============================================================================

/// Hook callback. Receives the node it is attached to.
pub type Hook = Rc<dyn Fn(NodeId)>;

/// Mount / update / unmount callbacks for one node.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    /// Fired when the node's subtree is mounted with `Runtime::mount`.
    pub mount: Option<Hook>,
    /// Fired after the node is reconciled.
    pub update: Option<Hook>,
    /// Fired first in the cleanup cascade.
    pub unmount: Option<Hook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_mount(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.mount = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_update(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.update = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_unmount(mut self, hook: impl Fn(NodeId) + 'static) -> Self {
        self.unmount = Some(Rc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mount.is_none() && self.update.is_none() && self.unmount.is_none()
    }

    /// Overlay the hooks set in `other`.
    fn merge(&mut self, other: LifecycleHooks) {
        if other.mount.is_some() {
            self.mount = other.mount;
        }
        if other.update.is_some() {
            self.update = other.update;
        }
        if other.unmount.is_some() {
            self.unmount = other.unmount;
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("mount", &self.mount.is_some())
            .field("update", &self.update.is_some())
            .field("unmount", &self.unmount.is_some())
            .finish()
    }
}

/// Which hook to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Mount,
    Update,
    Unmount,
}

#[derive(Debug, Default)]
pub struct HookTable {
    hooks: HashMap<NodeId, LifecycleHooks>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every hook of `node`.
    pub fn set(&mut self, node: NodeId, hooks: LifecycleHooks) {
        self.hooks.insert(node, hooks);
    }

    /// Set only the hooks present in `hooks`, keeping the others.
    pub fn merge(&mut self, node: NodeId, hooks: LifecycleHooks) {
        self.hooks.entry(node).or_default().merge(hooks);
    }

    pub fn get(&self, node: NodeId, kind: HookKind) -> Option<Hook> {
        let hooks = self.hooks.get(&node)?;
        match kind {
            HookKind::Mount => hooks.mount.clone(),
            HookKind::Update => hooks.update.clone(),
            HookKind::Unmount => hooks.unmount.clone(),
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.hooks.contains_key(&node)
    }

    pub fn remove(&mut self, node: NodeId) -> Option<LifecycleHooks> {
        self.hooks.remove(&node)
    }

    /// Move the hooks of `from` onto `to`, replacing any `to` had.
    /// Nothing happens when `from` has no hooks.
    pub fn transfer(&mut self, from: NodeId, to: NodeId) {
        if let Some(hooks) = self.hooks.remove(&from) {
            self.hooks.insert(to, hooks);
        }
    }

    /// Nodes that have hooks, in id order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.hooks.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_bound_records_are_bidirectional() {
        let mut bound = BoundNodes::new();
        let id = SubscriptionId(1);
        let a = NodeId::new(1, 0);
        let b = NodeId::new(2, 0);

        bound.insert(id, a);
        assert_eq!(bound.node(id), Some(a));
        assert_eq!(bound.owner(a), Some(id));

        assert_eq!(bound.retarget(id, b), Some(a));
        assert_eq!(bound.owner(a), None);
        assert_eq!(bound.owner(b), Some(id));

        assert_eq!(bound.remove_node(b), Some(id));
        assert!(bound.is_empty());
    }

    #[test]
    fn test_retarget_unknown_subscription_is_none() {
        let mut bound = BoundNodes::new();
        assert_eq!(bound.retarget(SubscriptionId(9), NodeId::new(1, 0)), None);
        assert!(bound.is_empty());
    }

    #[test]
    fn test_merge_keeps_other_hooks() {
        let mut table = HookTable::new();
        let node = NodeId::new(3, 0);
        let fired = Rc::new(Cell::new(0));

        let f = fired.clone();
        table.merge(node, LifecycleHooks::new().on_mount(move |_| f.set(f.get() + 1)));
        let f = fired.clone();
        table.merge(node, LifecycleHooks::new().on_unmount(move |_| f.set(f.get() + 10)));

        table.get(node, HookKind::Mount).unwrap()(node);
        table.get(node, HookKind::Unmount).unwrap()(node);
        assert_eq!(fired.get(), 11);
        assert!(table.get(node, HookKind::Update).is_none());
    }

    #[test]
    fn test_transfer_moves_hooks() {
        let mut table = HookTable::new();
        let fresh = NodeId::new(1, 0);
        let live = NodeId::new(2, 0);
        table.set(live, LifecycleHooks::new().on_update(|_| {}));
        table.set(fresh, LifecycleHooks::new().on_mount(|_| {}));

        table.transfer(fresh, live);
        assert!(!table.contains(fresh));
        assert!(table.get(live, HookKind::Mount).is_some());
        assert!(table.get(live, HookKind::Update).is_none());

        // No hooks on the source: destination untouched
        table.transfer(fresh, live);
        assert!(table.get(live, HookKind::Mount).is_some());
    }
}
