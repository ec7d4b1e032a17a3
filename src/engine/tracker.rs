//! Lifecycle Tracker - detects bound nodes leaving the host tree.
//!
//! One watcher per parent that has observed children. The watcher reports
//! direct-child removals and, when the parent itself is cut off by an
//! ancestor removal, the children it still holds. The runtime drains those
//! records each tick and cascades cleanup for every observed node that is no
//! longer connected to the root.
//!
//! # Observation tokens
//!
//! `tokens[node] = parent` marks `node` as observed. Observing a node that
//! already has a token does nothing, so repeated `observe` calls never stack
//! watchers.
//!
//! # Pending nodes
//!
//! A node with no parent cannot be watched yet. It is kept on the pending
//! list and observed as soon as a retry finds it attached.

use indexmap::{IndexMap, IndexSet};

use crate::host::{TreeObserver, WatchFlags};
use crate::types::{NodeId, WatchId};

/// Outcome of [`LifecycleTracker::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Observed,
    AlreadyObserved,
    /// No parent yet; retried later.
    Pending,
}

#[derive(Debug)]
struct ParentWatch {
    watch: WatchId,
    children: IndexSet<NodeId>,
}

#[derive(Debug, Default)]
pub struct LifecycleTracker {
    parents: IndexMap<NodeId, ParentWatch>,
    tokens: IndexMap<NodeId, NodeId>,
    pending: IndexSet<NodeId>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `node` for removal.
    pub fn observe(&mut self, tree: &mut impl TreeObserver, node: NodeId) -> Observation {
        if self.tokens.contains_key(&node) {
            return Observation::AlreadyObserved;
        }
        let Some(parent) = tree.parent_of(node) else {
            if self.pending.insert(node) {
                tracing::warn!(%node, "observed node has no parent; waiting for it to be attached");
            }
            return Observation::Pending;
        };

        if !self.parents.contains_key(&parent) {
            let Some(watch) = tree.watch(parent, WatchFlags::CHILD_LIST | WatchFlags::DISCONNECT) else {
                self.pending.insert(node);
                return Observation::Pending;
            };
            self.parents.insert(
                parent,
                ParentWatch {
                    watch,
                    children: IndexSet::new(),
                },
            );
        }
        if let Some(entry) = self.parents.get_mut(&parent) {
            entry.children.insert(node);
        }
        self.tokens.insert(node, parent);
        self.pending.shift_remove(&node);
        Observation::Observed
    }

    /// Stop watching `node`. Tears down the parent watcher when `node` was
    /// its last observed child.
    pub fn unobserve(&mut self, tree: &mut impl TreeObserver, node: NodeId) {
        self.pending.shift_remove(&node);
        let Some(parent) = self.tokens.shift_remove(&node) else {
            return;
        };
        let emptied = match self.parents.get_mut(&parent) {
            Some(entry) => {
                entry.children.shift_remove(&node);
                entry.children.is_empty()
            }
            None => false,
        };
        if emptied {
            if let Some(entry) = self.parents.shift_remove(&parent) {
                tree.unwatch(entry.watch);
                tracing::debug!(%parent, "parent watcher torn down");
            }
        }
    }

    /// Move the observation of `old` onto `new` (used when a live node is
    /// replaced).
    pub fn retarget(&mut self, tree: &mut impl TreeObserver, old: NodeId, new: NodeId) -> Observation {
        self.unobserve(tree, old);
        self.observe(tree, new)
    }

    /// Observe every pending node that has been attached since.
    ///
    /// Returns pending nodes that died before being attached; they will
    /// never be observed and should be cleaned up by the caller.
    pub fn retry_pending(&mut self, tree: &mut impl TreeObserver) -> Vec<NodeId> {
        let mut dead = Vec::new();
        let pending: Vec<_> = self.pending.iter().copied().collect();
        for node in pending {
            if !tree.is_alive(node) {
                self.pending.shift_remove(&node);
                dead.push(node);
            } else if tree.parent_of(node).is_some() {
                self.observe(tree, node);
            }
        }
        dead
    }

    /// Drain every parent watcher and return the observed nodes that are no
    /// longer connected. Parents are drained in the order they were first
    /// watched, records in the order they were made.
    ///
    /// Observed nodes that were disposed are returned too, even when no
    /// removal was recorded for them (a detached parent disposed with its
    /// children reports nothing).
    ///
    /// Observed nodes that were moved to another connected parent are
    /// re-observed under it.
    pub fn collect_removals(&mut self, tree: &mut impl TreeObserver) -> Vec<NodeId> {
        let mut removed = IndexSet::new();
        let mut moved = Vec::new();

        let parents: Vec<_> = self.parents.iter().map(|(&p, e)| (p, e.watch)).collect();
        for (parent, watch) in parents {
            for child in tree.take_removals(watch) {
                if self.tokens.get(&child) != Some(&parent) {
                    continue;
                }
                if !tree.is_connected(child) {
                    removed.insert(child);
                } else if tree.parent_of(child) != Some(parent) {
                    moved.push(child);
                }
            }
        }

        for &node in self.tokens.keys() {
            if !tree.is_alive(node) {
                removed.insert(node);
            }
        }

        for node in moved {
            self.unobserve(tree, node);
            self.observe(tree, node);
        }
        removed.into_iter().collect()
    }

    pub fn is_observed(&self, node: NodeId) -> bool {
        self.tokens.contains_key(&node)
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    /// Number of parent watchers installed.
    pub fn watcher_count(&self) -> usize {
        self.parents.len()
    }
}
