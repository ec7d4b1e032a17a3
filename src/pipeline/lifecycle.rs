//! Cleanup cascade and lifecycle hook dispatch.
//!
//! Cleanup is best effort: every step runs even when an earlier one fails,
//! and a panicking unmount hook is logged and skipped.
//!
//! Order for a removed node:
//! 1. unmount hook
//! 2. unsubscribe (drops the memo entry too)
//! 3. release delegated handlers of the subtree
//! 4. forget the bound record and hooks
//! 5. stop observing
//! 6. repeat for tracked nodes nested in the subtree

use std::panic::{self, AssertUnwindSafe};

use super::runtime::Inner;
use crate::engine::HookKind;
use crate::error::panic_message;
use crate::types::NodeId;

impl Inner {
    pub(crate) fn fire_hook(&self, node: NodeId, kind: HookKind) {
        let hook = self.hooks.borrow().get(node, kind);
        let Some(hook) = hook else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(node))) {
            tracing::error!(
                %node,
                ?kind,
                message = %panic_message(payload.as_ref()),
                "lifecycle hook panicked"
            );
        }
    }

    /// Fire mount hooks for `root` and its descendants, in document order.
    pub(crate) fn fire_mount_hooks(&self, root: NodeId) {
        let nodes = self.host.tree().descendants(root);
        for node in nodes {
            self.fire_hook(node, HookKind::Mount);
        }
    }

    /// Whether any side table still refers to `node`.
    fn is_tracked(&self, node: NodeId) -> bool {
        if self.bound.borrow().owner(node).is_some() || self.hooks.borrow().contains(node) {
            return true;
        }
        let tracker = self.tracker.borrow();
        tracker.is_observed(node) || tracker.is_pending(node)
    }

    /// Run the cleanup cascade for a node that left the tree.
    pub(crate) fn cleanup(&self, node: NodeId) {
        self.fire_hook(node, HookKind::Unmount);

        let owner = self.bound.borrow().owner(node);
        if let Some(id) = owner {
            self.subscriptions.borrow_mut().unsubscribe(id);
        }

        let mut subtree = self.host.tree().descendants(node);
        if subtree.is_empty() {
            // Disposed: only its own handler entries can be found.
            subtree.push(node);
        }
        let released = self.host.events_mut().release_all(&subtree);

        self.bound.borrow_mut().remove_node(node);
        self.hooks.borrow_mut().remove(node);
        {
            let mut tree = self.host.tree_mut();
            self.tracker.borrow_mut().unobserve(&mut *tree, node);
        }
        tracing::debug!(%node, subscription = ?owner, released, "bound node cleaned up");

        for nested in subtree.into_iter().skip(1) {
            if self.is_tracked(nested) {
                self.cleanup(nested);
            }
        }
    }

    /// Destroy a node that no subscription owns any more: clean up tracked
    /// nodes inside it, then free the subtree.
    pub(crate) fn discard(&self, node: NodeId) {
        let subtree = self.host.tree().descendants(node);
        for id in subtree {
            if self.is_tracked(id) {
                self.cleanup(id);
            }
        }
        self.host.dispose(node);
    }
}
