//! Tree Observer - removal watching contract.
//!
//! The lifecycle tracker never talks to a concrete tree. It depends only on
//! this capability: install a watcher on a node, pull the removal records
//! that accumulated since the last pull, and tear the watcher down.
//!
//! Records are buffered by the implementation and handed out lazily, so the
//! stream can be drained at any point and resumes where it left off.

use crate::types::{NodeId, WatchId};

bitflags::bitflags! {
    /// What a watcher reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WatchFlags: u8 {
        /// Direct children removed from the watched node.
        const CHILD_LIST = 1 << 0;
        /// Children of the watched node, when the watched node itself is
        /// detached by an ancestor removal.
        const DISCONNECT = 1 << 1;
    }
}

/// Removal-watching capability of a host tree.
pub trait TreeObserver {
    /// Install a watcher on `target`. Returns `None` if `target` is not alive.
    fn watch(&mut self, target: NodeId, flags: WatchFlags) -> Option<WatchId>;

    /// Remove a watcher. Unknown ids are ignored.
    fn unwatch(&mut self, watch: WatchId);

    /// Drain the removal records buffered for `watch`, oldest first.
    fn take_removals(&mut self, watch: WatchId) -> Vec<NodeId>;

    /// Current parent of `node`, if any.
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` is reachable from the tree root.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Whether `node` still refers to a live node.
    fn is_alive(&self, node: NodeId) -> bool;
}
