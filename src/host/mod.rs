//! Host - the presentation tree the runtime renders into.
//!
//! - [`HostTree`]: arena of elements, text nodes and placeholders
//! - [`TreeObserver`]: removal-watching contract the lifecycle tracker uses
//! - [`EventDelegation`]: event type → node → handler, one root listener per type
//! - [`html`]: declarative element construction
//!
//! [`Host`] is a cheap, cloneable handle over a tree and its delegation
//! registry. Render callbacks receive one, so they can build nodes while the
//! runtime is in the middle of a notification pass.

mod build;
mod events;
mod observer;
mod tree;

pub use build::{attr, html, on, Attr, AttrValue, Child};
pub use events::{Event, EventDelegation, EventHandler, ListenerPhase, NON_BUBBLING_EVENTS};
pub use observer::{TreeObserver, WatchFlags};
pub use tree::HostTree;

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::error::Result;
use crate::types::{NodeId, NodeKind};

// =============================================================================
// Host handle
// =============================================================================

/// Shared handle to the host tree and its event delegation.
///
/// Never hold the borrows returned by [`Host::tree`] / [`Host::tree_mut`]
/// across a call back into the runtime.
#[derive(Clone, Default)]
pub struct Host {
    tree: Rc<RefCell<HostTree>>,
    events: Rc<RefCell<EventDelegation>>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("nodes", &self.tree.borrow().len())
            .field("handlers", &self.events.borrow().handler_count())
            .finish()
    }
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> Ref<'_, HostTree> {
        self.tree.borrow()
    }

    pub fn tree_mut(&self) -> RefMut<'_, HostTree> {
        self.tree.borrow_mut()
    }

    pub fn events(&self) -> Ref<'_, EventDelegation> {
        self.events.borrow()
    }

    pub fn events_mut(&self) -> RefMut<'_, EventDelegation> {
        self.events.borrow_mut()
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build an element. See [`html`].
    pub fn html(&self, tag: &str, attrs: Vec<Attr>, children: Vec<Child>) -> Result<NodeId> {
        html(
            &mut self.tree.borrow_mut(),
            &mut self.events.borrow_mut(),
            tag,
            attrs,
            children,
        )
    }

    pub fn text(&self, text: impl Into<String>) -> NodeId {
        self.tree.borrow_mut().create_text(text)
    }

    pub fn placeholder(&self) -> NodeId {
        self.tree.borrow_mut().create_placeholder()
    }

    // -------------------------------------------------------------------------
    // Tree access
    // -------------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.tree.borrow().root()
    }

    pub fn is_alive(&self, node: NodeId) -> bool {
        self.tree.borrow().is_alive(node)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.tree.borrow().is_connected(node)
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.tree.borrow().kind(node).cloned()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().parent(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree.borrow().children(node).to_vec()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree.borrow().attribute(node, name).map(str::to_string)
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.tree.borrow().text_content(node)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.tree.borrow_mut().append_child(parent, child)
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.tree.borrow_mut().remove_child(parent, child)
    }

    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<()> {
        self.tree.borrow_mut().replace_child(parent, new, old)
    }

    /// Detach `node` from its parent, if it has one.
    pub fn detach(&self, node: NodeId) -> Result<()> {
        let parent = self.parent(node);
        match parent {
            Some(parent) => self.remove_child(parent, node),
            None => Ok(()),
        }
    }

    /// Free `node` and its subtree, releasing their delegated handlers.
    pub fn dispose(&self, node: NodeId) {
        self.release_subtree(node);
        self.tree.borrow_mut().dispose(node);
    }

    /// Drop the delegated handlers of `node` and its descendants. Root
    /// listeners left without handlers are removed. Returns the number of
    /// handler entries dropped.
    pub fn release_subtree(&self, node: NodeId) -> usize {
        let nodes = self.tree.borrow().descendants(node);
        self.events.borrow_mut().release_all(&nodes)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Fire `event_type` at `target` through the delegation registry.
    /// Returns the number of handlers that ran.
    pub fn dispatch_event(&self, event_type: &str, target: NodeId) -> usize {
        let routed = {
            let tree = self.tree.borrow();
            self.events.borrow().route(&tree, event_type, target)
        };
        let count = routed.len();
        for (event, handler) in routed {
            handler(&event);
        }
        count
    }
}
