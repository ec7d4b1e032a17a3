//! Host Tree - Arena-backed presentation tree.
//!
//! Nodes are slots in a `Vec`. Freed slots go to a free pool for O(1) reuse
//! and bump their generation, so stale `NodeId`s fail every lookup instead of
//! aliasing the next occupant.
//!
//! The tree also implements [`TreeObserver`]: watchers installed on a node
//! buffer removal records until the lifecycle tracker drains them.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::observer::{TreeObserver, WatchFlags};
use crate::error::{BindError, Result};
use crate::types::{NodeId, NodeKind, WatchId};

// =============================================================================
// Node storage
// =============================================================================

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    attributes: IndexMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

#[derive(Debug)]
struct Watcher {
    flags: WatchFlags,
    records: Vec<NodeId>,
}

// =============================================================================
// HostTree
// =============================================================================

/// The live presentation tree.
///
/// Created with a single root element (`body`). Nodes that are not reachable
/// from the root are detached: still alive, still usable, but invisible.
#[derive(Debug)]
pub struct HostTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    watchers: HashMap<WatchId, Watcher>,
    /// Target node → watchers installed on it.
    watched: HashMap<NodeId, Vec<WatchId>>,
    next_watch: u64,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    /// Create a tree with an empty `body` root.
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::new(0, 0),
            watchers: HashMap::new(),
            watched: HashMap::new(),
            next_watch: 0,
        };
        tree.root = tree.allocate(NodeKind::Element("body".to_string()));
        tree
    }

    /// The root node. Never disposed.
    pub fn root(&self) -> NodeId {
        self.root
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let data = Some(NodeData::new(kind));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = data;
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data,
            });
            NodeId::new(index, 0)
        }
    }

    /// Create a detached element. Tags are stored lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.allocate(NodeKind::Element(tag.to_ascii_lowercase()))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Text(text.into()))
    }

    /// Create a detached empty placeholder.
    pub fn create_placeholder(&mut self) -> NodeId {
        self.allocate(NodeKind::Placeholder)
    }

    /// Dispose a node and its whole subtree, detaching it first.
    ///
    /// The root cannot be disposed. Watchers installed on disposed nodes keep
    /// their buffered records until they are unwatched.
    pub fn dispose(&mut self, node: NodeId) {
        if node == self.root || !self.is_alive(node) {
            return;
        }
        if let Some(parent) = self.parent(node) {
            self.detach(parent, node);
        }
        for id in self.descendants(node) {
            self.watched.remove(&id);
            let slot = &mut self.slots[id.index as usize];
            slot.data = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(node.index as usize)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.data.as_ref()
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(node.index as usize)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.data.as_mut()
    }

    /// Whether `node` refers to a live slot.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.data(node).is_some()
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.data.is_some()).count()
    }

    /// Always false: the root is always alive.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.data(node).map(|d| &d.kind)
    }

    /// Tag identity (`#text` / `#placeholder` for non-elements).
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.data(node).map(|d| d.kind.tag())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).and_then(|d| d.parent)
    }

    /// Children in order. Empty for dead nodes.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.data(node)
            .and_then(|d| d.attributes.get(name))
            .map(String::as_str)
    }

    /// All attributes in insertion order.
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.data(node)
            .map(|d| {
                d.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.is_alive(ancestor) {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    /// Depth below the topmost ancestor (0 for detached roots and the root).
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(node);
        while let Some(id) = current {
            depth += 1;
            current = self.parent(id);
        }
        depth
    }

    /// `node` and all its descendants in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(node) {
            return out;
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for id in self.descendants(node) {
            if let Some(NodeKind::Text(text)) = self.kind(id) {
                out.push_str(text);
            }
        }
        out
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Set an attribute. Returns false if the node is not an alive element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) -> bool {
        match self.data_mut(node) {
            Some(data) if matches!(data.kind, NodeKind::Element(_)) => {
                data.attributes.insert(name.to_string(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Remove an attribute. Returns whether it existed.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        self.data_mut(node)
            .map(|d| d.attributes.shift_remove(name).is_some())
            .unwrap_or(false)
    }

    /// Replace the text of a text node. Returns false for other kinds.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> bool {
        match self.data_mut(node) {
            Some(NodeData {
                kind: NodeKind::Text(current),
                ..
            }) => {
                *current = text.into();
                true
            }
            _ => false,
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        match self.kind(parent) {
            Some(NodeKind::Element(_)) => {}
            Some(_) => return Err(BindError::invalid(format!("{parent} cannot have children"))),
            None => return Err(BindError::invalid(format!("parent {parent} is not alive"))),
        }
        if !self.is_alive(child) {
            return Err(BindError::invalid(format!("child {child} is not alive")));
        }
        if child == self.root {
            return Err(BindError::invalid("the root cannot be re-parented"));
        }
        if self.contains(child, parent) {
            return Err(BindError::invalid(format!(
                "{child} is an ancestor of {parent}"
            )));
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        if let Some(old_parent) = self.parent(child) {
            self.detach(old_parent, child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.data_mut(parent) {
            data.children.push(child);
        }
        Ok(())
    }

    /// Remove `child` from `parent`. The child stays alive, detached.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(BindError::invalid(format!(
                "{child} is not a child of {parent}"
            )));
        }
        self.detach(parent, child);
        Ok(())
    }

    /// Swap `old` for `new` at the same position under `parent`.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<()> {
        if self.parent(old) != Some(parent) {
            return Err(BindError::invalid(format!("{old} is not a child of {parent}")));
        }
        if new == old {
            return Ok(());
        }
        self.check_insertable(parent, new)?;
        if let Some(new_parent) = self.parent(new) {
            self.detach(new_parent, new);
        }
        let Some(position) = self.children(parent).iter().position(|&c| c == old) else {
            return Err(BindError::invalid(format!("{old} is not a child of {parent}")));
        };
        let was_connected = self.is_connected(parent);
        if let Some(data) = self.data_mut(parent) {
            data.children[position] = new;
        }
        if let Some(data) = self.data_mut(new) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.data_mut(old) {
            data.parent = None;
        }
        self.record_removal(parent, old, was_connected);
        Ok(())
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let was_connected = self.is_connected(parent);
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|&c| c != child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = None;
        }
        self.record_removal(parent, child, was_connected);
    }

    fn record_removal(&mut self, parent: NodeId, child: NodeId, was_connected: bool) {
        if let Some(ids) = self.watched.get(&parent) {
            for id in ids {
                if let Some(watcher) = self.watchers.get_mut(id)
                    && watcher.flags.contains(WatchFlags::CHILD_LIST)
                {
                    watcher.records.push(child);
                }
            }
        }

        if !was_connected || self.watched.is_empty() {
            return;
        }

        // Watched nodes inside the detached subtree lose their connection too.
        for id in self.descendants(child) {
            let Some(watch_ids) = self.watched.get(&id) else { continue };
            let children = self.children(id).to_vec();
            for watch_id in watch_ids {
                if let Some(watcher) = self.watchers.get_mut(watch_id)
                    && watcher.flags.contains(WatchFlags::DISCONNECT)
                {
                    watcher.records.extend(children.iter().copied());
                }
            }
        }
    }

    /// Number of installed watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }
}

// =============================================================================
// TreeObserver
// =============================================================================

impl TreeObserver for HostTree {
    fn watch(&mut self, target: NodeId, flags: WatchFlags) -> Option<WatchId> {
        if !self.is_alive(target) {
            return None;
        }
        let id = WatchId(self.next_watch);
        self.next_watch += 1;
        self.watchers.insert(
            id,
            Watcher {
                flags,
                records: Vec::new(),
            },
        );
        self.watched.entry(target).or_default().push(id);
        Some(id)
    }

    fn unwatch(&mut self, watch: WatchId) {
        if self.watchers.remove(&watch).is_none() {
            return;
        }
        self.watched.retain(|_, ids| {
            ids.retain(|&id| id != watch);
            !ids.is_empty()
        });
    }

    fn take_removals(&mut self, watch: WatchId) -> Vec<NodeId> {
        self.watchers
            .get_mut(&watch)
            .map(|w| std::mem::take(&mut w.records))
            .unwrap_or_default()
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        HostTree::is_connected(self, node)
    }

    fn is_alive(&self, node: NodeId) -> bool {
        HostTree::is_alive(self, node)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_text_content() {
        let mut tree = HostTree::new();
        let div = tree.create_element("DIV");
        let text = tree.create_text("Hello");
        tree.append_child(div, text).unwrap();
        tree.append_child(tree.root(), div).unwrap();

        assert_eq!(tree.tag(div), Some("div"));
        assert_eq!(tree.text_content(div), "Hello");
        assert!(tree.is_connected(text));
        assert_eq!(tree.depth(text), 2);
    }

    #[test]
    fn test_dispose_invalidates_ids() {
        let mut tree = HostTree::new();
        let a = tree.create_element("p");
        tree.dispose(a);
        assert!(!tree.is_alive(a));

        // Slot is reused with a new generation
        let b = tree.create_element("p");
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!tree.is_alive(a));
        assert!(tree.is_alive(b));
    }

    #[test]
    fn test_dispose_root_is_noop() {
        let mut tree = HostTree::new();
        let root = tree.root();
        tree.dispose(root);
        assert!(tree.is_alive(root));
    }

    #[test]
    fn test_append_rejects_cycles_and_leaf_parents() {
        let mut tree = HostTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("div");
        tree.append_child(outer, inner).unwrap();

        assert!(tree.append_child(inner, outer).is_err());

        let text = tree.create_text("x");
        let span = tree.create_element("span");
        assert!(tree.append_child(text, span).is_err());
    }

    #[test]
    fn test_append_moves_existing_child() {
        let mut tree = HostTree::new();
        let a = tree.create_element("div");
        let b = tree.create_element("div");
        let child = tree.create_element("span");
        tree.append_child(a, child).unwrap();
        tree.append_child(b, child).unwrap();

        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[child]);
        assert_eq!(tree.parent(child), Some(b));
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let mut tree = HostTree::new();
        let list = tree.create_element("ul");
        let first = tree.create_element("li");
        let second = tree.create_element("li");
        let third = tree.create_element("li");
        tree.append_child(list, first).unwrap();
        tree.append_child(list, second).unwrap();
        tree.append_child(list, third).unwrap();

        let fresh = tree.create_element("li");
        tree.replace_child(list, fresh, second).unwrap();

        assert_eq!(tree.children(list), &[first, fresh, third]);
        assert_eq!(tree.parent(second), None);
    }

    #[test]
    fn test_child_list_watcher_records_removals() {
        let mut tree = HostTree::new();
        let parent = tree.create_element("div");
        tree.append_child(tree.root(), parent).unwrap();
        let child = tree.create_element("p");
        tree.append_child(parent, child).unwrap();

        let watch = tree.watch(parent, WatchFlags::CHILD_LIST).unwrap();
        tree.remove_child(parent, child).unwrap();

        assert_eq!(tree.take_removals(watch), vec![child]);
        // Drained
        assert!(tree.take_removals(watch).is_empty());
    }

    #[test]
    fn test_disconnect_watcher_reports_children_of_detached_target() {
        let mut tree = HostTree::new();
        let section = tree.create_element("section");
        let parent = tree.create_element("div");
        let child = tree.create_element("p");
        tree.append_child(tree.root(), section).unwrap();
        tree.append_child(section, parent).unwrap();
        tree.append_child(parent, child).unwrap();

        let watch = tree.watch(parent, WatchFlags::all()).unwrap();
        tree.remove_child(tree.root(), section).unwrap();

        assert_eq!(tree.take_removals(watch), vec![child]);
        assert!(!tree.is_connected(child));
    }

    #[test]
    fn test_unwatch_stops_records() {
        let mut tree = HostTree::new();
        let parent = tree.create_element("div");
        let child = tree.create_element("p");
        tree.append_child(parent, child).unwrap();

        let watch = tree.watch(parent, WatchFlags::CHILD_LIST).unwrap();
        assert_eq!(tree.watcher_count(), 1);
        tree.unwatch(watch);
        assert_eq!(tree.watcher_count(), 0);

        tree.remove_child(parent, child).unwrap();
        assert!(tree.take_removals(watch).is_empty());
    }

    #[test]
    fn test_watch_dead_node_fails() {
        let mut tree = HostTree::new();
        let node = tree.create_element("div");
        tree.dispose(node);
        assert!(tree.watch(node, WatchFlags::CHILD_LIST).is_none());
    }

    #[test]
    fn test_attributes_round_trip() {
        let mut tree = HostTree::new();
        let node = tree.create_element("input");
        assert!(tree.set_attribute(node, "type", "text"));
        assert!(tree.set_attribute(node, "value", "a"));
        assert_eq!(tree.attribute(node, "type"), Some("text"));
        assert!(tree.remove_attribute(node, "type"));
        assert!(!tree.remove_attribute(node, "type"));
        assert_eq!(
            tree.attributes(node),
            vec![("value".to_string(), "a".to_string())]
        );

        let text = tree.create_text("t");
        assert!(!tree.set_attribute(text, "id", "x"));
    }
}
