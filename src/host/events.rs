//! Event Delegation - one root listener per event type.
//!
//! Handlers are never attached to individual nodes. The registry maps
//! event type → node → handler, and installs a single root-level listener
//! the first time an event type is seen. Dispatching an event walks the
//! handler map for that type and calls every handler whose node is the
//! target or one of its ancestors.
//!
//! Non-bubbling event types are delegated in the capture phase (outermost
//! handler first); everything else bubbles (innermost handler first).

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::tree::HostTree;
use crate::types::NodeId;

// =============================================================================
// TYPES
// =============================================================================

/// Event types that do not bubble and are therefore delegated in capture.
pub const NON_BUBBLING_EVENTS: &[&str] = &[
    "change",
    "error",
    "load",
    "mouseenter",
    "mouseleave",
    "reset",
    "scroll",
    "unload",
];

/// Phase a root listener is installed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    Capture,
    Bubble,
}

impl ListenerPhase {
    /// Phase used for `event_type`.
    pub fn for_event(event_type: &str) -> Self {
        if NON_BUBBLING_EVENTS.contains(&event_type) {
            ListenerPhase::Capture
        } else {
            ListenerPhase::Bubble
        }
    }
}

/// A delegated event as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    /// Node the event was fired on.
    pub target: NodeId,
    /// Node whose handler is running.
    pub current_target: NodeId,
}

/// Event handler (Rc so it can be cloned out of the registry before calling).
pub type EventHandler = Rc<dyn Fn(&Event)>;

// =============================================================================
// REGISTRY
// =============================================================================

/// Delegated event registry.
#[derive(Default)]
pub struct EventDelegation {
    handlers: IndexMap<String, IndexMap<NodeId, EventHandler>>,
    listeners: HashMap<String, ListenerPhase>,
}

impl std::fmt::Debug for EventDelegation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDelegation")
            .field("event_types", &self.handlers.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl EventDelegation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `(event_type, node)`, replacing any previous one.
    pub fn register(&mut self, event_type: &str, node: NodeId, handler: EventHandler) {
        let event_type = event_type.to_ascii_lowercase();
        if !self.listeners.contains_key(&event_type) {
            let phase = ListenerPhase::for_event(&event_type);
            tracing::debug!(event_type = %event_type, ?phase, "installing root listener");
            self.listeners.insert(event_type.clone(), phase);
        }
        self.handlers
            .entry(event_type)
            .or_default()
            .insert(node, handler);
    }

    /// Handler registered for `(event_type, node)`.
    pub fn handler(&self, event_type: &str, node: NodeId) -> Option<EventHandler> {
        self.handlers.get(event_type)?.get(&node).cloned()
    }

    /// All `(event_type, handler)` pairs keyed to `node`.
    pub fn handlers_for(&self, node: NodeId) -> Vec<(String, EventHandler)> {
        self.handlers
            .iter()
            .filter_map(|(event_type, map)| {
                map.get(&node).map(|h| (event_type.clone(), h.clone()))
            })
            .collect()
    }

    /// Drop every handler keyed to `node`. Root listeners whose handler map
    /// becomes empty are removed. Returns the number of handlers dropped.
    pub fn release(&mut self, node: NodeId) -> usize {
        let mut released = 0;
        let mut emptied = Vec::new();
        for (event_type, map) in self.handlers.iter_mut() {
            if map.shift_remove(&node).is_some() {
                released += 1;
                if map.is_empty() {
                    emptied.push(event_type.clone());
                }
            }
        }
        for event_type in emptied {
            self.handlers.shift_remove(&event_type);
            self.listeners.remove(&event_type);
            tracing::debug!(event_type = %event_type, "removed root listener");
        }
        released
    }

    /// Release handlers for every node in `nodes`.
    pub fn release_all(&mut self, nodes: &[NodeId]) -> usize {
        nodes.iter().map(|&node| self.release(node)).sum()
    }

    /// Whether a root listener is installed for `event_type`.
    pub fn has_listener(&self, event_type: &str) -> bool {
        self.listeners.contains_key(event_type)
    }

    /// Phase of the root listener for `event_type`.
    pub fn listener_phase(&self, event_type: &str) -> Option<ListenerPhase> {
        self.listeners.get(event_type).copied()
    }

    /// Total handler entries across all event types.
    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(IndexMap::len).sum()
    }

    /// Resolve which handlers an event on `target` reaches, in call order.
    ///
    /// Handlers are cloned out so the caller can run them without holding
    /// a borrow of the registry or the tree.
    pub fn route(&self, tree: &HostTree, event_type: &str, target: NodeId) -> Vec<(Event, EventHandler)> {
        let event_type = event_type.to_ascii_lowercase();
        let Some(map) = self.handlers.get(&event_type) else {
            return Vec::new();
        };
        let mut hits: Vec<(usize, NodeId, EventHandler)> = map
            .iter()
            .filter(|(node, _)| tree.contains(**node, target))
            .map(|(node, handler)| (tree.depth(*node), *node, handler.clone()))
            .collect();

        match self.listener_phase(&event_type) {
            Some(ListenerPhase::Capture) => hits.sort_by_key(|(depth, _, _)| *depth),
            _ => hits.sort_by_key(|(depth, _, _)| std::cmp::Reverse(*depth)),
        }

        hits.into_iter()
            .map(|(_, node, handler)| {
                let event = Event {
                    event_type: event_type.clone(),
                    target,
                    current_target: node,
                };
                (event, handler)
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<NodeId>>>, impl Fn() -> EventHandler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let make = move || -> EventHandler {
            let log = log_clone.clone();
            Rc::new(move |event: &Event| log.borrow_mut().push(event.current_target))
        };
        (log, make)
    }

    #[test]
    fn test_phase_for_event() {
        assert_eq!(ListenerPhase::for_event("click"), ListenerPhase::Bubble);
        assert_eq!(ListenerPhase::for_event("scroll"), ListenerPhase::Capture);
        assert_eq!(ListenerPhase::for_event("mouseenter"), ListenerPhase::Capture);
    }

    #[test]
    fn test_route_bubbles_innermost_first() {
        let mut tree = HostTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("button");
        tree.append_child(outer, inner).unwrap();

        let (log, make) = recorder();
        let mut events = EventDelegation::new();
        events.register("click", outer, make());
        events.register("click", inner, make());

        for (event, handler) in events.route(&tree, "click", inner) {
            handler(&event);
        }
        assert_eq!(*log.borrow(), vec![inner, outer]);
    }

    #[test]
    fn test_route_captures_outermost_first() {
        let mut tree = HostTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("div");
        tree.append_child(outer, inner).unwrap();

        let (log, make) = recorder();
        let mut events = EventDelegation::new();
        events.register("scroll", inner, make());
        events.register("scroll", outer, make());

        for (event, handler) in events.route(&tree, "scroll", inner) {
            handler(&event);
        }
        assert_eq!(*log.borrow(), vec![outer, inner]);
    }

    #[test]
    fn test_route_skips_unrelated_nodes() {
        let mut tree = HostTree::new();
        let a = tree.create_element("button");
        let b = tree.create_element("button");

        let (log, make) = recorder();
        let mut events = EventDelegation::new();
        events.register("click", a, make());
        events.register("click", b, make());

        for (event, handler) in events.route(&tree, "click", b) {
            handler(&event);
        }
        assert_eq!(*log.borrow(), vec![b]);
    }

    #[test]
    fn test_release_removes_empty_listener() {
        let mut tree = HostTree::new();
        let a = tree.create_element("button");
        let b = tree.create_element("button");

        let (_log, make) = recorder();
        let mut events = EventDelegation::new();
        events.register("click", a, make());
        events.register("click", b, make());
        events.register("input", a, make());

        assert_eq!(events.release(a), 2);
        assert!(events.has_listener("click"));
        assert!(!events.has_listener("input"));

        assert_eq!(events.release(b), 1);
        assert!(!events.has_listener("click"));
        assert_eq!(events.handler_count(), 0);
    }
}
