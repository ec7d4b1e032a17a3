//! Core types for spark-bind.
//!
//! These are the identities that flow between the store, the binder, the
//! reconciler, and the lifecycle tracker.

use std::fmt;

/// Slice values are arbitrary JSON values.
pub use serde_json::Value;

/// The state mapping: slice key to value.
pub type State = serde_json::Map<String, Value>;

// =============================================================================
// Node identity
// =============================================================================

/// Handle to a node in the host tree.
///
/// Nodes live in an arena. The generation is bumped every time a slot is
/// disposed, so a stale handle never aliases a node allocated later in the
/// same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot of this node.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

/// What kind of node a slot holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with a tag name (lowercase).
    Element(String),
    /// Text leaf.
    Text(String),
    /// Empty stand-in for a render that produced nothing.
    Placeholder,
}

impl NodeKind {
    /// Tag identity used by the patch strategy. Text and placeholders have
    /// fixed pseudo-tags so that kinds never compare equal to elements.
    pub fn tag(&self) -> &str {
        match self {
            NodeKind::Element(tag) => tag,
            NodeKind::Text(_) => "#text",
            NodeKind::Placeholder => "#placeholder",
        }
    }
}

// =============================================================================
// Runtime identities
// =============================================================================

/// Identity of one bound render callback instance.
///
/// Every invocation of a bind factory produces a fresh id; this is the
/// render-callback identity that owns exactly one live node at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Identity of a removal watcher installed on a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_tags() {
        assert_eq!(NodeKind::Element("div".into()).tag(), "div");
        assert_eq!(NodeKind::Text("hi".into()).tag(), "#text");
        assert_eq!(NodeKind::Placeholder.tag(), "#placeholder");
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(3, 1).to_string(), "n3v1");
        assert_eq!(SubscriptionId(9).to_string(), "s9");
    }
}
