//! Node Builder - declarative element construction.
//!
//! `html(tag, attrs, children)` builds one element: plain attributes are set
//! on the node, `on<event>` handlers go to the delegation registry, the
//! special `textContent` attribute becomes a text child, and children may be
//! existing nodes, strings, or empty slots (rendered as placeholders).
//!
//! # Example
//!
//! ```ignore
//! let button = host.html(
//!     "button",
//!     vec![attr("class", "primary"), on("click", |_| println!("clicked"))],
//!     vec!["Click me".into()],
//! )?;
//! ```

use std::rc::Rc;

use super::events::{Event, EventDelegation, EventHandler};
use super::tree::HostTree;
use crate::error::{BindError, Result};
use crate::types::NodeId;

// =============================================================================
// Attributes
// =============================================================================

/// Attribute value: a string, or an event handler for `on*` names.
#[derive(Clone)]
pub enum AttrValue {
    Text(String),
    Handler(EventHandler),
}

impl std::fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            AttrValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// One `name = value` pair passed to [`html`].
#[derive(Debug, Clone)]
pub struct Attr {
    pub name: String,
    pub value: AttrValue,
}

/// Plain string attribute.
pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Attr {
    Attr {
        name: name.into(),
        value: AttrValue::Text(value.into()),
    }
}

/// Event handler attribute. `on("click", f)` is the `onclick` attribute.
pub fn on(event_type: &str, handler: impl Fn(&Event) + 'static) -> Attr {
    Attr {
        name: format!("on{event_type}"),
        value: AttrValue::Handler(Rc::new(handler)),
    }
}

// =============================================================================
// Children
// =============================================================================

/// A child passed to [`html`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Text(String),
    /// Nothing to render; becomes a placeholder node.
    Empty,
}

impl From<NodeId> for Child {
    fn from(node: NodeId) -> Self {
        Child::Node(node)
    }
}

impl From<Option<NodeId>> for Child {
    fn from(node: Option<NodeId>) -> Self {
        node.map(Child::Node).unwrap_or(Child::Empty)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

// =============================================================================
// html
// =============================================================================

/// Build an element.
///
/// Inputs are validated before the first node is allocated. If attaching a
/// child still fails, the element and its handlers are freed and
/// caller-owned children are detached again.
pub fn html(
    tree: &mut HostTree,
    events: &mut EventDelegation,
    tag: &str,
    attrs: Vec<Attr>,
    children: Vec<Child>,
) -> Result<NodeId> {
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(BindError::invalid(format!("html: invalid element tag `{tag}`")));
    }
    for attr in &attrs {
        if attr.name.is_empty() {
            return Err(BindError::invalid("html: attribute names must not be empty"));
        }
        if let AttrValue::Handler(_) = attr.value
            && (!attr.name.starts_with("on") || attr.name.len() <= 2)
        {
            return Err(BindError::invalid(format!(
                "html: expected attribute value to be a string for attribute {}",
                attr.name
            )));
        }
    }
    for child in &children {
        if let Child::Node(node) = child {
            if !tree.is_alive(*node) {
                return Err(BindError::invalid(format!("html: child {node} is not alive")));
            }
            // The element is fresh, so the root is the only node that can
            // never be appended under it.
            if *node == tree.root() {
                return Err(BindError::invalid("html: the root cannot be a child"));
            }
        }
    }

    let element = tree.create_element(tag);
    let mut text_content = None;
    for Attr { name, value } in attrs {
        match value {
            AttrValue::Handler(handler) => {
                let event_type = name[2..].to_ascii_lowercase();
                events.register(&event_type, element, handler);
            }
            AttrValue::Text(text) if name == "textContent" => text_content = Some(text),
            AttrValue::Text(text) => {
                tree.set_attribute(element, &name, text);
            }
        }
    }

    let borrowed: Vec<NodeId> = children
        .iter()
        .filter_map(|child| match child {
            Child::Node(node) => Some(*node),
            _ => None,
        })
        .collect();
    if let Err(err) = append_children(tree, element, text_content, children) {
        // Hand caller-owned children back before freeing the element.
        for node in borrowed {
            if tree.parent(node) == Some(element) {
                tree.remove_child(element, node)?;
            }
        }
        events.release(element);
        tree.dispose(element);
        return Err(err);
    }

    Ok(element)
}

fn append_children(
    tree: &mut HostTree,
    element: NodeId,
    text_content: Option<String>,
    children: Vec<Child>,
) -> Result<()> {
    if let Some(text) = text_content {
        let node = tree.create_text(text);
        tree.append_child(element, node)?;
    }
    for child in children {
        let node = match child {
            Child::Node(node) => node,
            Child::Text(text) => tree.create_text(text),
            Child::Empty => tree.create_placeholder(),
        };
        tree.append_child(element, node)?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn setup() -> (HostTree, EventDelegation) {
        (HostTree::new(), EventDelegation::new())
    }

    #[test]
    fn test_creates_element_with_attributes() {
        let (mut tree, mut events) = setup();
        let node = html(&mut tree, &mut events, "div", vec![attr("id", "test")], vec!["Hello".into()]).unwrap();

        assert_eq!(tree.tag(node), Some("div"));
        assert_eq!(tree.attribute(node, "id"), Some("test"));
        assert_eq!(tree.text_content(node), "Hello");
    }

    #[test]
    fn test_text_content_attribute() {
        let (mut tree, mut events) = setup();
        let node = html(&mut tree, &mut events, "span", vec![attr("textContent", "Hello, World!")], vec![]).unwrap();

        assert_eq!(tree.text_content(node), "Hello, World!");
        assert_eq!(tree.attribute(node, "textContent"), None);
    }

    #[test]
    fn test_handler_registers_delegation() {
        let (mut tree, mut events) = setup();
        let clicked = Rc::new(Cell::new(false));
        let clicked_clone = clicked.clone();
        let button = html(
            &mut tree,
            &mut events,
            "button",
            vec![on("Click", move |_| clicked_clone.set(true))],
            vec!["Click Me".into()],
        )
        .unwrap();

        assert!(events.has_listener("click"));
        for (event, handler) in events.route(&tree, "click", button) {
            handler(&event);
        }
        assert!(clicked.get());
    }

    #[test]
    fn test_children_kinds() {
        let (mut tree, mut events) = setup();
        let child = tree.create_element("span");
        let node = html(
            &mut tree,
            &mut events,
            "div",
            vec![],
            vec!["Hello".into(), child.into(), Child::Empty],
        )
        .unwrap();

        let children = tree.children(node).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(children[1], child);
        assert_eq!(tree.tag(children[2]), Some("#placeholder"));
    }

    #[test]
    fn test_deeply_nested_children() {
        let (mut tree, mut events) = setup();
        let deep = html(&mut tree, &mut events, "span", vec![], vec!["Deep Child".into()]).unwrap();
        let child = html(&mut tree, &mut events, "div", vec![], vec!["Child".into(), deep.into()]).unwrap();
        let root = html(&mut tree, &mut events, "div", vec![], vec!["Root".into(), child.into()]).unwrap();

        assert_eq!(tree.children(root).len(), 2);
        assert_eq!(tree.children(tree.children(root)[1])[1], deep);
        assert_eq!(tree.text_content(root), "RootChildDeep Child");
    }

    #[test]
    fn test_rejects_bad_input_without_allocating() {
        let (mut tree, mut events) = setup();
        let before = tree.len();

        assert!(html(&mut tree, &mut events, "", vec![], vec![]).is_err());

        let bad_handler = Attr {
            name: "click".into(),
            value: AttrValue::Handler(Rc::new(|_: &Event| {})),
        };
        assert!(html(&mut tree, &mut events, "div", vec![bad_handler], vec![]).is_err());

        let dead = tree.create_element("p");
        tree.dispose(dead);
        assert!(html(&mut tree, &mut events, "div", vec![], vec![dead.into()]).is_err());

        assert_eq!(tree.len(), before);
        assert_eq!(events.handler_count(), 0);
    }

    #[test]
    fn test_root_child_leaks_no_element_or_handler() {
        let (mut tree, mut events) = setup();
        let before = tree.len();
        let root = tree.root();

        let result = html(
            &mut tree,
            &mut events,
            "div",
            vec![on("click", |_| {})],
            vec![Child::Node(root)],
        );

        assert!(result.is_err());
        assert_eq!(tree.len(), before);
        assert_eq!(events.handler_count(), 0);
        assert!(!events.has_listener("click"));
    }
}
