//! Reconciler - splices a freshly rendered node into the live tree.
//!
//! # Replace
//!
//! The parent swaps the live node for the fresh one. The bound record, the
//! observation and (unless the fresh node brought its own) the hooks move to
//! the fresh node; the old node is discarded.
//!
//! # Patch
//!
//! Both trees are walked in lockstep, child by child:
//!
//! ```text
//! live:  div.a ─┬─ span "1"         fresh: div.b ─┬─ span "2"
//!               └─ p                               └─ ul
//!
//! result: div.b ─┬─ span "2"   (same nodes as live, attrs/text patched)
//!                └─ ul         (p replaced: tags differ)
//! ```
//!
//! A pair is patched in place when both have the same tag (or node kind) and
//! neither is the live node of another subscription. Everything else is
//! replaced. Whatever is left of the fresh tree is discarded.

use super::runtime::Inner;
use crate::config::Reconciliation;
use crate::engine::{HookKind, Subscription};
use crate::error::{BindError, Result};
use crate::types::{NodeId, NodeKind};

impl Inner {
    pub(crate) fn reconcile(&self, sub: &Subscription, live: NodeId, fresh: NodeId) -> Result<()> {
        if fresh == live {
            self.fire_hook(live, HookKind::Update);
            return Ok(());
        }
        let owner = self.bound.borrow().owner(fresh);
        if let Some(owner) = owner {
            return Err(BindError::reconciliation(
                &sub.key,
                format!("render returned {fresh}, which is already bound to {owner}"),
            ));
        }

        match self.config.reconciliation {
            Reconciliation::Patch if self.same_shape(live, fresh) => {
                self.patch_node(&sub.key, live, fresh)?;
                self.discard(fresh);
                self.fire_hook(live, HookKind::Update);
                Ok(())
            }
            _ => self.replace(sub, live, fresh),
        }
    }

    fn replace(&self, sub: &Subscription, live: NodeId, fresh: NodeId) -> Result<()> {
        if let Some(parent) = self.host.parent(live) {
            self.host
                .replace_child(parent, fresh, live)
                .map_err(|e| BindError::reconciliation(&sub.key, e.to_string()))?;
        }

        self.bound.borrow_mut().retarget(sub.id, fresh);
        {
            let mut tree = self.host.tree_mut();
            self.tracker.borrow_mut().retarget(&mut *tree, live, fresh);
        }
        {
            let mut hooks = self.hooks.borrow_mut();
            if hooks.contains(fresh) {
                hooks.remove(live);
            } else {
                hooks.transfer(live, fresh);
            }
        }

        tracing::debug!(id = %sub.id, old = %live, new = %fresh, "node replaced");
        self.discard(live);
        self.fire_hook(fresh, HookKind::Update);
        Ok(())
    }

    fn same_shape(&self, live: NodeId, fresh: NodeId) -> bool {
        let tree = self.host.tree();
        match (tree.kind(live), tree.kind(fresh)) {
            (Some(a), Some(b)) => a.tag() == b.tag(),
            _ => false,
        }
    }

    fn patchable(&self, live: NodeId, fresh: NodeId) -> bool {
        let bound = self.bound.borrow();
        bound.owner(live).is_none() && bound.owner(fresh).is_none() && self.same_shape(live, fresh)
    }

    /// Make `live` look like `fresh`, keeping `live`'s identity.
    fn patch_node(&self, key: &str, live: NodeId, fresh: NodeId) -> Result<()> {
        let fail = |e: BindError| BindError::reconciliation(key, e.to_string());

        {
            let mut tree = self.host.tree_mut();
            let wanted = tree.attributes(fresh);
            for (name, _) in tree.attributes(live) {
                if !wanted.iter().any(|(n, _)| *n == name) {
                    tree.remove_attribute(live, &name);
                }
            }
            for (name, value) in wanted {
                if tree.attribute(live, &name) != Some(value.as_str()) {
                    tree.set_attribute(live, &name, value);
                }
            }
            let text = match tree.kind(fresh) {
                Some(NodeKind::Text(text)) => Some(text.clone()),
                _ => None,
            };
            if let Some(text) = text {
                tree.set_text(live, text);
            }
        }
        {
            let mut events = self.host.events_mut();
            events.release(live);
            for (event_type, handler) in events.handlers_for(fresh) {
                events.register(&event_type, live, handler);
            }
            events.release(fresh);
        }
        self.hooks.borrow_mut().transfer(fresh, live);

        let live_children = self.host.children(live);
        let fresh_children = self.host.children(fresh);
        for i in 0..live_children.len().max(fresh_children.len()) {
            match (live_children.get(i).copied(), fresh_children.get(i).copied()) {
                (Some(l), Some(f)) if self.patchable(l, f) => self.patch_node(key, l, f)?,
                (Some(l), Some(f)) => {
                    self.host.replace_child(live, f, l).map_err(fail)?;
                    self.discard(l);
                }
                (None, Some(f)) => self.host.append_child(live, f).map_err(fail)?,
                (Some(l), None) => {
                    self.host.remove_child(live, l).map_err(fail)?;
                    self.discard(l);
                }
                (None, None) => {}
            }
        }
        Ok(())
    }
}
