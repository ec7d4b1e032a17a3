//! Notifier - re-runs the render callbacks subscribed to a key.
//!
//! Every subscriber runs in isolation: a panicking render or an invalid
//! result is logged, counted, and leaves that subscriber's previous node in
//! place, while the rest of the pass continues.

use std::panic::{self, AssertUnwindSafe};

use super::runtime::{Inner, RenderContext};
use crate::engine::Subscription;
use crate::error::{panic_message, BindError, Result};
use crate::types::{NodeId, Value};

impl Inner {
    /// Re-render every subscriber of `key` against the current slice value.
    pub(crate) fn notify(&self, key: &str) {
        let Some(value) = self.store.read(key) else {
            return;
        };
        let subscribers = self.subscriptions.borrow().subscriptions_for(key);
        tracing::debug!(key, subscribers = subscribers.len(), "notifying");

        for sub in subscribers {
            let skip = {
                let registry = self.subscriptions.borrow();
                // Unsubscribed by an earlier subscriber, or already showing this value
                !registry.contains(sub.id) || registry.is_current(sub.id, &value)
            };
            if skip {
                continue;
            }
            if let Err(err) = self.rerender(&sub, &value) {
                self.record_failure(err);
            }
        }
    }

    fn rerender(&self, sub: &Subscription, value: &Value) -> Result<()> {
        let live = self.bound.borrow().node(sub.id);
        let Some(live) = live else {
            return Ok(());
        };
        if !self.host.is_alive(live) {
            // Reported to the tracker; cleaned up on the next tick.
            tracing::debug!(id = %sub.id, node = %live, "skipping disposed node");
            return Ok(());
        }

        let fresh = self.render(sub, value)?;
        self.reconcile(sub, live, fresh)?;
        self.subscriptions.borrow_mut().remember(sub.id, value.clone());
        Ok(())
    }

    /// Invoke a render callback. `None` becomes a fresh placeholder.
    pub(crate) fn render(&self, sub: &Subscription, value: &Value) -> Result<NodeId> {
        let cx = RenderContext::new(&sub.key, value, &sub.params, self.dispatcher(), &self.host);
        let output = panic::catch_unwind(AssertUnwindSafe(|| (sub.render)(&cx)))
            .map_err(|payload| BindError::reconciliation(&sub.key, panic_message(payload.as_ref())))?;

        match output {
            None => Ok(self.host.placeholder()),
            Some(node) if self.host.is_alive(node) => Ok(node),
            Some(node) => Err(BindError::reconciliation(
                &sub.key,
                format!("render returned disposed node {node}"),
            )),
        }
    }
}
