//! State - the store, the actions that change it, and the queue that
//! applies them.
//!
//! - **Store** - copy-on-write snapshot of every slice
//! - **Action** - `{ key, payload }` with value or updater payloads
//! - **Scheduler** - queue entries, flush arming, single vs batch draining
//! - **Clock** - real or lab time for the batch-wait threshold

mod action;
mod clock;
mod scheduler;
mod store;

pub use action::{Action, Payload, Updater};
pub use clock::{Clock, LabClock};
pub use scheduler::{QueueEntry, Scheduler, Step};
pub use store::Store;
