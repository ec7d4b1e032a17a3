//! Scheduler - the action queue and its draining policy.
//!
//! Dispatch only enqueues. The first enqueue arms a deferred flush; the
//! runtime runs it on the next tick. While flushing, each step either pops
//! one entry or, once the queue is long enough or its oldest entry old
//! enough, drains everything as one batch.
//!
//! Anything enqueued while a flush is running is drained by that same flush,
//! so the armed flag stays set until the queue is empty.

use std::collections::VecDeque;

use web_time::{Duration, Instant};

use super::action::Action;
use super::clock::Clock;

/// One queued action.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Strictly increasing for the life of the scheduler.
    pub seq: u64,
    pub action: Action,
    pub enqueued_at: Instant,
}

/// What the flush loop should do next.
#[derive(Debug)]
pub enum Step {
    /// Apply one entry and notify its key.
    Single(QueueEntry),
    /// Apply every entry as one merged transition.
    Batch(Vec<QueueEntry>),
}

#[derive(Debug)]
pub struct Scheduler {
    queue: VecDeque<QueueEntry>,
    next_seq: u64,
    armed: bool,
    batch_size: usize,
    batch_wait: Duration,
    clock: Clock,
}

impl Scheduler {
    pub fn new(batch_size: usize, batch_wait: Duration, clock: Clock) -> Self {
        Self {
            queue: VecDeque::new(),
            next_seq: 0,
            armed: false,
            batch_size: batch_size.max(1),
            batch_wait,
            clock,
        }
    }

    /// Append an action. Returns its sequence number and whether this call
    /// armed a new flush.
    pub fn enqueue(&mut self, action: Action) -> (u64, bool) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(QueueEntry {
            seq,
            action,
            enqueued_at: self.clock.now(),
        });
        let newly_armed = !self.armed;
        self.armed = true;
        (seq, newly_armed)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the current queue must be drained as a batch.
    pub fn should_batch(&self) -> bool {
        let Some(front) = self.queue.front() else {
            return false;
        };
        self.queue.len() >= self.batch_size
            || self.clock.now().saturating_duration_since(front.enqueued_at) >= self.batch_wait
    }

    /// Take the next unit of work, or disarm when the queue is empty.
    pub fn next_step(&mut self) -> Option<Step> {
        if self.queue.is_empty() {
            self.armed = false;
            return None;
        }
        if self.should_batch() {
            let entries: Vec<_> = self.queue.drain(..).collect();
            tracing::debug!(size = entries.len(), "draining queue as batch");
            return Some(Step::Batch(entries));
        }
        self.queue.pop_front().map(Step::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::clock::LabClock;

    fn setup(batch_size: usize) -> (Scheduler, LabClock) {
        let lab = LabClock::new();
        let scheduler = Scheduler::new(batch_size, Duration::from_millis(250), Clock::Lab(lab.clone()));
        (scheduler, lab)
    }

    #[test]
    fn test_first_enqueue_arms_once() {
        let (mut scheduler, _) = setup(5);
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.enqueue(Action::new("a", 1)), (0, true));
        assert_eq!(scheduler.enqueue(Action::new("a", 2)), (1, false));
        assert!(scheduler.is_armed());
    }

    #[test]
    fn test_short_queue_drains_singly_in_order() {
        let (mut scheduler, _) = setup(5);
        scheduler.enqueue(Action::new("a", 1));
        scheduler.enqueue(Action::new("b", 2));

        let Some(Step::Single(first)) = scheduler.next_step() else {
            panic!("expected single step");
        };
        assert_eq!(first.seq, 0);
        let Some(Step::Single(second)) = scheduler.next_step() else {
            panic!("expected single step");
        };
        assert_eq!(second.action.key(), "b");

        assert!(scheduler.next_step().is_none());
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn test_full_queue_drains_as_batch() {
        let (mut scheduler, _) = setup(3);
        for i in 0..3 {
            scheduler.enqueue(Action::new("a", i));
        }
        let Some(Step::Batch(entries)) = scheduler.next_step() else {
            panic!("expected batch step");
        };
        let seqs: Vec<_> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_old_front_entry_triggers_batch() {
        let (mut scheduler, lab) = setup(5);
        scheduler.enqueue(Action::new("a", 1));
        assert!(!scheduler.should_batch());

        lab.advance(Duration::from_millis(250));
        assert!(scheduler.should_batch());
        assert!(matches!(scheduler.next_step(), Some(Step::Batch(_))));
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let (mut scheduler, _) = setup(0);
        scheduler.enqueue(Action::new("a", 1));
        assert!(matches!(scheduler.next_step(), Some(Step::Batch(_))));
    }
}
