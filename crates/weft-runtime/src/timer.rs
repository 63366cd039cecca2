#![forbid(unsafe_code)]

//! Deadline-ordered task queue.
//!
//! The runtime does not own a thread or an event loop. Deferred work (update
//! flushes and liveness sweeps) is queued here with a deadline and fired by
//! whoever drives the runtime via `tick()` / `settle()` / `advance()`.
//!
//! Entries are keyed by `(deadline, sequence)`, so tasks with equal deadlines
//! run in the order they were queued.

use std::collections::BTreeMap;

use web_time::Instant;

/// Deferred work kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Task {
    /// Run the two-phase update flush.
    Flush,
    /// Sweep states waiting for liveness collection.
    Collect,
}

#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    entries: BTreeMap<(Instant, u64), Task>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn schedule(&mut self, at: Instant, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((at, seq), task);
    }

    /// Sequence number the next queued task will get. Tasks with a smaller
    /// sequence were queued before this call.
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return the earliest task due at `now` that was queued
    /// before `horizon`.
    pub(crate) fn pop_due(&mut self, now: Instant, horizon: u64) -> Option<Task> {
        let key = self
            .entries
            .keys()
            .take_while(|(at, _)| *at <= now)
            .find(|(_, seq)| *seq < horizon)
            .copied()?;
        self.entries.remove(&key)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, task: Task) -> bool {
        self.entries.values().any(|t| *t == task)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::Duration;

    #[test]
    fn pops_in_deadline_then_sequence_order() {
        let t0 = Instant::now();
        let mut q = TimerQueue::default();
        q.schedule(t0 + Duration::from_millis(10), Task::Collect);
        q.schedule(t0, Task::Flush);
        q.schedule(t0, Task::Collect);
        assert_eq!(q.next_deadline(), Some(t0));

        let now = t0 + Duration::from_millis(10);
        let horizon = q.next_seq();
        assert_eq!(q.pop_due(now, horizon), Some(Task::Flush));
        assert_eq!(q.pop_due(now, horizon), Some(Task::Collect));
        assert_eq!(q.pop_due(now, horizon), Some(Task::Collect));
        assert_eq!(q.pop_due(now, horizon), None);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn future_tasks_are_not_due() {
        let t0 = Instant::now();
        let mut q = TimerQueue::default();
        q.schedule(t0 + Duration::from_secs(1), Task::Collect);
        assert_eq!(q.pop_due(t0, q.next_seq()), None);
        assert!(q.contains(Task::Collect));
        assert!(!q.contains(Task::Flush));
    }

    #[test]
    fn horizon_excludes_tasks_queued_later() {
        let t0 = Instant::now();
        let mut q = TimerQueue::default();
        let horizon = q.next_seq();
        q.schedule(t0, Task::Flush);
        assert_eq!(q.pop_due(t0, horizon), None);
        assert_eq!(q.pop_due(t0, q.next_seq()), Some(Task::Flush));
    }

    #[test]
    fn clear_empties_queue() {
        let mut q = TimerQueue::default();
        q.schedule(Instant::now(), Task::Flush);
        q.clear();
        assert_eq!(q.next_deadline(), None);
    }
}
