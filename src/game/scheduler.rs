//! Logical-time event queue driving in-session timers

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Pending<E> {
    due_ms: u64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Pending<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl<E> Eq for Pending<E> {}

impl<E> PartialOrd for Pending<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Pending<E> {
    // Reversed so the max-heap pops the earliest event first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending timed events ordered by due time, then insertion order
///
/// Time only moves when the owner calls [`Scheduler::pop_due`] or
/// [`Scheduler::advance_to`], so tests can step through a match without
/// touching the wall clock.
pub struct Scheduler<E> {
    now_ms: u64,
    next_seq: u64,
    pending: BinaryHeap<Pending<E>>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            pending: BinaryHeap::new(),
        }
    }

    /// Current logical time in milliseconds
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Due time of the earliest pending event
    pub fn next_due(&self) -> Option<u64> {
        self.pending.peek().map(|p| p.due_ms)
    }

    pub fn schedule_in(&mut self, delay_ms: u64, event: E) {
        let due_ms = self.now_ms.saturating_add(delay_ms);
        self.schedule_at(due_ms, event);
    }

    /// Schedule at an absolute time; times in the past fire on the next drain
    pub fn schedule_at(&mut self, due_ms: u64, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending { due_ms, seq, event });
    }

    /// Pop the earliest event due at or before `until`, moving the clock to it
    pub fn pop_due(&mut self, until: u64) -> Option<E> {
        if self.pending.peek()?.due_ms > until {
            return None;
        }
        let pending = self.pending.pop()?;
        self.now_ms = self.now_ms.max(pending.due_ms);
        Some(pending.event)
    }

    /// Move the clock forward without firing anything
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_fire_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule_in(30, "c");
        s.schedule_in(10, "a");
        s.schedule_in(20, "b");

        assert_eq!(s.pop_due(100), Some("a"));
        assert_eq!(s.now(), 10);
        assert_eq!(s.pop_due(100), Some("b"));
        assert_eq!(s.pop_due(100), Some("c"));
        assert_eq!(s.pop_due(100), None);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut s = Scheduler::new();
        for i in 0..5 {
            s.schedule_in(16, i);
        }
        let drained: Vec<_> = std::iter::from_fn(|| s.pop_due(16)).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_future_events_wait() {
        let mut s = Scheduler::new();
        s.schedule_in(500, ());
        assert_eq!(s.pop_due(499), None);
        assert_eq!(s.next_due(), Some(500));
        assert_eq!(s.pop_due(500), Some(()));
        assert!(s.is_empty());
    }

    #[test]
    fn test_delays_are_relative_to_current_time() {
        let mut s = Scheduler::new();
        s.advance_to(1000);
        s.schedule_in(50, "later");
        assert_eq!(s.next_due(), Some(1050));

        // Clock never moves backwards
        s.advance_to(10);
        assert_eq!(s.now(), 1000);
    }
}
