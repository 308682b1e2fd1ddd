//! Deterministic event scheduling.
//!
//! CPUs run in slices; anything that must not take effect in the middle of
//! a slice is pushed onto a [`DeferredQueue`] and applied at the next
//! synchronization point, in submission order. Periodic sources (sample
//! request clocks, fixed-rate timer interrupts) are [`Scheduler`] timers
//! measured in board master-clock ticks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::save::{Layout, SaveStateError, check_len};

/// FIFO of work waiting for the next synchronization point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeferredQueue<T> {
    pending: VecDeque<T>,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.pending.push_back(item);
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, T> {
        self.pending.drain(..)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerId(usize);

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PeriodicTimer<E> {
    period: u64,
    next_due: u64,
    enabled: bool,
    payload: E,
}

/// Master-clock time, deferred events and periodic timers for one board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scheduler<E> {
    now: u64,
    deferred: DeferredQueue<E>,
    timers: Vec<PeriodicTimer<E>>,
}

impl<E: Clone> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            deferred: DeferredQueue::new(),
            timers: Vec::new(),
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Run `event` at the next synchronization point.
    pub fn defer(&mut self, event: E) {
        self.deferred.push(event);
    }

    /// Synchronization point: hand back deferred events in submission order.
    pub fn synchronize(&mut self) -> std::collections::vec_deque::Drain<'_, E> {
        self.deferred.drain()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Fire `payload` every `period` ticks, first at `now + period`.
    /// A zero period is bumped to one tick.
    pub fn add_periodic(&mut self, period: u64, payload: E) -> TimerId {
        let period = period.max(1);
        self.timers.push(PeriodicTimer {
            period,
            next_due: self.now + period,
            enabled: true,
            payload,
        });
        TimerId(self.timers.len() - 1)
    }

    /// Enabling a stopped timer re-phases it to fire one period from now.
    pub fn set_enabled(&mut self, id: TimerId, enabled: bool) {
        let now = self.now;
        if let Some(timer) = self.timers.get_mut(id.0) {
            if enabled && !timer.enabled {
                timer.next_due = now + timer.period;
            }
            timer.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, id: TimerId) -> bool {
        self.timers.get(id.0).is_some_and(|t| t.enabled)
    }

    /// Advance time by `ticks`, appending every timer payload that came due
    /// in firing-time order. Timers due at the same tick fire in creation
    /// order.
    pub fn advance(&mut self, ticks: u64, fired: &mut Vec<E>) {
        let target = self.now + ticks;
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.enabled && t.next_due <= target)
                .min_by_key(|(i, t)| (t.next_due, *i))
                .map(|(i, _)| i);
            let Some(index) = next else { break };
            let timer = &mut self.timers[index];
            fired.push(timer.payload.clone());
            timer.next_due += timer.period;
        }
        self.now = target;
    }

    /// Drop deferred work and re-phase timers from time zero.
    pub fn reset(&mut self) {
        self.now = 0;
        self.deferred.clear();
        for timer in &mut self.timers {
            timer.next_due = timer.period;
        }
    }
}

/// Timer ids are indices, so a snapshot must carry the same timers.
impl<E> Layout for Scheduler<E> {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.timers.len(), saved.timers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_events_come_back_in_order() {
        let mut sched: Scheduler<u8> = Scheduler::new();
        sched.defer(3);
        sched.defer(1);
        sched.defer(2);
        let drained: Vec<u8> = sched.synchronize().collect();
        assert_eq!(drained, vec![3, 1, 2]);
        assert!(!sched.has_deferred());
    }

    #[test]
    fn periodic_timers_interleave_by_due_time() {
        let mut sched: Scheduler<&'static str> = Scheduler::new();
        sched.add_periodic(3, "a");
        sched.add_periodic(2, "b");
        let mut fired = Vec::new();
        sched.advance(6, &mut fired);
        // b@2, a@3, b@4, a@6, b@6 (a created first)
        assert_eq!(fired, vec!["b", "a", "b", "a", "b"]);
        assert_eq!(sched.now(), 6);
    }

    #[test]
    fn disabled_timer_does_not_fire() {
        let mut sched: Scheduler<u8> = Scheduler::new();
        let id = sched.add_periodic(1, 7);
        sched.set_enabled(id, false);
        let mut fired = Vec::new();
        sched.advance(10, &mut fired);
        assert!(fired.is_empty());
        sched.set_enabled(id, true);
        sched.advance(2, &mut fired);
        assert_eq!(fired, vec![7, 7]);
    }
}
