//! Due-time ordered timers, delivered to their owners as messages.
//!
//! Records live in a fixed slab (`timer_entry_pool_size`); firing order
//! comes from a min-heap of (due, id) pairs. Heap entries are invalidated
//! lazily: cancellation frees the record and bumps the slot generation, so
//! a stale heap entry simply fails its id check when popped.

// Layer 1: Standard library imports
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::system::errors::{RtError, RtResult};
use crate::util::{ActorId, TimerId};

/// One armed timer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimerRecord {
    pub id: TimerId,
    pub owner: ActorId,
    pub due: Instant,
    /// `Some` for periodic timers; the re-arm interval.
    pub period: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DueEntry {
    at: Instant,
    id: TimerId,
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.id.raw().cmp(&other.id.raw()))
    }
}

impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed-capacity timer table plus firing heap.
#[derive(Debug)]
pub(crate) struct TimerTable {
    slots: Vec<Option<TimerRecord>>,
    gens: Vec<u16>,
    free: Vec<u16>,
    heap: BinaryHeap<Reverse<DueEntry>>,
}

impl TimerTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            gens: vec![0; capacity],
            free: (0..capacity as u16).rev().collect(),
            heap: BinaryHeap::new(),
        }
    }

    /// Arm a timer due at `now + delay`; `period` makes it periodic.
    pub fn arm(
        &mut self,
        owner: ActorId,
        delay: Duration,
        period: Option<Duration>,
        now: Instant,
    ) -> RtResult<TimerId> {
        let slot = self.free.pop().ok_or(RtError::NoMemory)?;
        let gen = self.gens[slot as usize].wrapping_add(1);
        self.gens[slot as usize] = gen;
        let id = TimerId::from_parts(slot, gen);
        let due = now + delay;
        self.slots[slot as usize] = Some(TimerRecord {
            id,
            owner,
            due,
            period,
        });
        self.heap.push(Reverse(DueEntry { at: due, id }));
        Ok(id)
    }

    /// Cancel a timer. Idempotent: cancelling an unknown, fired, or
    /// already-cancelled id does nothing.
    pub fn cancel(&mut self, id: TimerId) {
        let slot = id.slot() as usize;
        if slot >= self.slots.len() {
            return;
        }
        if self.slots[slot].is_some_and(|r| r.id == id) {
            self.slots[slot] = None;
            self.free.push(id.slot());
        }
    }

    /// Pop the next timer due at or before `now`, skipping stale heap
    /// entries. The record stays in the table until [`TimerTable::retire`]
    /// or [`TimerTable::defer`].
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerId, ActorId)> {
        loop {
            let Reverse(head) = *self.heap.peek()?;
            let slot = head.id.slot() as usize;
            let live = self
                .slots
                .get(slot)
                .and_then(|s| *s)
                .filter(|r| r.id == head.id && r.due == head.at);
            let Some(record) = live else {
                self.heap.pop();
                continue;
            };
            if record.due > now {
                return None;
            }
            self.heap.pop();
            return Some((record.id, record.owner));
        }
    }

    /// Finish a fired timer: periodic timers re-arm at `due + period`
    /// (drift-free), one-shots are freed.
    pub fn retire(&mut self, id: TimerId) {
        let slot = id.slot() as usize;
        let Some(record) = self.slots.get_mut(slot).and_then(|s| s.as_mut()) else {
            return;
        };
        if record.id != id {
            return;
        }
        if let Some(period) = record.period {
            record.due += period;
            let entry = DueEntry {
                at: record.due,
                id,
            };
            self.heap.push(Reverse(entry));
        } else {
            self.slots[slot] = None;
            self.free.push(id.slot());
        }
    }

    /// Re-queue a popped-but-undelivered fire for the next pass (entry
    /// pool exhaustion); `due` is unchanged so ordering is preserved.
    pub fn defer(&mut self, id: TimerId) {
        let slot = id.slot() as usize;
        if let Some(record) = self.slots.get(slot).and_then(|s| *s) {
            if record.id == id {
                self.heap.push(Reverse(DueEntry {
                    at: record.due,
                    id,
                }));
            }
        }
    }

    /// Cancel every timer owned by a dying actor.
    pub fn cancel_owned(&mut self, owner: ActorId) {
        for slot in 0..self.slots.len() {
            if self.slots[slot].is_some_and(|r| r.owner == owner) {
                self.slots[slot] = None;
                self.free.push(slot as u16);
            }
        }
    }

    /// The earliest live due time, for idle-sleep bounding.
    pub fn next_due(&mut self) -> Option<Instant> {
        loop {
            let Reverse(head) = *self.heap.peek()?;
            let slot = head.id.slot() as usize;
            let live = self
                .slots
                .get(slot)
                .and_then(|s| *s)
                .is_some_and(|r| r.id == head.id && r.due == head.at);
            if live {
                return Some(head.at);
            }
            self.heap.pop();
        }
    }

    /// Live timer count (test support).
    #[cfg(test)]
    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
