//! Per-actor FIFO mailbox with selective receive.
//!
//! The mailbox is an intrusive singly linked list over the shared entry
//! pool: O(1) enqueue at the tail, O(1) dequeue at the head, and an
//! in-order walk for selective receive that unlinks the first match while
//! leaving every non-matching entry exactly where it was.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::message::pool::{MsgArena, NIL};
use crate::message::{MatchFilter, QueuedMessage};
use crate::system::errors::RtResult;

/// Bounded FIFO of queued messages belonging to one actor.
///
/// The bound is the shared entry pool: enqueue fails with `no-memory`
/// when the pool is exhausted.
#[derive(Debug)]
pub(crate) struct Mailbox {
    head: u32,
    tail: u32,
    len: usize,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Enqueue at the tail.
    pub fn push(&mut self, arena: &mut MsgArena, msg: QueuedMessage) -> RtResult<()> {
        let idx = arena.entries.alloc(msg)?;
        if self.tail == NIL {
            self.head = idx;
        } else if let Some(tail) = arena.entries.get_mut(self.tail) {
            tail.next = idx;
        }
        self.tail = idx;
        self.len += 1;
        Ok(())
    }

    /// Dequeue the head, if any.
    pub fn pop(&mut self, arena: &mut MsgArena) -> Option<QueuedMessage> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        let entry = arena.entries.free(idx)?;
        self.head = entry.next;
        if self.head == NIL {
            self.tail = NIL;
        }
        self.len -= 1;
        Some(entry.msg)
    }

    /// Dequeue the first message satisfying `pred`, preserving the relative
    /// order of everything else.
    pub fn pop_where(
        &mut self,
        arena: &mut MsgArena,
        pred: impl Fn(&QueuedMessage) -> bool,
    ) -> Option<QueuedMessage> {
        let mut prev = NIL;
        let mut cursor = self.head;
        while cursor != NIL {
            let entry = arena.entries.get(cursor)?;
            if pred(&entry.msg) {
                let next = entry.next;
                if prev == NIL {
                    self.head = next;
                } else if let Some(p) = arena.entries.get_mut(prev) {
                    p.next = next;
                }
                if cursor == self.tail {
                    self.tail = prev;
                }
                self.len -= 1;
                return arena.entries.free(cursor).map(|e| e.msg);
            }
            prev = cursor;
            cursor = entry.next;
        }
        None
    }

    /// Dequeue the first message matching the filter triple.
    pub fn pop_match(
        &mut self,
        arena: &mut MsgArena,
        filter: &MatchFilter,
    ) -> Option<QueuedMessage> {
        self.pop_where(arena, |m| filter.matches(m.sender, m.class, m.tag))
    }

    /// Whether any queued message matches the filter.
    pub fn has_match(&self, arena: &MsgArena, filter: &MatchFilter) -> bool {
        let mut cursor = self.head;
        while cursor != NIL {
            let Some(entry) = arena.entries.get(cursor) else {
                return false;
            };
            if filter.matches(entry.msg.sender, entry.msg.class, entry.msg.tag) {
                return true;
            }
            cursor = entry.next;
        }
        false
    }

    /// Remove every message, handing each to `f` (payload cleanup is the
    /// caller's job).
    pub fn drain(&mut self, arena: &mut MsgArena, mut f: impl FnMut(QueuedMessage)) {
        while let Some(msg) = self.pop(arena) {
            f(msg);
        }
    }
}
