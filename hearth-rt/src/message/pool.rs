//! Fixed-size pools backing the messaging subsystem.
//!
//! Three pools, all sized at init: mailbox entry nodes, asynchronous
//! payload blocks, and synchronous-send buffers. Exhaustion is the
//! recoverable `no-memory` status; nothing here ever grows.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::{Payload, QueuedMessage};
use crate::system::errors::{RtError, RtResult};

/// Sentinel index terminating mailbox entry chains.
pub(crate) const NIL: u32 = u32::MAX;

/// One mailbox entry node: a queued message plus its intrusive link.
#[derive(Debug)]
pub(crate) struct Entry {
    pub msg: QueuedMessage,
    pub next: u32,
}

/// Pool of mailbox entry nodes shared by every mailbox.
#[derive(Debug)]
pub(crate) struct EntryPool {
    slots: Vec<Option<Entry>>,
    free: Vec<u32>,
}

impl EntryPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Allocate a node holding `msg`, not yet linked anywhere.
    pub fn alloc(&mut self, msg: QueuedMessage) -> RtResult<u32> {
        let idx = self.free.pop().ok_or(RtError::NoMemory)?;
        self.slots[idx as usize] = Some(Entry { msg, next: NIL });
        Ok(idx)
    }

    /// Take a node back, returning its contents.
    pub fn free(&mut self, idx: u32) -> Option<Entry> {
        let entry = self.slots[idx as usize].take();
        if entry.is_some() {
            self.free.push(idx);
        }
        entry
    }

    pub fn get(&self, idx: u32) -> Option<&Entry> {
        self.slots.get(idx as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, idx: u32) -> Option<&mut Entry> {
        self.slots.get_mut(idx as usize).and_then(|s| s.as_mut())
    }

    /// Nodes currently available.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// Pool of fixed-size byte blocks.
#[derive(Debug)]
pub(crate) struct BlockPool {
    block_size: usize,
    blocks: Vec<Box<[u8]>>,
    free: Vec<u32>,
}

impl BlockPool {
    pub fn new(count: usize, block_size: usize) -> Self {
        Self {
            block_size,
            blocks: (0..count)
                .map(|_| vec![0u8; block_size].into_boxed_slice())
                .collect(),
            free: (0..count as u32).rev().collect(),
        }
    }

    /// Copy `data` into a fresh block. The caller has already validated
    /// `data.len()` against the configured maximum message size.
    pub fn store(&mut self, data: &[u8]) -> RtResult<u32> {
        debug_assert!(data.len() <= self.block_size);
        let slot = self.free.pop().ok_or(RtError::NoMemory)?;
        self.blocks[slot as usize][..data.len()].copy_from_slice(data);
        Ok(slot)
    }

    /// View the first `len` bytes of a block.
    pub fn read(&self, slot: u32, len: usize) -> &[u8] {
        &self.blocks[slot as usize][..len]
    }

    pub fn free(&mut self, slot: u32) {
        debug_assert!(!self.free.contains(&slot));
        self.free.push(slot);
    }

    /// Blocks currently available.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// The messaging arena: entry pool plus the two payload pools.
#[derive(Debug)]
pub(crate) struct MsgArena {
    pub entries: EntryPool,
    pub data: BlockPool,
    pub sync: BlockPool,
}

impl MsgArena {
    pub fn new(
        entry_count: usize,
        data_count: usize,
        sync_count: usize,
        block_size: usize,
    ) -> Self {
        Self {
            entries: EntryPool::new(entry_count),
            data: BlockPool::new(data_count, block_size),
            sync: BlockPool::new(sync_count, block_size),
        }
    }

    /// Return a payload's storage to its pool. Sync blocks are freed here
    /// only on the release/cleanup paths; queued sync payloads stay pinned.
    pub fn release_payload(&mut self, payload: Payload) {
        match payload {
            Payload::None => {}
            Payload::Data { slot, .. } => self.data.free(slot),
            Payload::Sync { slot, .. } => self.sync.free(slot),
        }
    }

    /// Copy a payload's bytes out of its pool.
    pub fn copy_out(&self, payload: Payload) -> Vec<u8> {
        match payload {
            Payload::None => Vec::new(),
            Payload::Data { slot, len } => self.data.read(slot, len as usize).to_vec(),
            Payload::Sync { slot, len } => self.sync.read(slot, len as usize).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageClass;
    use crate::util::ActorId;

    fn msg(tag: u32) -> QueuedMessage {
        QueuedMessage {
            sender: ActorId::from_parts(0, 1),
            class: MessageClass::Notify,
            tag,
            payload: Payload::None,
        }
    }

    #[test]
    fn test_entry_pool_exhaustion_and_reuse() {
        let mut pool = EntryPool::new(2);
        let a = pool.alloc(msg(1)).unwrap();
        let b = pool.alloc(msg(2)).unwrap();
        assert_eq!(pool.alloc(msg(3)).unwrap_err(), RtError::NoMemory);

        assert_eq!(pool.free(a).map(|e| e.msg.tag), Some(1));
        let c = pool.alloc(msg(4)).unwrap();
        assert_ne!(b, NIL);
        assert_eq!(pool.get(c).map(|e| e.msg.tag), Some(4));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_entry_pool_double_free_is_inert() {
        let mut pool = EntryPool::new(1);
        let a = pool.alloc(msg(1)).unwrap();
        assert!(pool.free(a).is_some());
        assert!(pool.free(a).is_none());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_block_pool_store_and_read() {
        let mut pool = BlockPool::new(2, 8);
        let slot = pool.store(b"hello").unwrap();
        assert_eq!(pool.read(slot, 5), b"hello");
        pool.free(slot);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_block_pool_exhaustion() {
        let mut pool = BlockPool::new(1, 8);
        let _held = pool.store(b"x").unwrap();
        assert_eq!(pool.store(b"y").unwrap_err(), RtError::NoMemory);
    }

    #[test]
    fn test_arena_copy_out_and_release() {
        let mut arena = MsgArena::new(4, 2, 2, 16);
        let slot = arena.data.store(b"payload").unwrap();
        let payload = Payload::Data { slot, len: 7 };
        assert_eq!(arena.copy_out(payload), b"payload".to_vec());
        arena.release_payload(payload);
        assert_eq!(arena.data.available(), 2);
    }

    #[test]
    fn test_arena_sync_pool_is_separate() {
        let mut arena = MsgArena::new(4, 1, 1, 16);
        let _data = arena.data.store(b"a").unwrap();
        // Async exhaustion must not affect the sync pool.
        assert_eq!(arena.data.store(b"b").unwrap_err(), RtError::NoMemory);
        assert!(arena.sync.store(b"c").is_ok());
    }
}
