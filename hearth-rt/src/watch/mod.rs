//! Link and monitor record tables.
//!
//! A link is symmetric: either end's death sends `LinkExit` to the other.
//! A monitor is asymmetric: only the watcher hears about the target's
//! death (`MonitorDown`), and the target never knows it is watched. Both
//! relationship kinds are capped by fixed pools. The actual death-time
//! propagation is sequenced by the scheduler core; this module owns the
//! records.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::system::errors::{RtError, RtResult};
use crate::util::{ActorId, MonitorRef};

/// One symmetric link between two live actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkEntry {
    pub a: ActorId,
    pub b: ActorId,
}

impl LinkEntry {
    /// The end that is not `id`.
    pub fn partner_of(&self, id: ActorId) -> ActorId {
        if self.a == id {
            self.b
        } else {
            self.a
        }
    }

    pub fn joins(&self, x: ActorId, y: ActorId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// One monitor: `watcher` hears about `target`'s death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MonitorEntry {
    pub watcher: ActorId,
    pub target: ActorId,
    pub reference: MonitorRef,
}

/// Fixed pools of link and monitor records.
#[derive(Debug)]
pub(crate) struct WatchTable {
    links: Vec<Option<LinkEntry>>,
    link_free: Vec<u32>,
    monitors: Vec<Option<MonitorEntry>>,
    monitor_free: Vec<u32>,
    next_reference: u32,
}

impl WatchTable {
    pub fn new(link_capacity: usize, monitor_capacity: usize) -> Self {
        Self {
            links: (0..link_capacity).map(|_| None).collect(),
            link_free: (0..link_capacity as u32).rev().collect(),
            monitors: (0..monitor_capacity).map(|_| None).collect(),
            monitor_free: (0..monitor_capacity as u32).rev().collect(),
            next_reference: 0,
        }
    }

    /// Allocate a link record. The caller has already rejected self-links
    /// and duplicates.
    pub fn add_link(&mut self, a: ActorId, b: ActorId) -> RtResult<u32> {
        let idx = self.link_free.pop().ok_or(RtError::NoMemory)?;
        self.links[idx as usize] = Some(LinkEntry { a, b });
        Ok(idx)
    }

    pub fn link(&self, idx: u32) -> Option<&LinkEntry> {
        self.links.get(idx as usize).and_then(|s| s.as_ref())
    }

    /// Remove and return a link record.
    pub fn take_link(&mut self, idx: u32) -> Option<LinkEntry> {
        let entry = self.links.get_mut(idx as usize).and_then(|s| s.take());
        if entry.is_some() {
            self.link_free.push(idx);
        }
        entry
    }

    /// Allocate a monitor record with a fresh reference.
    pub fn add_monitor(&mut self, watcher: ActorId, target: ActorId) -> RtResult<(u32, MonitorRef)> {
        let idx = self.monitor_free.pop().ok_or(RtError::NoMemory)?;
        self.next_reference = self.next_reference.wrapping_add(1);
        let reference = MonitorRef(self.next_reference);
        self.monitors[idx as usize] = Some(MonitorEntry {
            watcher,
            target,
            reference,
        });
        Ok((idx, reference))
    }

    pub fn monitor(&self, idx: u32) -> Option<&MonitorEntry> {
        self.monitors.get(idx as usize).and_then(|s| s.as_ref())
    }

    /// Remove and return a monitor record.
    pub fn take_monitor(&mut self, idx: u32) -> Option<MonitorEntry> {
        let entry = self.monitors.get_mut(idx as usize).and_then(|s| s.take());
        if entry.is_some() {
            self.monitor_free.push(idx);
        }
        entry
    }

    pub fn clear(&mut self) {
        for (i, slot) in self.links.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.link_free.push(i as u32);
            }
        }
        for (i, slot) in self.monitors.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.monitor_free.push(i as u32);
            }
        }
    }
}
