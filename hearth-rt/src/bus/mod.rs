//! Publish/subscribe buses: bounded rings with per-subscriber cursors.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::system::errors::{RtError, RtResult};
use crate::util::BusId;

pub(crate) mod ring;

pub(crate) use ring::Bus;

/// Per-bus configuration.
///
/// # Examples
///
/// ```rust
/// use hearth_rt::bus::BusConfig;
/// use std::time::Duration;
///
/// let cfg = BusConfig::new(4, 64)
///     .with_max_subscribers(3)
///     .with_consume_after_reads(1)
///     .with_max_age(Duration::from_millis(50));
/// assert_eq!(cfg.ring_capacity, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Number of ring entries.
    pub ring_capacity: usize,
    /// Maximum payload size per entry, in bytes.
    pub max_entry_size: usize,
    /// Maximum concurrent subscribers.
    pub max_subscribers: usize,
    /// When > 0, an entry read this many times becomes reclaimable
    /// immediately (work-queue style consumption).
    pub consume_after_reads: u32,
    /// When set, entries older than this are reclaimable regardless of
    /// read state.
    pub max_age: Option<Duration>,
}

impl BusConfig {
    /// A lossless configuration: no consume policy, no age policy.
    pub fn new(ring_capacity: usize, max_entry_size: usize) -> Self {
        Self {
            ring_capacity,
            max_entry_size,
            max_subscribers: 8,
            consume_after_reads: 0,
            max_age: None,
        }
    }

    /// Set the subscriber cap.
    pub fn with_max_subscribers(mut self, value: usize) -> Self {
        self.max_subscribers = value;
        self
    }

    /// Set the consume-after-N-reads policy (0 disables it).
    pub fn with_consume_after_reads(mut self, value: u32) -> Self {
        self.consume_after_reads = value;
        self
    }

    /// Set the maximum entry age.
    pub fn with_max_age(mut self, value: Duration) -> Self {
        self.max_age = Some(value);
        self
    }
}

struct BusSlot {
    generation: u64,
    bus: Option<Bus>,
}

/// Fixed table of bus slots; ids are generation-checked so a destroyed
/// bus id can never alias the slot's next occupant.
pub(crate) struct BusRegistry {
    slots: Vec<BusSlot>,
}

impl BusRegistry {
    pub fn new(max_buses: usize) -> Self {
        Self {
            slots: (0..max_buses)
                .map(|_| BusSlot {
                    generation: 0,
                    bus: None,
                })
                .collect(),
        }
    }

    /// Create a bus, validating the config against the global caps.
    pub fn create(
        &mut self,
        config: BusConfig,
        max_entries_cap: usize,
        max_subscribers_cap: usize,
    ) -> RtResult<BusId> {
        if config.ring_capacity == 0 || config.ring_capacity > max_entries_cap {
            return Err(RtError::InvalidArgument("ring capacity out of range"));
        }
        if config.max_subscribers == 0 || config.max_subscribers > max_subscribers_cap {
            return Err(RtError::InvalidArgument("subscriber cap out of range"));
        }
        if config.max_entry_size == 0 {
            return Err(RtError::InvalidArgument("zero entry size"));
        }
        let Some(slot) = self.slots.iter().position(|s| s.bus.is_none()) else {
            return Err(RtError::NoMemory);
        };
        self.slots[slot].generation += 1;
        let id = BusId::from_parts(slot as u16, self.slots[slot].generation);
        self.slots[slot].bus = Some(Bus::new(config));
        Ok(id)
    }

    /// Destroy a bus; fails with `invalid-argument` while subscribers
    /// remain attached.
    pub fn destroy(&mut self, id: BusId) -> RtResult<()> {
        let slot = self
            .slots
            .get_mut(id.slot() as usize)
            .filter(|s| s.generation == id.generation() && s.bus.is_some())
            .ok_or(RtError::NotFound)?;
        let has_subscribers = slot
            .bus
            .as_ref()
            .is_some_and(|b| b.subscriber_count() > 0);
        if has_subscribers {
            return Err(RtError::InvalidArgument("bus has subscribers"));
        }
        slot.bus = None;
        Ok(())
    }

    pub fn get_mut(&mut self, id: BusId) -> Option<&mut Bus> {
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.bus.as_mut())
    }

    pub fn get(&self, id: BusId) -> Option<&Bus> {
        self.slots
            .get(id.slot() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.bus.as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.bus = None;
        }
    }
}
