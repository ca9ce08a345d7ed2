// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Number of low bits holding the slot index inside a packed id.
const SLOT_BITS: u32 = 16;
const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;

/// Unique identifier for actors in the runtime.
///
/// An `ActorId` packs a 16-bit slot index (fast table lookup) with a 48-bit
/// serial drawn from a monotonically increasing counter. Serials are never
/// reused within a run, so a stale id held after its actor died can never
/// alias a newer occupant of the same slot: an id resolves only while the
/// slot's recorded serial still matches.
///
/// # Example
/// ```rust
/// use hearth_rt::util::ActorId;
///
/// let id = ActorId::from_parts(3, 42);
/// assert_eq!(id.slot(), 3);
/// assert_eq!(id.serial(), 42);
/// assert!(id.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    /// The invalid sentinel (serial 0, never assigned by the runtime).
    pub const INVALID: ActorId = ActorId(0);

    /// Reserved sender for runtime-originated messages (timer fires,
    /// supervisor control notifications).
    pub const RUNTIME: ActorId = ActorId(u64::MAX);

    /// Pack a slot index and serial into an id. The serial is masked to
    /// 48 bits.
    pub const fn from_parts(slot: u16, serial: u64) -> Self {
        Self(((serial & (u64::MAX >> SLOT_BITS)) << SLOT_BITS) | slot as u64)
    }

    /// Reconstruct an id from its raw packed value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw packed value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The slot index inside the actor table.
    pub const fn slot(self) -> u16 {
        (self.0 & SLOT_MASK) as u16
    }

    /// The monotonic serial; 0 only for [`ActorId::INVALID`].
    pub const fn serial(self) -> u64 {
        self.0 >> SLOT_BITS
    }

    /// Whether this id is the runtime sender sentinel.
    pub const fn is_runtime(self) -> bool {
        self.0 == u64::MAX
    }

    /// Whether this id could ever name an actor (not a sentinel).
    pub const fn is_valid(self) -> bool {
        self.serial() != 0 && !self.is_runtime()
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_runtime() {
            write!(f, "runtime")
        } else {
            write!(f, "actor#{}.{}", self.serial(), self.slot())
        }
    }
}

/// Identifier for a publish/subscribe bus.
///
/// Packed like [`ActorId`]: 16-bit registry slot plus a 48-bit generation
/// bumped on every `bus_destroy`, so a destroyed bus id cannot alias its
/// slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusId(u64);

impl BusId {
    /// Pack a registry slot and generation.
    pub const fn from_parts(slot: u16, generation: u64) -> Self {
        Self(((generation & (u64::MAX >> SLOT_BITS)) << SLOT_BITS) | slot as u64)
    }

    /// The registry slot index.
    pub const fn slot(self) -> u16 {
        (self.0 & SLOT_MASK) as u16
    }

    /// The slot generation this id was minted under.
    pub const fn generation(self) -> u64 {
        self.0 >> SLOT_BITS
    }
}

impl Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus#{}.{}", self.generation(), self.slot())
    }
}

/// Identifier for an armed timer.
///
/// Fits in 32 bits because timer ids travel as message tags: 16-bit slot in
/// the timer table plus a 16-bit per-slot generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u32);

impl TimerId {
    /// Pack a timer-table slot and its generation.
    pub const fn from_parts(slot: u16, generation: u16) -> Self {
        Self(((generation as u32) << 16) | slot as u32)
    }

    /// Reconstruct a timer id from a message tag.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw value, used as the tag of timer messages.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The timer-table slot index.
    pub const fn slot(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// The per-slot generation.
    pub const fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}.{}", self.generation(), self.slot())
    }
}

/// Reference returned by `monitor`, consumed by `demonitor`.
///
/// Monotonic within a run; unrelated monitors never share a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorRef(pub(crate) u32);

impl MonitorRef {
    /// The raw reference value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Display for MonitorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monitor#{}", self.0)
    }
}
