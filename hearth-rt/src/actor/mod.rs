//! Actor model: priorities, configuration, lifecycle states, and the
//! object-safe behavior trait.

// Layer 1: Standard library imports
use std::fmt;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (see submodules)

pub(crate) mod cell;
pub mod context;
pub mod traits;

pub use context::ActorContext;
pub use traits::Actor;

/// Scheduling class. Strict between classes: a ready actor of a higher
/// class always runs before any ready actor of a lower class. Within a
/// class, scheduling is round-robin (yield requeues at the tail).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    /// Reserved for work that must preempt everything at the next
    /// scheduling point.
    Critical,
    /// Latency-sensitive work.
    High,
    /// The default class.
    #[default]
    Normal,
    /// Background work; runs only when nothing else is ready.
    Low,
}

impl Priority {
    /// Number of priority classes.
    pub const COUNT: usize = 4;

    /// Run-queue index, 0 = most urgent.
    pub const fn index(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// Why an actor terminated. Travels as the tag of `LinkExit` and
/// `MonitorDown` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    /// The actor's body returned, or it called `exit`.
    Normal,
    /// A panic escaped the actor's body.
    Crash,
    /// Terminated by `kill` (directly or by a supervisor).
    Killed,
}

impl ExitReason {
    /// Stable wire encoding used as a message tag.
    pub const fn code(self) -> u32 {
        match self {
            ExitReason::Normal => 0,
            ExitReason::Crash => 1,
            ExitReason::Killed => 2,
        }
    }

    /// Decode a message tag back into a reason; unknown codes read as
    /// `Crash` (the conservative interpretation).
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => ExitReason::Normal,
            2 => ExitReason::Killed,
            _ => ExitReason::Crash,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Crash => write!(f, "crash"),
            ExitReason::Killed => write!(f, "killed"),
        }
    }
}

/// How long a blocking primitive may wait.
///
/// `NoWait` turns the primitive into a poll: it fails with `would-block`
/// when the predicate is not already satisfied. `For` bounds the wait and
/// fails with `timeout` when the deadline beats the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Do not block; fail with `would-block` if not ready.
    NoWait,
    /// Block until the predicate is satisfied.
    Forever,
    /// Block at most this long, then fail with `timeout`.
    For(Duration),
}

impl Wait {
    /// Convenience constructor from milliseconds.
    pub const fn millis(ms: u64) -> Self {
        Wait::For(Duration::from_millis(ms))
    }
}

impl From<Duration> for Wait {
    fn from(d: Duration) -> Self {
        Wait::For(d)
    }
}

/// Per-actor spawn configuration.
///
/// # Examples
///
/// ```rust
/// use hearth_rt::actor::{ActorConfig, Priority};
///
/// let cfg = ActorConfig::new()
///     .with_priority(Priority::High)
///     .with_name("ingest");
/// assert_eq!(cfg.priority, Priority::High);
/// assert_eq!(cfg.name.as_deref(), Some("ingest"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Scheduling class.
    pub priority: Priority,
    /// Optional name, registered in the global registry at spawn; the
    /// spawn fails with `exists` when the name is taken.
    pub name: Option<String>,
}

impl ActorConfig {
    /// Configuration with default priority and no name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheduling class.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the registered name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
