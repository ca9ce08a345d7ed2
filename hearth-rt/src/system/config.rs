//! Runtime configuration with sensible defaults.
//!
//! Every capacity in the runtime is fixed at init: the actor table, the
//! three message pools, the bus registry, link/monitor/timer tables, and
//! the I/O completion queue. Exhausting any of them surfaces as the
//! recoverable `no-memory` status instead of an allocation.

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

// Layer 3: Internal
// (none)

/// Default number of actor slots.
pub const DEFAULT_MAX_ACTORS: usize = 256;

/// Default number of mailbox entry nodes shared by all mailboxes.
pub const DEFAULT_MAILBOX_ENTRY_POOL_SIZE: usize = 1024;

/// Default number of asynchronous payload blocks.
pub const DEFAULT_MESSAGE_DATA_POOL_SIZE: usize = 512;

/// Default number of synchronous-send buffers (separate pool so sync
/// traffic cannot starve async traffic).
pub const DEFAULT_SYNC_BUFFER_POOL_SIZE: usize = 64;

/// Default maximum payload size in bytes; also the size of each pool block.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256;

/// Default number of bus registry slots.
pub const DEFAULT_MAX_BUSES: usize = 16;

/// Default upper bound on a single bus ring's capacity.
pub const DEFAULT_MAX_BUS_ENTRIES: usize = 64;

/// Default upper bound on subscribers per bus.
pub const DEFAULT_MAX_BUS_SUBSCRIBERS: usize = 16;

/// Default number of link records.
pub const DEFAULT_LINK_ENTRY_POOL_SIZE: usize = 128;

/// Default number of monitor records.
pub const DEFAULT_MONITOR_ENTRY_POOL_SIZE: usize = 128;

/// Default number of timer records.
pub const DEFAULT_TIMER_ENTRY_POOL_SIZE: usize = 128;

/// Default capacity of the cross-thread I/O completion queue.
pub const DEFAULT_COMPLETION_QUEUE_SIZE: usize = 64;

/// Default bound on how long the scheduler sleeps when idle with no
/// upcoming deadline.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Capacities and limits fixed at runtime construction.
///
/// # Examples
///
/// ```rust
/// use hearth_rt::system::RuntimeConfig;
///
/// let config = RuntimeConfig::default();
/// assert_eq!(config.max_actors, 256);
///
/// let small = RuntimeConfig::builder()
///     .with_max_actors(8)
///     .with_message_data_pool_size(16)
///     .build()
///     .unwrap();
/// assert_eq!(small.max_actors, 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of actor slots; spawn fails with `no-memory` when all are live.
    pub max_actors: usize,

    /// Mailbox entry nodes shared by all mailboxes.
    pub mailbox_entry_pool_size: usize,

    /// Asynchronous payload blocks (notify / request / reply payloads).
    pub message_data_pool_size: usize,

    /// Synchronous-send buffers, pinned until released by the receiver.
    pub sync_buffer_pool_size: usize,

    /// Maximum payload size in bytes; every pool block is this large.
    pub max_message_size: usize,

    /// Bus registry slots.
    pub max_buses: usize,

    /// Upper bound on a single bus ring's capacity.
    pub max_bus_entries: usize,

    /// Upper bound on subscribers per bus.
    pub max_bus_subscribers: usize,

    /// Link records (each symmetric link consumes one).
    pub link_entry_pool_size: usize,

    /// Monitor records (each watcher/target pair consumes one).
    pub monitor_entry_pool_size: usize,

    /// Timer records.
    pub timer_entry_pool_size: usize,

    /// Capacity of the I/O completion queue providers push into.
    pub completion_queue_size: usize,

    /// Bound on the scheduler's idle sleep when no deadline is pending.
    pub idle_sleep: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_actors: DEFAULT_MAX_ACTORS,
            mailbox_entry_pool_size: DEFAULT_MAILBOX_ENTRY_POOL_SIZE,
            message_data_pool_size: DEFAULT_MESSAGE_DATA_POOL_SIZE,
            sync_buffer_pool_size: DEFAULT_SYNC_BUFFER_POOL_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_buses: DEFAULT_MAX_BUSES,
            max_bus_entries: DEFAULT_MAX_BUS_ENTRIES,
            max_bus_subscribers: DEFAULT_MAX_BUS_SUBSCRIBERS,
            link_entry_pool_size: DEFAULT_LINK_ENTRY_POOL_SIZE,
            monitor_entry_pool_size: DEFAULT_MONITOR_ENTRY_POOL_SIZE,
            timer_entry_pool_size: DEFAULT_TIMER_ENTRY_POOL_SIZE,
            completion_queue_size: DEFAULT_COMPLETION_QUEUE_SIZE,
            idle_sleep: DEFAULT_IDLE_SLEEP,
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration builder.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validate configuration values.
    ///
    /// Returns `Err` with a description when any capacity is zero, when
    /// `max_actors` exceeds the 16-bit slot index width, or when
    /// `idle_sleep` is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_actors == 0 {
            return Err("max_actors must be > 0".to_string());
        }
        if self.max_actors > u16::MAX as usize {
            return Err("max_actors must fit a 16-bit slot index".to_string());
        }
        for (value, what) in [
            (self.mailbox_entry_pool_size, "mailbox_entry_pool_size"),
            (self.message_data_pool_size, "message_data_pool_size"),
            (self.sync_buffer_pool_size, "sync_buffer_pool_size"),
            (self.max_message_size, "max_message_size"),
            (self.max_buses, "max_buses"),
            (self.max_bus_entries, "max_bus_entries"),
            (self.max_bus_subscribers, "max_bus_subscribers"),
            (self.link_entry_pool_size, "link_entry_pool_size"),
            (self.monitor_entry_pool_size, "monitor_entry_pool_size"),
            (self.timer_entry_pool_size, "timer_entry_pool_size"),
            (self.completion_queue_size, "completion_queue_size"),
        ] {
            if value == 0 {
                return Err(format!("{what} must be > 0"));
            }
        }
        if self.max_buses > u16::MAX as usize {
            return Err("max_buses must fit a 16-bit slot index".to_string());
        }
        if self.timer_entry_pool_size > u16::MAX as usize {
            return Err("timer_entry_pool_size must fit a 16-bit slot index".to_string());
        }
        if self.idle_sleep.is_zero() {
            return Err("idle_sleep must be > 0".to_string());
        }
        Ok(())
    }
}

/// Builder for [`RuntimeConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Set the number of actor slots.
    pub fn with_max_actors(mut self, value: usize) -> Self {
        self.config.max_actors = value;
        self
    }

    /// Set the shared mailbox entry pool size.
    pub fn with_mailbox_entry_pool_size(mut self, value: usize) -> Self {
        self.config.mailbox_entry_pool_size = value;
        self
    }

    /// Set the asynchronous payload pool size.
    pub fn with_message_data_pool_size(mut self, value: usize) -> Self {
        self.config.message_data_pool_size = value;
        self
    }

    /// Set the synchronous-send buffer pool size.
    pub fn with_sync_buffer_pool_size(mut self, value: usize) -> Self {
        self.config.sync_buffer_pool_size = value;
        self
    }

    /// Set the maximum payload size in bytes.
    pub fn with_max_message_size(mut self, value: usize) -> Self {
        self.config.max_message_size = value;
        self
    }

    /// Set the number of bus registry slots.
    pub fn with_max_buses(mut self, value: usize) -> Self {
        self.config.max_buses = value;
        self
    }

    /// Set the upper bound on a single bus ring's capacity.
    pub fn with_max_bus_entries(mut self, value: usize) -> Self {
        self.config.max_bus_entries = value;
        self
    }

    /// Set the upper bound on subscribers per bus.
    pub fn with_max_bus_subscribers(mut self, value: usize) -> Self {
        self.config.max_bus_subscribers = value;
        self
    }

    /// Set the link record pool size.
    pub fn with_link_entry_pool_size(mut self, value: usize) -> Self {
        self.config.link_entry_pool_size = value;
        self
    }

    /// Set the monitor record pool size.
    pub fn with_monitor_entry_pool_size(mut self, value: usize) -> Self {
        self.config.monitor_entry_pool_size = value;
        self
    }

    /// Set the timer record pool size.
    pub fn with_timer_entry_pool_size(mut self, value: usize) -> Self {
        self.config.timer_entry_pool_size = value;
        self
    }

    /// Set the I/O completion queue capacity.
    pub fn with_completion_queue_size(mut self, value: usize) -> Self {
        self.config.completion_queue_size = value;
        self
    }

    /// Set the bound on the scheduler's idle sleep.
    pub fn with_idle_sleep(mut self, value: Duration) -> Self {
        self.config.idle_sleep = value;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<RuntimeConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
