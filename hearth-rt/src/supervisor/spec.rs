//! Child specifications and supervisor configuration.

// Layer 1: Standard library imports
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::actor::{Actor, ActorConfig};

/// Default restart intensity: more than this many restart cycles inside
/// [`DEFAULT_RESTART_PERIOD`] shuts the supervisor down.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

/// Default restart intensity window.
pub const DEFAULT_RESTART_PERIOD: Duration = Duration::from_secs(5);

/// When a dead child should be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Always restart.
    Permanent,
    /// Restart only on abnormal exit (crash or kill).
    Transient,
    /// Never restart.
    Temporary,
}

/// Which children a restart cycle touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Restart only the dead child.
    OneForOne,
    /// Terminate every remaining child (reverse start order), then
    /// restart all in start order.
    OneForAll,
    /// Terminate the children started after the dead one (reverse order),
    /// then restart the dead child and those children in start order.
    RestForOne,
}

/// Specification of one supervised child.
///
/// The factory is re-invoked on every (re)start so each incarnation gets a
/// fresh behavior instance.
///
/// # Examples
///
/// ```rust,ignore
/// use hearth_rt::supervisor::{ChildSpec, RestartPolicy};
///
/// let spec = ChildSpec::new("worker", || Box::new(Worker::default()))
///     .with_restart(RestartPolicy::Transient)
///     .registered();
/// ```
#[derive(Clone)]
pub struct ChildSpec {
    /// Child label; also the registered name when [`ChildSpec::registered`]
    /// is set.
    pub name: String,
    /// Restart policy.
    pub restart: RestartPolicy,
    /// Spawn configuration (priority; the name field is filled from
    /// `name` when registration is requested).
    pub config: ActorConfig,
    /// Whether to register `name` in the global registry at each start.
    pub register_name: bool,
    pub(crate) factory: Rc<dyn Fn() -> Box<dyn Actor>>,
}

impl ChildSpec {
    /// A permanent, unregistered child with default actor config.
    pub fn new(name: impl Into<String>, factory: impl Fn() -> Box<dyn Actor> + 'static) -> Self {
        Self {
            name: name.into(),
            restart: RestartPolicy::Permanent,
            config: ActorConfig::new(),
            register_name: false,
            factory: Rc::new(factory),
        }
    }

    /// Set the restart policy.
    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    /// Set the spawn configuration.
    pub fn with_config(mut self, config: ActorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the child's name on every start; a taken name makes the
    /// start fail and counts as a crash.
    pub fn registered(mut self) -> Self {
        self.register_name = true;
        self
    }

    /// The actual spawn configuration for one incarnation.
    pub(crate) fn spawn_config(&self) -> ActorConfig {
        let mut config = self.config.clone();
        if self.register_name {
            config.name = Some(self.name.clone());
        }
        config
    }
}

impl fmt::Debug for ChildSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildSpec")
            .field("name", &self.name)
            .field("restart", &self.restart)
            .field("register_name", &self.register_name)
            .finish_non_exhaustive()
    }
}

/// Supervisor configuration: ordered children, strategy, and intensity.
pub struct SupervisorSpec {
    /// Restart strategy.
    pub strategy: Strategy,
    /// Restart cycles tolerated inside `restart_period` before shutdown.
    pub max_restarts: u32,
    /// Sliding intensity window.
    pub restart_period: Duration,
    pub(crate) children: Vec<ChildSpec>,
    pub(crate) shutdown_hook: Option<Box<dyn FnMut()>>,
}

impl SupervisorSpec {
    /// A supervisor with default intensity and no children yet.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_period: DEFAULT_RESTART_PERIOD,
            children: Vec::new(),
            shutdown_hook: None,
        }
    }

    /// Append a child; start order is declaration order.
    pub fn child(mut self, spec: ChildSpec) -> Self {
        self.children.push(spec);
        self
    }

    /// Set the restart intensity.
    pub fn with_intensity(mut self, max_restarts: u32, restart_period: Duration) -> Self {
        self.max_restarts = max_restarts;
        self.restart_period = restart_period;
        self
    }

    /// Hook invoked when the intensity bound trips, before the remaining
    /// children are terminated.
    pub fn with_shutdown_hook(mut self, hook: impl FnMut() + 'static) -> Self {
        self.shutdown_hook = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for SupervisorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorSpec")
            .field("strategy", &self.strategy)
            .field("max_restarts", &self.max_restarts)
            .field("restart_period", &self.restart_period)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
