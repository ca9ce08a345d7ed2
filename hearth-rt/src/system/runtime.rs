//! The runtime facade: lifecycle surface and host-side operations.

// Layer 1: Standard library imports
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use tracing::debug;

// Layer 3: Internal module imports
use super::config::RuntimeConfig;
use super::errors::{RtError, RtResult};
use super::scheduler::{poll_actor, Core, CoreHandle, SchedulerWaker};
use crate::actor::context::{spawn_with, ActorContext};
use crate::actor::traits::Actor;
use crate::actor::ActorConfig;
use crate::bus::BusConfig;
use crate::io::{CompletionQueue, IoProvider, IoProviderId};
use crate::message::MessageClass;
use crate::supervisor::{self, SupervisorSpec};
use crate::util::{ActorId, BusId};

/// A single-threaded cooperative actor runtime.
///
/// One runtime per host thread; every operation must happen on the thread
/// that created it (the handle is deliberately `!Send`). I/O providers may
/// run worker threads, but they reach the runtime only through the
/// [`CompletionQueue`].
///
/// # Examples
///
/// ```rust
/// use hearth_rt::prelude::*;
///
/// let rt = Runtime::new(RuntimeConfig::default()).unwrap();
/// rt.spawn(ActorConfig::new(), |ctx| async move {
///     let _ = ctx.notify(ctx.self_id(), 1, b"hello");
///     let msg = ctx.recv(Wait::Forever).await.unwrap();
///     assert_eq!(msg.tag, 1);
/// })
/// .unwrap();
/// rt.run();
/// ```
pub struct Runtime {
    core: CoreHandle,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish()
    }
}

impl Runtime {
    /// Initialize a runtime with validated configuration.
    pub fn new(config: RuntimeConfig) -> RtResult<Self> {
        if config.validate().is_err() {
            return Err(RtError::InvalidArgument("invalid runtime configuration"));
        }
        Ok(Self {
            core: Rc::new(RefCell::new(Core::new(config))),
        })
    }

    // ------------------------------------------------------------------
    // Spawning and termination
    // ------------------------------------------------------------------

    /// Spawn an actor from an async closure; the captured values are the
    /// typed replacement for an argument buffer.
    pub fn spawn<F, Fut>(&self, config: ActorConfig, body: F) -> RtResult<ActorId>
    where
        F: FnOnce(ActorContext) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        spawn_with(&self.core, config, body)
    }

    /// Spawn a boxed [`Actor`] behavior.
    pub fn spawn_actor(&self, config: ActorConfig, actor: Box<dyn Actor>) -> RtResult<ActorId> {
        spawn_with(&self.core, config, move |ctx| actor.run(ctx))
    }

    /// Terminate an actor before its next scheduling point.
    pub fn kill(&self, id: ActorId) -> RtResult<()> {
        let deferred = self.core.borrow_mut().kill(id)?;
        drop(deferred);
        Ok(())
    }

    /// Whether `id` currently names a live actor.
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.core.borrow().is_alive(id)
    }

    /// Number of live actors.
    pub fn live_actors(&self) -> usize {
        self.core.borrow().live_count()
    }

    // ------------------------------------------------------------------
    // Host-side messaging and names
    // ------------------------------------------------------------------

    /// Send a notify on behalf of the host (sender is
    /// [`ActorId::RUNTIME`]).
    pub fn notify(&self, to: ActorId, tag: u32, data: &[u8]) -> RtResult<()> {
        self.core
            .borrow_mut()
            .send_message(ActorId::RUNTIME, to, MessageClass::Notify, tag, data)
    }

    /// Register a name for an actor.
    pub fn register(&self, id: ActorId, name: &str) -> RtResult<()> {
        self.core.borrow_mut().register_name(id, name)
    }

    /// Look a registered name up.
    pub fn whereis(&self, name: &str) -> RtResult<ActorId> {
        self.core.borrow().whereis(name)
    }

    // ------------------------------------------------------------------
    // Buses, supervision, I/O
    // ------------------------------------------------------------------

    /// Create a bus.
    pub fn bus_create(&self, config: BusConfig) -> RtResult<BusId> {
        self.core.borrow_mut().bus_create(config)
    }

    /// Destroy a bus; fails while subscribers remain.
    pub fn bus_destroy(&self, id: BusId) -> RtResult<()> {
        self.core.borrow_mut().bus_destroy(id)
    }

    /// Publish an entry from the host.
    pub fn bus_publish(&self, id: BusId, data: &[u8]) -> RtResult<u64> {
        self.core.borrow_mut().bus_publish(id, data)
    }

    /// Start a supervisor actor.
    pub fn supervisor_start(&self, spec: SupervisorSpec) -> RtResult<ActorId> {
        supervisor::start(&self.core, spec)
    }

    /// Ask a supervisor to terminate its children and exit.
    pub fn supervisor_stop(&self, id: ActorId) -> RtResult<()> {
        supervisor::stop(&self.core, id)
    }

    /// Register an I/O provider; returns the id used by
    /// [`ActorContext::io_wait`].
    pub fn register_io_provider(&self, provider: Box<dyn IoProvider>) -> IoProviderId {
        self.core.borrow_mut().register_provider(provider)
    }

    /// Close a provider-scoped handle; requests blocked on it complete
    /// with `closed`.
    pub fn io_close(&self, provider: IoProviderId, handle: i64) -> RtResult<()> {
        self.core.borrow_mut().io_close(provider, handle)
    }

    /// The queue threaded providers push completions into.
    pub fn completion_queue(&self) -> CompletionQueue {
        self.core.borrow().completion_queue()
    }

    /// Handle for interrupting the idle sleep from another thread.
    pub fn scheduler_waker(&self) -> SchedulerWaker {
        self.core.borrow().waker()
    }

    // ------------------------------------------------------------------
    // Scheduler loop
    // ------------------------------------------------------------------

    /// Drive the scheduler until [`Runtime::shutdown`] is requested or no
    /// actor remains alive.
    pub fn run(&self) {
        loop {
            {
                let mut core = self.core.borrow_mut();
                core.service(Instant::now());
                if core.shutdown || core.live_count() == 0 {
                    break;
                }
            }
            let next = self.core.borrow_mut().pick_next();
            match next {
                Some(id) => poll_actor(&self.core, id),
                None => {
                    let (waker, timeout) = {
                        let mut core = self.core.borrow_mut();
                        let now = Instant::now();
                        let until = core
                            .next_wakeup()
                            .map(|at| at.saturating_duration_since(now));
                        let bound = core.config.idle_sleep;
                        (core.waker(), until.map_or(bound, |d| d.min(bound)))
                    };
                    if !timeout.is_zero() {
                        waker.park(timeout);
                    }
                }
            }
        }
        debug!("scheduler loop finished");
    }

    /// One external-loop pass: drain I/O, fire timers, run each
    /// currently-ready actor exactly once. Returns whether any actor ran.
    pub fn step(&self) -> bool {
        let batch = {
            let mut core = self.core.borrow_mut();
            core.service(Instant::now());
            core.ready_snapshot()
        };
        let mut any_ran = false;
        for id in batch {
            if self.core.borrow_mut().dequeue_ready(id) {
                poll_actor(&self.core, id);
                any_ran = true;
            }
        }
        any_ran
    }

    /// Request a graceful stop; `run` returns after the current pass.
    pub fn shutdown(&self) {
        self.core.borrow_mut().shutdown = true;
    }

    /// Drop every actor and reset shared structures. Breaks the reference
    /// cycles between cells and contexts; also called from `Drop`.
    pub fn cleanup(&self) {
        let futures = self.core.borrow_mut().cleanup();
        drop(futures);
    }

    /// Sleep helper for host-driven loops built on [`Runtime::step`].
    pub fn park(&self, timeout: Duration) {
        let waker = self.core.borrow().waker();
        waker.park(timeout);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Wait;
    use std::cell::Cell;

    #[test]
    fn test_run_returns_when_all_actors_finish() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        rt.spawn(ActorConfig::new(), move |_ctx| async move {
            flag.set(true);
        })
        .unwrap();
        rt.run();
        assert!(ran.get());
        assert_eq!(rt.live_actors(), 0);
    }

    #[test]
    fn test_shutdown_from_actor_stops_run() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        rt.spawn(ActorConfig::new(), |ctx| async move {
            ctx.shutdown();
            // Block forever; run must still return via the shutdown flag.
            let _ = ctx.recv(Wait::Forever).await;
        })
        .unwrap();
        rt.run();
        assert_eq!(rt.live_actors(), 1);
    }

    #[test]
    fn test_step_reports_whether_anything_ran() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        rt.spawn(ActorConfig::new(), |ctx| async move {
            let _ = ctx.recv(Wait::Forever).await;
        })
        .unwrap();
        assert!(rt.step());
        // Now blocked on an empty mailbox: nothing to run.
        assert!(!rt.step());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = RuntimeConfig {
            max_actors: 0,
            ..Default::default()
        };
        assert!(matches!(
            Runtime::new(bad).unwrap_err(),
            RtError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_host_notify_and_registry() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let id = rt
            .spawn(ActorConfig::new().with_name("echo"), |ctx| async move {
                let msg = ctx.recv(Wait::Forever).await.unwrap();
                assert_eq!(msg.sender, ActorId::RUNTIME);
                assert_eq!(msg.tag, 9);
            })
            .unwrap();
        assert_eq!(rt.whereis("echo").unwrap(), id);
        rt.notify(id, 9, b"host").unwrap();
        rt.run();
        assert_eq!(rt.whereis("echo").unwrap_err(), RtError::NotFound);
    }
}
