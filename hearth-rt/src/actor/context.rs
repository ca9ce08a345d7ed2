//! The per-actor capability handle and its blocking primitives.
//!
//! Every blocking operation is a small hand-written future: the first poll
//! tries the predicate, and when it cannot be satisfied the future records
//! a wait descriptor (plus an optional deadline) in the core and returns
//! `Poll::Pending`, the stackless equivalent of switching back to the
//! scheduler context. A later poll happens only after the scheduler made
//! the actor ready again.

// Layer 1: Standard library imports
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::cell::WaitKind;
use super::traits::Actor;
use super::{ActorConfig, ExitReason, Wait};
use crate::bus::BusConfig;
use crate::io::{IoProviderId, IoRequest};
use crate::message::{MatchFilter, Message, MessageClass};
use crate::select::{SelectFuture, SelectSource};
use crate::supervisor::{self, SupervisorSpec};
use crate::system::errors::{RtError, RtResult};
use crate::system::scheduler::CoreHandle;
use crate::util::{ActorId, BusId, MonitorRef, TimerId};

/// Spawn an actor body onto a core: reserve the slot, then install the
/// boxed future built around a fresh context.
pub(crate) fn spawn_with<F, Fut>(
    core: &CoreHandle,
    config: ActorConfig,
    body: F,
) -> RtResult<ActorId>
where
    F: FnOnce(ActorContext) -> Fut,
    Fut: Future<Output = ()> + 'static,
{
    let id = core.borrow_mut().reserve_actor(&config)?;
    let ctx = ActorContext {
        core: Rc::clone(core),
        id,
    };
    let future = Box::pin(body(ctx));
    core.borrow_mut().install_future(id, future);
    Ok(id)
}

/// Handle through which an actor talks to its runtime.
///
/// Cheap to clone; valid only on the scheduler thread, for the actor it
/// was created for.
#[derive(Clone)]
pub struct ActorContext {
    pub(crate) core: CoreHandle,
    pub(crate) id: ActorId,
}

impl ActorContext {
    /// This actor's id.
    pub fn self_id(&self) -> ActorId {
        self.id
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawn a sibling actor from an async closure.
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

    /// Terminate another actor. It is finalized before its next
    /// scheduling point and never observes the kill.
    pub fn kill(&self, id: ActorId) -> RtResult<()> {
        let deferred = self.core.borrow_mut().kill(id)?;
        drop(deferred);
        Ok(())
    }

    /// Exit voluntarily with reason `normal`. The returned future never
    /// resolves; the scheduler finalizes the actor instead.
    pub fn exit(&self) -> ExitFuture {
        ExitFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            flagged: false,
        }
    }

    /// Requeue at the tail of this priority class, letting peers run.
    pub fn yield_now(&self) -> YieldFuture {
        YieldFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            yielded: false,
        }
    }

    /// Block for at least `duration`.
    pub fn sleep(&self, duration: Duration) -> SleepFuture {
        SleepFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            duration,
            deadline: None,
        }
    }

    /// Request a graceful runtime shutdown; `run` returns after the
    /// current scheduling pass.
    pub fn shutdown(&self) {
        self.core.borrow_mut().shutdown = true;
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Fire-and-forget send. Fails with `no-memory` when pools are
    /// exhausted (back off and retry) and `invalid-argument` on a stale id
    /// or oversized payload.
    pub fn notify(&self, to: ActorId, tag: u32, data: &[u8]) -> RtResult<()> {
        self.core
            .borrow_mut()
            .send_message(self.id, to, MessageClass::Notify, tag, data)
    }

    /// Receive the next message in FIFO order.
    pub fn recv(&self, wait: Wait) -> RecvFuture {
        RecvFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            filter: None,
            wait,
            deadline: None,
        }
    }

    /// Selective receive: the first message matching `filter`, leaving
    /// non-matching messages untouched and in order.
    pub fn recv_match(&self, filter: MatchFilter, wait: Wait) -> RecvFuture {
        RecvFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            filter: Some(filter),
            wait,
            deadline: None,
        }
    }

    /// Tag-correlated round trip: send `data` as a request and wait for
    /// the matching reply.
    pub fn request(&self, to: ActorId, data: &[u8], wait: Wait) -> RequestFuture {
        RequestFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            to,
            data: data.to_vec(),
            wait,
            deadline: None,
            correlation: None,
        }
    }

    /// Answer a request, echoing its correlation tag back to the sender.
    pub fn reply(&self, request: &Message, data: &[u8]) -> RtResult<()> {
        if request.class != MessageClass::Request {
            return Err(RtError::InvalidArgument("not a request message"));
        }
        if !request.sender.is_valid() {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        self.core.borrow_mut().send_message(
            self.id,
            request.sender,
            MessageClass::Reply,
            request.tag,
            data,
        )
    }

    /// Synchronous send: the payload is pinned in the sync-buffer pool and
    /// this actor blocks until the receiver releases it (explicitly, by
    /// its next receive, or by dying, which yields `closed`). Self-sends
    /// and direct two-party cycles are rejected. `Wait::NoWait` fails with
    /// `would-block` without sending.
    pub fn send_sync(&self, to: ActorId, tag: u32, data: &[u8], wait: Wait) -> SendSyncFuture {
        SendSyncFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            to,
            tag,
            data: data.to_vec(),
            wait,
            deadline: None,
            pinned_slot: None,
        }
    }

    /// Explicitly release a synchronous message received earlier,
    /// unblocking its sender.
    pub fn release(&self, message: &Message) -> RtResult<()> {
        let slot = message
            .sync_slot
            .ok_or(RtError::InvalidArgument("not a synchronous message"))?;
        self.core
            .borrow_mut()
            .release_held(self.id, message.sender, slot)
    }

    // ------------------------------------------------------------------
    // Links, monitors, names
    // ------------------------------------------------------------------

    /// Create a symmetric link with `id`; idempotent per pair.
    pub fn link(&self, id: ActorId) -> RtResult<()> {
        self.core.borrow_mut().link(self.id, id)
    }

    /// Remove the link with `id`.
    pub fn unlink(&self, id: ActorId) -> RtResult<()> {
        self.core.borrow_mut().unlink(self.id, id)
    }

    /// Watch `id`; on its death this actor receives `MonitorDown`.
    pub fn monitor(&self, id: ActorId) -> RtResult<MonitorRef> {
        self.core.borrow_mut().monitor(self.id, id)
    }

    /// Stop watching.
    pub fn demonitor(&self, reference: MonitorRef) -> RtResult<()> {
        self.core.borrow_mut().demonitor(self.id, reference)
    }

    /// Register a name for an actor; fails with `exists` if taken.
    pub fn register(&self, id: ActorId, name: &str) -> RtResult<()> {
        self.core.borrow_mut().register_name(id, name)
    }

    /// Look a name up.
    pub fn whereis(&self, name: &str) -> RtResult<ActorId> {
        self.core.borrow().whereis(name)
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Arm a one-shot timer; fires as a `Timer`-class message whose tag is
    /// the timer id.
    pub fn after(&self, delay: Duration) -> RtResult<TimerId> {
        self.core.borrow_mut().timer_after(self.id, delay)
    }

    /// Arm a periodic timer re-arming at `due + period`.
    pub fn every(&self, period: Duration) -> RtResult<TimerId> {
        self.core.borrow_mut().timer_every(self.id, period)
    }

    /// Cancel a timer; idempotent.
    pub fn cancel_timer(&self, id: TimerId) {
        self.core.borrow_mut().timer_cancel(id);
    }

    // ------------------------------------------------------------------
    // Bus
    // ------------------------------------------------------------------

    /// Create a bus.
    pub fn bus_create(&self, config: BusConfig) -> RtResult<BusId> {
        self.core.borrow_mut().bus_create(config)
    }

    /// Destroy a bus; fails while subscribers remain.
    pub fn bus_destroy(&self, id: BusId) -> RtResult<()> {
        self.core.borrow_mut().bus_destroy(id)
    }

    /// Subscribe this actor; it observes entries published from now on.
    pub fn bus_subscribe(&self, id: BusId) -> RtResult<()> {
        self.core.borrow_mut().bus_subscribe(self.id, id)
    }

    /// Unsubscribe this actor.
    pub fn bus_unsubscribe(&self, id: BusId) -> RtResult<()> {
        self.core.borrow_mut().bus_unsubscribe(self.id, id)
    }

    /// Publish an entry. Fails with `no-memory` while the ring is full of
    /// entries still owed to subscribers.
    pub fn bus_publish(&self, id: BusId, data: &[u8]) -> RtResult<u64> {
        self.core.borrow_mut().bus_publish(id, data)
    }

    /// Non-blocking read at this subscriber's cursor.
    pub fn bus_read(&self, id: BusId) -> RtResult<Vec<u8>> {
        self.core.borrow_mut().bus_read(self.id, id)
    }

    /// Blocking read: waits for a publish or the deadline.
    pub fn bus_read_wait(&self, id: BusId, wait: Wait) -> BusReadFuture {
        BusReadFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            bus: id,
            wait,
            deadline: None,
        }
    }

    // ------------------------------------------------------------------
    // Select and I/O
    // ------------------------------------------------------------------

    /// Wait on several sources at once; the first ready source wins, ties
    /// broken by array index.
    pub fn select(&self, sources: Vec<SelectSource>, wait: Wait) -> SelectFuture {
        SelectFuture::new(Rc::clone(&self.core), self.id, sources, wait)
    }

    /// Close a provider-scoped handle; requests blocked on it complete
    /// with `closed`.
    pub fn io_close(&self, provider: IoProviderId, handle: i64) -> RtResult<()> {
        self.core.borrow_mut().io_close(provider, handle)
    }

    /// Submit an I/O request to a registered provider and wait for its
    /// completion.
    pub fn io_wait(&self, provider: IoProviderId, request: IoRequest, wait: Wait) -> IoFuture {
        IoFuture {
            core: Rc::clone(&self.core),
            id: self.id,
            provider,
            request: Some(request),
            wait,
            deadline: None,
        }
    }

    // ------------------------------------------------------------------
    // Supervision
    // ------------------------------------------------------------------

    /// Start a supervisor actor for `spec`.
    pub fn supervisor_start(&self, spec: SupervisorSpec) -> RtResult<ActorId> {
        supervisor::start(&self.core, spec)
    }

    /// Ask a supervisor to stop: it terminates its children in reverse
    /// start order and exits normally.
    pub fn supervisor_stop(&self, id: ActorId) -> RtResult<()> {
        supervisor::stop(&self.core, id)
    }
}

/// Resolve the tri-state wait into an absolute deadline, memoized on the
/// first poll so retries measure from the original call.
fn resolve_deadline(wait: Wait, deadline: &mut Option<Instant>) -> Option<Instant> {
    match wait {
        Wait::NoWait | Wait::Forever => None,
        Wait::For(d) => Some(*deadline.get_or_insert_with(|| Instant::now() + d)),
    }
}

/// Future returned by [`ActorContext::recv`] and
/// [`ActorContext::recv_match`].
pub struct RecvFuture {
    core: CoreHandle,
    id: ActorId,
    filter: Option<MatchFilter>,
    wait: Wait,
    deadline: Option<Instant>,
}

impl Future for RecvFuture {
    type Output = RtResult<Message>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.core.borrow_mut();
        if let Some(message) = core.try_recv(this.id, this.filter.as_ref()) {
            return Poll::Ready(Ok(message));
        }
        if this.wait == Wait::NoWait {
            return Poll::Ready(Err(RtError::WouldBlock));
        }
        let deadline = resolve_deadline(this.wait, &mut this.deadline);
        if let Some(at) = deadline {
            if Instant::now() >= at {
                return Poll::Ready(Err(RtError::Timeout));
            }
        }
        let filter = this.filter.clone().unwrap_or_default();
        core.block_current(this.id, WaitKind::Recv(filter), deadline);
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::request`].
pub struct RequestFuture {
    core: CoreHandle,
    id: ActorId,
    to: ActorId,
    data: Vec<u8>,
    wait: Wait,
    deadline: Option<Instant>,
    correlation: Option<u32>,
}

impl Future for RequestFuture {
    type Output = RtResult<Message>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.core.borrow_mut();
        let correlation = match this.correlation {
            Some(c) => c,
            None => {
                let c = core.next_correlation();
                if let Err(e) =
                    core.send_message(this.id, this.to, MessageClass::Request, c, &this.data)
                {
                    return Poll::Ready(Err(e));
                }
                this.correlation = Some(c);
                c
            }
        };
        let filter = MatchFilter::any()
            .with_sender(this.to)
            .with_class(MessageClass::Reply)
            .with_tag(correlation);
        if let Some(reply) = core.try_recv(this.id, Some(&filter)) {
            return Poll::Ready(Ok(reply));
        }
        if this.wait == Wait::NoWait {
            return Poll::Ready(Err(RtError::WouldBlock));
        }
        let deadline = resolve_deadline(this.wait, &mut this.deadline);
        if let Some(at) = deadline {
            if Instant::now() >= at {
                return Poll::Ready(Err(RtError::Timeout));
            }
        }
        core.block_current(this.id, WaitKind::Recv(filter), deadline);
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::send_sync`].
pub struct SendSyncFuture {
    core: CoreHandle,
    id: ActorId,
    to: ActorId,
    tag: u32,
    data: Vec<u8>,
    wait: Wait,
    deadline: Option<Instant>,
    pinned_slot: Option<u32>,
}

impl Future for SendSyncFuture {
    type Output = RtResult<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.core.borrow_mut();
        let slot = match this.pinned_slot {
            Some(slot) => slot,
            None => {
                if this.wait == Wait::NoWait {
                    // Release can never already have happened; fail before
                    // pinning anything.
                    return Poll::Ready(Err(RtError::WouldBlock));
                }
                let slot = match core.sync_send_start(this.id, this.to, this.tag, &this.data) {
                    Ok(slot) => slot,
                    Err(e) => return Poll::Ready(Err(e)),
                };
                this.pinned_slot = Some(slot);
                slot
            }
        };
        if let Some(outcome) = core.take_release_result(this.id) {
            return Poll::Ready(outcome);
        }
        let deadline = resolve_deadline(this.wait, &mut this.deadline);
        if let Some(at) = deadline {
            if Instant::now() >= at {
                core.sync_send_cancel(this.id, this.to, slot);
                return Poll::Ready(Err(RtError::Timeout));
            }
        }
        core.block_current(
            this.id,
            WaitKind::Release {
                peer: this.to,
                slot,
            },
            deadline,
        );
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::sleep`].
pub struct SleepFuture {
    core: CoreHandle,
    id: ActorId,
    duration: Duration,
    deadline: Option<Instant>,
}

impl Future for SleepFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let now = Instant::now();
        let at = *this.deadline.get_or_insert(now + this.duration);
        if now >= at {
            return Poll::Ready(());
        }
        this.core
            .borrow_mut()
            .block_current(this.id, WaitKind::Timer, Some(at));
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::yield_now`].
pub struct YieldFuture {
    core: CoreHandle,
    id: ActorId,
    yielded: bool,
}

impl Future for YieldFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.yielded {
            return Poll::Ready(());
        }
        this.yielded = true;
        this.core.borrow_mut().yield_current(this.id);
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::exit`]; never resolves.
pub struct ExitFuture {
    core: CoreHandle,
    id: ActorId,
    flagged: bool,
}

impl Future for ExitFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if !this.flagged {
            this.flagged = true;
            this.core
                .borrow_mut()
                .request_exit(this.id, ExitReason::Normal);
        }
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::bus_read_wait`].
pub struct BusReadFuture {
    core: CoreHandle,
    id: ActorId,
    bus: BusId,
    wait: Wait,
    deadline: Option<Instant>,
}

impl Future for BusReadFuture {
    type Output = RtResult<Vec<u8>>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.core.borrow_mut();
        match core.bus_read(this.id, this.bus) {
            Ok(data) => return Poll::Ready(Ok(data)),
            Err(RtError::WouldBlock) => {}
            Err(e) => return Poll::Ready(Err(e)),
        }
        if this.wait == Wait::NoWait {
            return Poll::Ready(Err(RtError::WouldBlock));
        }
        let deadline = resolve_deadline(this.wait, &mut this.deadline);
        if let Some(at) = deadline {
            if Instant::now() >= at {
                return Poll::Ready(Err(RtError::Timeout));
            }
        }
        core.block_current(this.id, WaitKind::Bus(this.bus), deadline);
        Poll::Pending
    }
}

/// Future returned by [`ActorContext::io_wait`].
pub struct IoFuture {
    core: CoreHandle,
    id: ActorId,
    provider: IoProviderId,
    request: Option<IoRequest>,
    wait: Wait,
    deadline: Option<Instant>,
}

impl Future for IoFuture {
    type Output = RtResult<usize>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.core.borrow_mut();
        if let Some(outcome) = core.take_io_result(this.id) {
            return Poll::Ready(match outcome.error {
                None => Ok(outcome.bytes),
                Some(e) => Err(e),
            });
        }
        let deadline = resolve_deadline(this.wait, &mut this.deadline);
        if let Some(request) = this.request.take() {
            if let Err(e) = core.io_submit(this.id, this.provider, request, deadline) {
                return Poll::Ready(Err(e));
            }
            if this.wait == Wait::NoWait {
                core.io_cancel(this.id);
                return Poll::Ready(Err(RtError::WouldBlock));
            }
        } else if let Some(at) = deadline {
            if Instant::now() >= at {
                core.io_cancel(this.id);
                return Poll::Ready(Err(RtError::Timeout));
            }
        }
        core.block_current(this.id, WaitKind::Io, deadline);
        Poll::Pending
    }
}
