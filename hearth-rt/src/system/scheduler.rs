//! The cooperative scheduler core.
//!
//! One `Core` per runtime, mutated only on the scheduler thread. Actors are
//! stackless coroutines: the body is a boxed future, a blocking primitive
//! records a wait predicate and returns `Poll::Pending`, and the scheduler
//! polls the highest-priority ready actor next. Because locals live in the
//! future's state machine, nothing is saved or restored at a switch; in
//! particular there is no floating-point or SIMD register state to
//! preserve across a suspension point.
//!
//! Invariants:
//! - a `Ready` actor sits in exactly one run queue;
//! - a `Blocked` actor sits in none;
//! - the `Running` actor was dequeued when the scheduler switched into it.

// Layer 1: Standard library imports
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use futures::future::LocalBoxFuture;
use futures::task::ArcWake;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::actor::cell::{ActorCell, ActorState, IoOutcome, WaitKind};
use crate::actor::{ActorConfig, ExitReason, Priority};
use crate::bus::{BusConfig, BusRegistry};
use crate::io::{Completion, CompletionQueue, IoProvider, IoProviderId, IoRequest};
use crate::message::pool::MsgArena;
use crate::message::{MatchFilter, Message, MessageClass, Payload, QueuedMessage};
use crate::system::config::RuntimeConfig;
use crate::system::errors::{RtError, RtResult};
use crate::timer::TimerTable;
use crate::util::{ActorId, BusId, MonitorRef, TimerId};
use crate::watch::WatchTable;

/// Shared handle into the scheduler core.
pub(crate) type CoreHandle = Rc<RefCell<Core>>;

#[derive(Default)]
struct WakeState {
    ready: Vec<ActorId>,
    pinged: bool,
}

struct WakeInner {
    state: Mutex<WakeState>,
    condvar: Condvar,
}

/// Handle used to interrupt the scheduler's idle sleep from another
/// thread. Cloned into I/O providers and task wakers.
#[derive(Clone)]
pub struct SchedulerWaker {
    inner: Arc<WakeInner>,
}

impl SchedulerWaker {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(WakeInner {
                state: Mutex::new(WakeState::default()),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Interrupt the idle sleep.
    pub fn wake(&self) {
        let mut state = self.inner.state.lock();
        state.pinged = true;
        self.inner.condvar.notify_one();
    }

    fn wake_actor(&self, id: ActorId) {
        let mut state = self.inner.state.lock();
        state.ready.push(id);
        state.pinged = true;
        self.inner.condvar.notify_one();
    }

    fn take(&self) -> Vec<ActorId> {
        let mut state = self.inner.state.lock();
        state.pinged = false;
        mem::take(&mut state.ready)
    }

    /// Sleep until woken or `timeout` elapses.
    pub(crate) fn park(&self, timeout: Duration) {
        let mut state = self.inner.state.lock();
        if !state.pinged {
            self.inner.condvar.wait_for(&mut state, timeout);
        }
    }
}

/// Task waker handed to actor futures; wakes route through the external
/// queue so even a foreign-future await cannot wedge the scheduler.
struct ActorWaker {
    id: ActorId,
    shared: SchedulerWaker,
}

impl ArcWake for ActorWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.shared.wake_actor(arc_self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WaitDeadline {
    at: Instant,
    id: ActorId,
    generation: u64,
}

impl Ord for WaitDeadline {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.id.raw().cmp(&other.id.raw()))
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

impl PartialOrd for WaitDeadline {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct Slot {
    /// Serial of the current occupant; 0 when the slot is free.
    serial: u64,
    cell: Option<ActorCell>,
}

/// All runtime state, owned by [`Runtime`](crate::system::Runtime) and
/// mutated only on the scheduler thread.
pub(crate) struct Core {
    pub config: RuntimeConfig,
    slots: Vec<Slot>,
    free_slots: Vec<u16>,
    next_serial: u64,
    live_count: usize,
    run_queues: [VecDeque<ActorId>; Priority::COUNT],
    /// The actor currently being polled, if any.
    current: Option<ActorId>,
    pub(crate) arena: MsgArena,
    names: HashMap<String, ActorId>,
    pub(crate) timers: TimerTable,
    wait_deadlines: BinaryHeap<Reverse<WaitDeadline>>,
    pub(crate) buses: BusRegistry,
    watch: WatchTable,
    providers: Vec<Box<dyn IoProvider>>,
    completions: CompletionQueue,
    waker: SchedulerWaker,
    next_correlation: u32,
    pub shutdown: bool,
}

impl Core {
    pub fn new(config: RuntimeConfig) -> Self {
        let waker = SchedulerWaker::new();
        let completions = CompletionQueue::new(config.completion_queue_size, waker.clone());
        let arena = MsgArena::new(
            config.mailbox_entry_pool_size,
            config.message_data_pool_size,
            config.sync_buffer_pool_size,
            config.max_message_size,
        );
        Self {
            slots: (0..config.max_actors)
                .map(|_| Slot {
                    serial: 0,
                    cell: None,
                })
                .collect(),
            free_slots: (0..config.max_actors as u16).rev().collect(),
            next_serial: 0,
            live_count: 0,
            run_queues: Default::default(),
            current: None,
            arena,
            names: HashMap::new(),
            timers: TimerTable::new(config.timer_entry_pool_size),
            wait_deadlines: BinaryHeap::new(),
            buses: BusRegistry::new(config.max_buses),
            watch: WatchTable::new(
                config.link_entry_pool_size,
                config.monitor_entry_pool_size,
            ),
            providers: Vec::new(),
            completions,
            waker,
            next_correlation: 0,
            shutdown: false,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Actor table
    // ------------------------------------------------------------------

    pub fn cell(&self, id: ActorId) -> Option<&ActorCell> {
        self.slots
            .get(id.slot() as usize)
            .filter(|s| s.serial != 0 && s.serial == id.serial())
            .and_then(|s| s.cell.as_ref())
    }

    pub fn cell_mut(&mut self, id: ActorId) -> Option<&mut ActorCell> {
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|s| s.serial != 0 && s.serial == id.serial())
            .and_then(|s| s.cell.as_mut())
    }

    pub fn is_alive(&self, id: ActorId) -> bool {
        self.cell(id).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Allocate a slot, id, and cell; the future is installed separately
    /// because building it requires a context that points back at the
    /// core.
    pub fn reserve_actor(&mut self, config: &ActorConfig) -> RtResult<ActorId> {
        if let Some(name) = &config.name {
            if self.names.contains_key(name) {
                return Err(RtError::Exists);
            }
        }
        let slot = self.free_slots.pop().ok_or(RtError::NoMemory)?;
        self.next_serial += 1;
        let id = ActorId::from_parts(slot, self.next_serial);
        let cell = ActorCell::new(id, config);
        if let Some(name) = &config.name {
            self.names.insert(name.clone(), id);
        }
        self.slots[slot as usize].serial = id.serial();
        self.slots[slot as usize].cell = Some(cell);
        self.live_count += 1;
        self.run_queues[config.priority.index()].push_back(id);
        debug!(actor = %id, priority = ?config.priority, name = ?config.name, "spawned");
        Ok(id)
    }

    pub fn install_future(&mut self, id: ActorId, future: LocalBoxFuture<'static, ()>) {
        if let Some(cell) = self.cell_mut(id) {
            cell.future = Some(future);
        }
    }

    // ------------------------------------------------------------------
    // Wakeup discipline
    // ------------------------------------------------------------------

    /// Transition a blocked (or freshly spawned) actor to ready and queue
    /// it at the tail of its class.
    pub fn make_ready(&mut self, id: ActorId) {
        let Some(cell) = self.cell_mut(id) else {
            return;
        };
        if !matches!(cell.state, ActorState::Blocked(_)) {
            return;
        }
        cell.state = ActorState::Ready;
        cell.wake_gen += 1;
        let priority = cell.priority;
        self.run_queues[priority.index()].push_back(id);
    }

    /// Record the current actor's wait predicate and optional deadline.
    pub fn block_current(&mut self, id: ActorId, kind: WaitKind, deadline: Option<Instant>) {
        let Some(cell) = self.cell_mut(id) else {
            return;
        };
        cell.state = ActorState::Blocked(kind);
        let generation = cell.wake_gen;
        if let Some(at) = deadline {
            self.wait_deadlines.push(Reverse(WaitDeadline {
                at,
                id,
                generation,
            }));
        }
    }

    /// Round-robin requeue for a voluntarily yielding actor.
    pub fn yield_current(&mut self, id: ActorId) {
        let Some(cell) = self.cell_mut(id) else {
            return;
        };
        cell.state = ActorState::Ready;
        cell.wake_gen += 1;
        let priority = cell.priority;
        self.run_queues[priority.index()].push_back(id);
    }

    /// Pop the highest-priority ready actor, skipping stale queue entries.
    pub fn pick_next(&mut self) -> Option<ActorId> {
        for queue in &mut self.run_queues {
            while let Some(id) = queue.pop_front() {
                let valid = self
                    .slots
                    .get(id.slot() as usize)
                    .filter(|s| s.serial == id.serial())
                    .and_then(|s| s.cell.as_ref())
                    .is_some_and(|c| matches!(c.state, ActorState::Ready));
                if valid {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Snapshot of currently-ready actors in priority order (step mode).
    pub fn ready_snapshot(&self) -> Vec<ActorId> {
        let mut out = Vec::new();
        for queue in &self.run_queues {
            out.extend(queue.iter().copied());
        }
        out
    }

    /// Remove a specific actor from its run queue ahead of a step-mode
    /// poll. Returns false when it is no longer ready.
    pub fn dequeue_ready(&mut self, id: ActorId) -> bool {
        let Some(cell) = self.cell(id) else {
            return false;
        };
        if !matches!(cell.state, ActorState::Ready) {
            return false;
        }
        let priority = cell.priority;
        let queue = &mut self.run_queues[priority.index()];
        let before = queue.len();
        queue.retain(|q| *q != id);
        before != queue.len()
    }

    // ------------------------------------------------------------------
    // Service pass: I/O, timers, deadlines, external wakes
    // ------------------------------------------------------------------

    /// One service pass: absorb external (waker) wakes, drain I/O
    /// completions, fire due timers, expire wait deadlines.
    ///
    /// The waker flag is consumed first: anything pushed after this point
    /// leaves the flag set, so the following idle park cannot sleep over
    /// fresh work.
    pub fn service(&mut self, now: Instant) {
        for id in self.waker.take() {
            if self.cell(id).is_some_and(ActorCell::is_blocked) {
                self.make_ready(id);
            }
        }
        self.drain_io();
        self.fire_due_timers(now);
        self.expire_wait_deadlines(now);
    }

    fn drain_io(&mut self) {
        let mut drained: Vec<Completion> = Vec::new();
        for provider in &mut self.providers {
            provider.poll_completions(&mut |c| drained.push(c));
        }
        self.completions.drain(&mut |c| drained.push(c));
        for completion in drained {
            self.complete_io(completion);
        }
    }

    fn complete_io(&mut self, completion: Completion) {
        let Some(cell) = self.cell_mut(completion.actor) else {
            return;
        };
        if !matches!(cell.state, ActorState::Blocked(WaitKind::Io)) {
            // Late completion after a timeout; the result is dropped.
            trace!(actor = %completion.actor, "dropping late I/O completion");
            return;
        }
        cell.io_result = Some(IoOutcome {
            bytes: completion.bytes,
            error: completion.error,
        });
        cell.io_provider = None;
        self.make_ready(completion.actor);
    }

    fn fire_due_timers(&mut self, now: Instant) {
        while let Some((timer_id, owner)) = self.timers.pop_due(now) {
            match self.deliver_internal(ActorId::RUNTIME, owner, MessageClass::Timer, timer_id.raw())
            {
                Ok(()) => self.timers.retire(timer_id),
                Err(RtError::NoMemory) => {
                    // Entry pool exhausted; retry this fire next pass.
                    self.timers.defer(timer_id);
                    break;
                }
                Err(_) => self.timers.cancel(timer_id),
            }
        }
    }

    fn expire_wait_deadlines(&mut self, now: Instant) {
        while let Some(Reverse(head)) = self.wait_deadlines.peek().copied() {
            if head.at > now {
                break;
            }
            self.wait_deadlines.pop();
            let fresh = self
                .cell(head.id)
                .is_some_and(|c| c.is_blocked() && c.wake_gen == head.generation);
            if fresh {
                self.make_ready(head.id);
            }
        }
    }

    /// The nearest instant anything is scheduled to happen.
    pub fn next_wakeup(&mut self) -> Option<Instant> {
        let timer = self.timers.next_due();
        let wait = loop {
            let Some(Reverse(head)) = self.wait_deadlines.peek().copied() else {
                break None;
            };
            let fresh = self
                .cell(head.id)
                .is_some_and(|c| c.is_blocked() && c.wake_gen == head.generation);
            if fresh {
                break Some(head.at);
            }
            self.wait_deadlines.pop();
        };
        match (timer, wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn waker(&self) -> SchedulerWaker {
        self.waker.clone()
    }

    pub fn completion_queue(&self) -> CompletionQueue {
        self.completions.clone()
    }

    // ------------------------------------------------------------------
    // Message delivery
    // ------------------------------------------------------------------

    fn deliver_queued(&mut self, to: ActorId, queued: QueuedMessage) -> RtResult<()> {
        let sender = queued.sender;
        let class = queued.class;
        let tag = queued.tag;
        let payload = queued.payload;
        let slot_idx = to.slot() as usize;
        let cell = match self.slots.get_mut(slot_idx) {
            Some(s) if s.serial == to.serial() => match s.cell.as_mut() {
                Some(cell) => cell,
                None => {
                    self.arena.release_payload(payload);
                    return Err(RtError::InvalidArgument("stale actor id"));
                }
            },
            _ => {
                self.arena.release_payload(payload);
                return Err(RtError::InvalidArgument("stale actor id"));
            }
        };
        if let Err(e) = cell.mailbox.push(&mut self.arena, queued) {
            self.arena.release_payload(payload);
            return Err(e);
        }
        if cell.wants_message(sender, class, tag) {
            self.make_ready(to);
        }
        Ok(())
    }

    /// Payload-free internal delivery (timer fires, exit notifications).
    fn deliver_internal(
        &mut self,
        sender: ActorId,
        to: ActorId,
        class: MessageClass,
        tag: u32,
    ) -> RtResult<()> {
        self.deliver_queued(
            to,
            QueuedMessage {
                sender,
                class,
                tag,
                payload: Payload::None,
            },
        )
    }

    /// Copy `data` into the async payload pool and enqueue it.
    pub fn send_message(
        &mut self,
        from: ActorId,
        to: ActorId,
        class: MessageClass,
        tag: u32,
        data: &[u8],
    ) -> RtResult<()> {
        if data.len() > self.config.max_message_size {
            return Err(RtError::InvalidArgument("payload too large"));
        }
        if !self.is_alive(to) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        let payload = if data.is_empty() {
            Payload::None
        } else {
            let slot = self.arena.data.store(data)?;
            Payload::Data {
                slot,
                len: data.len() as u32,
            }
        };
        self.deliver_queued(
            to,
            QueuedMessage {
                sender: from,
                class,
                tag,
                payload,
            },
        )
    }

    /// Fresh correlation tag for a request; the reply filter is
    /// class-qualified, so aliasing with user tags is harmless.
    pub fn next_correlation(&mut self) -> u32 {
        self.next_correlation = self.next_correlation.wrapping_add(1);
        if self.next_correlation == 0 {
            self.next_correlation = 1;
        }
        self.next_correlation
    }

    /// Dequeue the next (optionally filtered) message for `actor`,
    /// implicitly releasing any sync message it still holds.
    pub fn try_recv(&mut self, actor: ActorId, filter: Option<&MatchFilter>) -> Option<Message> {
        let held = self.cell_mut(actor).and_then(|c| c.held_sync.take());
        if let Some((sender, slot)) = held {
            self.resolve_release(sender, slot, Ok(()));
        }
        let slot_idx = actor.slot() as usize;
        let cell = match self.slots.get_mut(slot_idx) {
            Some(s) if s.serial == actor.serial() => s.cell.as_mut()?,
            _ => return None,
        };
        let queued = match filter {
            None => cell.mailbox.pop(&mut self.arena),
            Some(f) => cell.mailbox.pop_match(&mut self.arena, f),
        }?;
        let data = self.arena.copy_out(queued.payload);
        let sync_slot = match queued.payload {
            Payload::Sync { slot, .. } => {
                cell.held_sync = Some((queued.sender, slot));
                Some(slot)
            }
            Payload::Data { slot, .. } => {
                self.arena.data.free(slot);
                None
            }
            Payload::None => None,
        };
        Some(Message {
            sender: queued.sender,
            class: queued.class,
            tag: queued.tag,
            data,
            sync_slot,
        })
    }

    /// Whether the actor's mailbox holds a message matching `filter`.
    pub fn mailbox_has(&self, actor: ActorId, filter: &MatchFilter) -> bool {
        self.cell(actor)
            .is_some_and(|c| c.mailbox.has_match(&self.arena, filter))
    }

    // ------------------------------------------------------------------
    // Synchronous send (backpressure)
    // ------------------------------------------------------------------

    /// Validate, pin the payload in the sync pool, and enqueue the
    /// message. The caller blocks with `WaitKind::Release` on success.
    pub fn sync_send_start(
        &mut self,
        from: ActorId,
        to: ActorId,
        tag: u32,
        data: &[u8],
    ) -> RtResult<u32> {
        if to == from {
            return Err(RtError::InvalidArgument("synchronous send to self"));
        }
        if data.len() > self.config.max_message_size {
            return Err(RtError::InvalidArgument("payload too large"));
        }
        let target = self
            .cell(to)
            .ok_or(RtError::InvalidArgument("stale actor id"))?;
        // Direct rendezvous cycle: the target is itself blocked in a
        // synchronous send aimed back at us.
        if matches!(
            &target.state,
            ActorState::Blocked(WaitKind::Release { peer, .. }) if *peer == from
        ) {
            return Err(RtError::InvalidArgument("synchronous send cycle"));
        }
        let slot = self.arena.sync.store(data)?;
        let queued = QueuedMessage {
            sender: from,
            class: MessageClass::Notify,
            tag,
            payload: Payload::Sync {
                slot,
                len: data.len() as u32,
            },
        };
        self.deliver_queued(to, queued)?;
        Ok(slot)
    }

    /// Free the pinned buffer and, when the sender is still parked on this
    /// exact rendezvous, hand it the outcome.
    pub fn resolve_release(&mut self, sender: ActorId, slot: u32, outcome: RtResult<()>) {
        self.arena.sync.free(slot);
        let Some(cell) = self.cell_mut(sender) else {
            return;
        };
        let waiting = matches!(
            &cell.state,
            ActorState::Blocked(WaitKind::Release { slot: s, .. }) if *s == slot
        );
        if waiting {
            cell.release_result = Some(outcome);
            self.make_ready(sender);
        }
    }

    /// Explicit release of the sync message `actor` currently holds.
    pub fn release_held(&mut self, actor: ActorId, sender: ActorId, slot: u32) -> RtResult<()> {
        let Some(cell) = self.cell_mut(actor) else {
            return Err(RtError::InvalidArgument("stale actor id"));
        };
        if cell.held_sync != Some((sender, slot)) {
            return Err(RtError::NotFound);
        }
        cell.held_sync = None;
        self.resolve_release(sender, slot, Ok(()));
        Ok(())
    }

    /// Take the parked outcome of a synchronous send, if any.
    pub fn take_release_result(&mut self, id: ActorId) -> Option<RtResult<()>> {
        self.cell_mut(id).and_then(|c| c.release_result.take())
    }

    /// Take the parked outcome of an I/O request, if any.
    pub fn take_io_result(&mut self, id: ActorId) -> Option<IoOutcome> {
        self.cell_mut(id).and_then(|c| c.io_result.take())
    }

    /// Called when a sync sender's deadline fires: retract the message if
    /// it is still queued (freeing the buffer); a message already held by
    /// the receiver stays pinned until the receiver releases it.
    pub fn sync_send_cancel(&mut self, from: ActorId, to: ActorId, slot: u32) {
        let slot_idx = to.slot() as usize;
        let Some(cell) = self
            .slots
            .get_mut(slot_idx)
            .filter(|s| s.serial == to.serial())
            .and_then(|s| s.cell.as_mut())
        else {
            return;
        };
        let retracted = cell.mailbox.pop_where(&mut self.arena, |m| {
            m.sender == from && matches!(m.payload, Payload::Sync { slot: s, .. } if s == slot)
        });
        if retracted.is_some() {
            self.arena.sync.free(slot);
        }
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    pub fn register_name(&mut self, id: ActorId, name: &str) -> RtResult<()> {
        if !self.is_alive(id) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        if self.names.contains_key(name) {
            return Err(RtError::Exists);
        }
        self.names.insert(name.to_string(), id);
        if let Some(cell) = self.cell_mut(id) {
            cell.name = Some(name.to_string());
        }
        Ok(())
    }

    pub fn whereis(&self, name: &str) -> RtResult<ActorId> {
        self.names.get(name).copied().ok_or(RtError::NotFound)
    }

    // ------------------------------------------------------------------
    // Links and monitors
    // ------------------------------------------------------------------

    pub fn link(&mut self, a: ActorId, b: ActorId) -> RtResult<()> {
        if a == b {
            return Err(RtError::InvalidArgument("link to self"));
        }
        if !self.is_alive(a) || !self.is_alive(b) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        let duplicate = self
            .cell(a)
            .map(|c| c.links.clone())
            .unwrap_or_default()
            .iter()
            .any(|idx| self.watch.link(*idx).is_some_and(|e| e.joins(a, b)));
        if duplicate {
            return Ok(());
        }
        let idx = self.watch.add_link(a, b)?;
        if let Some(cell) = self.cell_mut(a) {
            cell.links.push(idx);
        }
        if let Some(cell) = self.cell_mut(b) {
            cell.links.push(idx);
        }
        Ok(())
    }

    pub fn unlink(&mut self, a: ActorId, b: ActorId) -> RtResult<()> {
        let indices = self.cell(a).map(|c| c.links.clone()).unwrap_or_default();
        let Some(idx) = indices
            .into_iter()
            .find(|idx| self.watch.link(*idx).is_some_and(|e| e.joins(a, b)))
        else {
            return Err(RtError::NotFound);
        };
        self.watch.take_link(idx);
        if let Some(cell) = self.cell_mut(a) {
            cell.links.retain(|i| *i != idx);
        }
        if let Some(cell) = self.cell_mut(b) {
            cell.links.retain(|i| *i != idx);
        }
        Ok(())
    }

    pub fn monitor(&mut self, watcher: ActorId, target: ActorId) -> RtResult<MonitorRef> {
        if watcher == target {
            return Err(RtError::InvalidArgument("monitor of self"));
        }
        if !self.is_alive(watcher) || !self.is_alive(target) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        let (idx, reference) = self.watch.add_monitor(watcher, target)?;
        if let Some(cell) = self.cell_mut(watcher) {
            cell.watching.push(idx);
        }
        if let Some(cell) = self.cell_mut(target) {
            cell.watched_by.push(idx);
        }
        Ok(reference)
    }

    pub fn demonitor(&mut self, watcher: ActorId, reference: MonitorRef) -> RtResult<()> {
        let indices = self.cell(watcher).map(|c| c.watching.clone()).unwrap_or_default();
        let Some(idx) = indices.into_iter().find(|idx| {
            self.watch
                .monitor(*idx)
                .is_some_and(|m| m.reference == reference && m.watcher == watcher)
        }) else {
            return Err(RtError::NotFound);
        };
        let target = self.watch.take_monitor(idx).map(|m| m.target);
        if let Some(cell) = self.cell_mut(watcher) {
            cell.watching.retain(|i| *i != idx);
        }
        if let Some(target) = target {
            if let Some(cell) = self.cell_mut(target) {
                cell.watched_by.retain(|i| *i != idx);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buses
    // ------------------------------------------------------------------

    pub fn bus_create(&mut self, config: BusConfig) -> RtResult<BusId> {
        let entries_cap = self.config.max_bus_entries;
        let subs_cap = self.config.max_bus_subscribers;
        self.buses.create(config, entries_cap, subs_cap)
    }

    pub fn bus_destroy(&mut self, id: BusId) -> RtResult<()> {
        self.buses.destroy(id)
    }

    pub fn bus_subscribe(&mut self, actor: ActorId, id: BusId) -> RtResult<()> {
        if !self.is_alive(actor) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        let bus = self
            .buses
            .get_mut(id)
            .ok_or(RtError::InvalidArgument("unknown bus"))?;
        bus.subscribe(actor)?;
        if let Some(cell) = self.cell_mut(actor) {
            cell.subscriptions.push(id);
        }
        Ok(())
    }

    pub fn bus_unsubscribe(&mut self, actor: ActorId, id: BusId) -> RtResult<()> {
        let bus = self
            .buses
            .get_mut(id)
            .ok_or(RtError::InvalidArgument("unknown bus"))?;
        bus.unsubscribe(actor)?;
        if let Some(cell) = self.cell_mut(actor) {
            cell.subscriptions.retain(|b| *b != id);
        }
        Ok(())
    }

    pub fn bus_publish(&mut self, id: BusId, data: &[u8]) -> RtResult<u64> {
        let now = Instant::now();
        let bus = self
            .buses
            .get_mut(id)
            .ok_or(RtError::InvalidArgument("unknown bus"))?;
        let seq = bus.publish(data, now)?;
        let subscribers = bus.subscriber_ids();
        for actor in subscribers {
            if self.cell(actor).is_some_and(|c| c.wants_bus(id)) {
                self.make_ready(actor);
            }
        }
        Ok(seq)
    }

    pub fn bus_read(&mut self, actor: ActorId, id: BusId) -> RtResult<Vec<u8>> {
        let now = Instant::now();
        let bus = self
            .buses
            .get_mut(id)
            .ok_or(RtError::InvalidArgument("unknown bus"))?;
        bus.read(actor, now)
    }

    pub fn bus_has_ready(&self, actor: ActorId, id: BusId) -> bool {
        self.buses.get(id).is_some_and(|b| b.has_ready(actor))
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Arm a one-shot timer owned by `owner`.
    pub fn timer_after(&mut self, owner: ActorId, delay: Duration) -> RtResult<TimerId> {
        if !self.is_alive(owner) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        self.timers.arm(owner, delay, None, Instant::now())
    }

    /// Arm a periodic timer owned by `owner`.
    pub fn timer_every(&mut self, owner: ActorId, period: Duration) -> RtResult<TimerId> {
        if !self.is_alive(owner) {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        if period.is_zero() {
            return Err(RtError::InvalidArgument("zero period"));
        }
        self.timers.arm(owner, period, Some(period), Instant::now())
    }

    /// Cancel a timer; idempotent.
    pub fn timer_cancel(&mut self, id: TimerId) {
        self.timers.cancel(id);
    }

    // ------------------------------------------------------------------
    // I/O
    // ------------------------------------------------------------------

    pub fn register_provider(&mut self, mut provider: Box<dyn IoProvider>) -> IoProviderId {
        provider.attach_waker(self.waker.clone());
        self.providers.push(provider);
        IoProviderId(self.providers.len() - 1)
    }

    pub fn io_submit(
        &mut self,
        actor: ActorId,
        provider: IoProviderId,
        request: IoRequest,
        deadline: Option<Instant>,
    ) -> RtResult<()> {
        let index = provider.0;
        if index >= self.providers.len() {
            return Err(RtError::InvalidArgument("unknown i/o provider"));
        }
        self.providers[index].submit(request, actor, deadline)?;
        if let Some(cell) = self.cell_mut(actor) {
            cell.io_provider = Some(index);
        }
        Ok(())
    }

    /// Close a provider-scoped handle; requests blocked on it complete
    /// with `closed`.
    pub fn io_close(&mut self, provider: IoProviderId, handle: i64) -> RtResult<()> {
        let p = self
            .providers
            .get_mut(provider.0)
            .ok_or(RtError::InvalidArgument("unknown i/o provider"))?;
        p.close(handle);
        Ok(())
    }

    pub fn io_cancel(&mut self, actor: ActorId) {
        let provider = self.cell_mut(actor).and_then(|c| c.io_provider.take());
        if let Some(index) = provider {
            if let Some(p) = self.providers.get_mut(index) {
                p.cancel(actor);
            }
        }
    }

    // ------------------------------------------------------------------
    // Termination
    // ------------------------------------------------------------------

    /// Flag the current actor for voluntary exit; honored when its poll
    /// returns.
    pub fn request_exit(&mut self, id: ActorId, reason: ExitReason) {
        if let Some(cell) = self.cell_mut(id) {
            cell.exit_request = Some(reason);
        }
    }

    /// Schedule or perform a kill. Killing the currently running actor is
    /// deferred to its next scheduling point; anything else is finalized
    /// immediately. The returned future must be dropped after the core
    /// borrow is released.
    pub fn kill(&mut self, id: ActorId) -> RtResult<Option<LocalBoxFuture<'static, ()>>> {
        if self.cell(id).is_none() {
            return Err(RtError::InvalidArgument("stale actor id"));
        }
        if self.current == Some(id) {
            if let Some(cell) = self.cell_mut(id) {
                cell.killed = true;
            }
            return Ok(None);
        }
        Ok(self.finalize(id, ExitReason::Killed))
    }

    /// Run the full termination sequence: timers, bus subscriptions, sync
    /// counterparties, links, monitors, mailbox, name, slot. Returns the
    /// actor's future for deferred drop.
    pub fn finalize(
        &mut self,
        id: ActorId,
        reason: ExitReason,
    ) -> Option<LocalBoxFuture<'static, ()>> {
        let slot_idx = id.slot() as usize;
        let mut cell = match self.slots.get_mut(slot_idx) {
            Some(s) if s.serial == id.serial() => s.cell.take()?,
            _ => return None,
        };
        debug!(actor = %id, reason = %reason, "exited");

        // 1. Timers owned by the actor are cancelled.
        self.timers.cancel_owned(id);

        // 2. Bus subscriptions are removed.
        for bus_id in mem::take(&mut cell.subscriptions) {
            if let Some(bus) = self.buses.get_mut(bus_id) {
                let _ = bus.unsubscribe(id);
            }
        }

        // 3. Synchronous counterparties are released with `closed`: the
        //    message currently held plus any still queued in the mailbox.
        if let Some((sender, sync_slot)) = cell.held_sync.take() {
            self.resolve_release(sender, sync_slot, Err(RtError::Closed));
        }
        let mut drained: Vec<QueuedMessage> = Vec::new();
        cell.mailbox.drain(&mut self.arena, |m| drained.push(m));
        for msg in drained {
            match msg.payload {
                Payload::Sync { slot, .. } => {
                    self.resolve_release(msg.sender, slot, Err(RtError::Closed));
                }
                other => self.arena.release_payload(other),
            }
        }

        // 4. Link partners hear `LinkExit` with the exit reason.
        for idx in mem::take(&mut cell.links) {
            let Some(entry) = self.watch.take_link(idx) else {
                continue;
            };
            let partner = entry.partner_of(id);
            if let Some(partner_cell) = self.cell_mut(partner) {
                partner_cell.links.retain(|i| *i != idx);
            }
            if let Err(e) =
                self.deliver_internal(id, partner, MessageClass::LinkExit, reason.code())
            {
                warn!(actor = %partner, error = %e, "dropping link_exit notification");
            }
        }

        // 5. Watchers hear `MonitorDown`; monitors held by the actor are
        //    discarded.
        for idx in mem::take(&mut cell.watched_by) {
            let Some(entry) = self.watch.take_monitor(idx) else {
                continue;
            };
            if let Some(watcher_cell) = self.cell_mut(entry.watcher) {
                watcher_cell.watching.retain(|i| *i != idx);
            }
            if let Err(e) =
                self.deliver_internal(id, entry.watcher, MessageClass::MonitorDown, reason.code())
            {
                warn!(actor = %entry.watcher, error = %e, "dropping monitor_down notification");
            }
        }
        for idx in mem::take(&mut cell.watching) {
            let Some(entry) = self.watch.take_monitor(idx) else {
                continue;
            };
            if let Some(target_cell) = self.cell_mut(entry.target) {
                target_cell.watched_by.retain(|i| *i != idx);
            }
        }

        // 6. Cancel in-flight I/O, release the name, retire the slot.
        if let Some(provider) = cell.io_provider.take() {
            if let Some(p) = self.providers.get_mut(provider) {
                p.cancel(id);
            }
        }
        if let Some(name) = cell.name.take() {
            self.names.remove(&name);
        }
        self.slots[slot_idx].serial = 0;
        self.free_slots.push(id.slot());
        self.live_count -= 1;
        cell.future.take()
    }

    /// Drop every actor and reset all shared structures, breaking the
    /// reference cycles between cells and contexts. Returns the futures
    /// for deferred drop.
    pub fn cleanup(&mut self) -> Vec<LocalBoxFuture<'static, ()>> {
        let mut futures = Vec::new();
        for slot in &mut self.slots {
            slot.serial = 0;
            if let Some(mut cell) = slot.cell.take() {
                if let Some(f) = cell.future.take() {
                    futures.push(f);
                }
            }
        }
        self.free_slots = (0..self.config.max_actors as u16).rev().collect();
        self.live_count = 0;
        for queue in &mut self.run_queues {
            queue.clear();
        }
        self.names.clear();
        self.wait_deadlines.clear();
        self.timers = TimerTable::new(self.config.timer_entry_pool_size);
        self.buses.clear();
        self.watch.clear();
        self.arena = MsgArena::new(
            self.config.mailbox_entry_pool_size,
            self.config.message_data_pool_size,
            self.config.sync_buffer_pool_size,
            self.config.max_message_size,
        );
        futures
    }

    fn task_waker(&self, id: ActorId) -> std::task::Waker {
        futures::task::waker(Arc::new(ActorWaker {
            id,
            shared: self.waker.clone(),
        }))
    }
}

/// Poll one actor's future exactly once. The only place user code runs.
pub(crate) fn poll_actor(core: &CoreHandle, id: ActorId) {
    let (mut future, waker) = {
        let mut c = core.borrow_mut();
        let Some(cell) = c.cell(id) else {
            return;
        };
        if cell.killed {
            let deferred = c.finalize(id, ExitReason::Killed);
            drop(c);
            drop(deferred);
            return;
        }
        let waker = c.task_waker(id);
        let Some(cell) = c.cell_mut(id) else {
            return;
        };
        cell.state = ActorState::Running;
        let Some(future) = cell.future.take() else {
            // Spawn reserved the slot but the future was never installed.
            cell.state = ActorState::Ready;
            return;
        };
        c.current = Some(id);
        (future, waker)
    };

    let mut cx = Context::from_waker(&waker);
    let poll_result = catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)));

    let mut retained = Some(future);
    let deferred = {
        let mut c = core.borrow_mut();
        c.current = None;
        match poll_result {
            Err(_panic) => {
                warn!(actor = %id, "actor panicked; exiting with crash reason");
                c.finalize(id, ExitReason::Crash)
            }
            Ok(Poll::Ready(())) => {
                let reason = match c.cell(id) {
                    Some(cell) if cell.killed => ExitReason::Killed,
                    Some(cell) => cell.exit_request.unwrap_or(ExitReason::Normal),
                    None => ExitReason::Normal,
                };
                c.finalize(id, reason)
            }
            Ok(Poll::Pending) => {
                let flags = c.cell(id).map(|cell| (cell.killed, cell.exit_request));
                match flags {
                    None => None,
                    Some((true, _)) => c.finalize(id, ExitReason::Killed),
                    Some((false, Some(reason))) => c.finalize(id, reason),
                    Some((false, None)) => {
                        if let Some(cell) = c.cell_mut(id) {
                            if matches!(cell.state, ActorState::Running) {
                                // Parked on a non-runtime future; only the
                                // task waker can bring it back.
                                cell.state = ActorState::Blocked(WaitKind::External);
                            }
                            cell.future = retained.take();
                        }
                        None
                    }
                }
            }
        }
    };
    drop(deferred);
    drop(retained);
}
