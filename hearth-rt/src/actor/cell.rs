//! The actor control block: everything the scheduler tracks per actor.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use futures::future::LocalBoxFuture;

// Layer 3: Internal module imports
use super::{ActorConfig, ExitReason, Priority};
use crate::mailbox::Mailbox;
use crate::message::MatchFilter;
use crate::select::SelectSource;
use crate::system::errors::RtError;
use crate::util::{ActorId, BusId};

/// What a blocked actor is waiting for; the wait-predicate descriptor the
/// scheduler consults when events arrive.
#[derive(Debug, Clone)]
pub(crate) enum WaitKind {
    /// A mailbox message satisfying the filter.
    Recv(MatchFilter),
    /// An I/O completion.
    Io,
    /// A sleep deadline.
    Timer,
    /// Release of a synchronous send: `peer` is the receiver, `slot` the
    /// pinned sync buffer.
    Release { peer: ActorId, slot: u32 },
    /// A publish on the given bus.
    Bus(BusId),
    /// The first ready source of a multi-source wait.
    Select(Vec<SelectSource>),
    /// Parked on a non-runtime future; woken only through the task waker.
    External,
}

/// Scheduling state. A `Ready` actor sits in exactly one run queue, a
/// `Blocked` actor in none, and the `Running` actor was dequeued when the
/// scheduler switched into it.
#[derive(Debug, Clone)]
pub(crate) enum ActorState {
    Ready,
    Running,
    Blocked(WaitKind),
}

/// Outcome of an I/O request, parked in the cell until the blocked
/// primitive resumes and reads it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoOutcome {
    pub bytes: usize,
    pub error: Option<RtError>,
}

/// One actor's control block.
pub(crate) struct ActorCell {
    pub id: ActorId,
    pub priority: Priority,
    pub name: Option<String>,
    pub state: ActorState,
    /// The actor body; taken out of the cell while being polled.
    pub future: Option<LocalBoxFuture<'static, ()>>,
    pub mailbox: Mailbox,
    /// Bumped on every transition to `Ready`; stale wait-deadline heap
    /// entries carry an older generation and are ignored.
    pub wake_gen: u64,
    /// Set by `kill`; honored at the next scheduling point.
    pub killed: bool,
    /// Set by `exit`; honored when the current poll returns.
    pub exit_request: Option<ExitReason>,
    /// Indices into the link table.
    pub links: Vec<u32>,
    /// Monitor-table indices where this actor is the watcher.
    pub watching: Vec<u32>,
    /// Monitor-table indices where this actor is the target.
    pub watched_by: Vec<u32>,
    /// Buses this actor is subscribed to (for death cleanup).
    pub subscriptions: Vec<BusId>,
    /// The sync message currently held as receiver: (sender, sync slot).
    pub held_sync: Option<(ActorId, u32)>,
    /// Outcome slot written when a synchronous send is released or closed.
    pub release_result: Option<Result<(), RtError>>,
    /// Outcome slot written by an I/O completion.
    pub io_result: Option<IoOutcome>,
    /// Provider with an in-flight request for this actor, for cancellation.
    pub io_provider: Option<usize>,
}

impl ActorCell {
    pub fn new(id: ActorId, config: &ActorConfig) -> Self {
        Self {
            id,
            priority: config.priority,
            name: config.name.clone(),
            state: ActorState::Ready,
            future: None,
            mailbox: Mailbox::new(),
            wake_gen: 0,
            killed: false,
            exit_request: None,
            links: Vec::new(),
            watching: Vec::new(),
            watched_by: Vec::new(),
            subscriptions: Vec::new(),
            held_sync: None,
            release_result: None,
            io_result: None,
            io_provider: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.state, ActorState::Blocked(_))
    }

    /// Whether an arriving message with these attributes satisfies the
    /// current wait predicate.
    pub fn wants_message(
        &self,
        sender: ActorId,
        class: crate::message::MessageClass,
        tag: u32,
    ) -> bool {
        match &self.state {
            ActorState::Blocked(WaitKind::Recv(filter)) => filter.matches(sender, class, tag),
            ActorState::Blocked(WaitKind::Select(sources)) => sources.iter().any(|s| match s {
                SelectSource::Mailbox(filter) => filter.matches(sender, class, tag),
                SelectSource::Bus(_) => false,
            }),
            _ => false,
        }
    }

    /// Whether a publish on `bus` satisfies the current wait predicate.
    pub fn wants_bus(&self, bus: BusId) -> bool {
        match &self.state {
            ActorState::Blocked(WaitKind::Bus(b)) => *b == bus,
            ActorState::Blocked(WaitKind::Select(sources)) => sources
                .iter()
                .any(|s| matches!(s, SelectSource::Bus(b) if *b == bus)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageClass;

    fn cell() -> ActorCell {
        ActorCell::new(ActorId::from_parts(0, 1), &ActorConfig::new())
    }

    #[test]
    fn test_new_cell_is_ready() {
        let c = cell();
        assert!(matches!(c.state, ActorState::Ready));
        assert!(!c.is_blocked());
        assert!(c.mailbox.is_empty());
    }

    #[test]
    fn test_wants_message_consults_recv_filter() {
        let mut c = cell();
        let sender = ActorId::from_parts(1, 2);
        c.state = ActorState::Blocked(WaitKind::Recv(MatchFilter::any().with_tag(7)));
        assert!(c.wants_message(sender, MessageClass::Notify, 7));
        assert!(!c.wants_message(sender, MessageClass::Notify, 8));
    }

    #[test]
    fn test_wants_message_consults_select_sources() {
        let mut c = cell();
        let sender = ActorId::from_parts(1, 2);
        let bus = BusId::from_parts(0, 1);
        c.state = ActorState::Blocked(WaitKind::Select(vec![
            SelectSource::Bus(bus),
            SelectSource::Mailbox(MatchFilter::any().with_class(MessageClass::Reply)),
        ]));
        assert!(c.wants_message(sender, MessageClass::Reply, 0));
        assert!(!c.wants_message(sender, MessageClass::Notify, 0));
        assert!(c.wants_bus(bus));
        assert!(!c.wants_bus(BusId::from_parts(0, 2)));
    }

    #[test]
    fn test_ready_actor_wants_nothing() {
        let c = cell();
        assert!(!c.wants_message(ActorId::RUNTIME, MessageClass::Notify, 0));
        assert!(!c.wants_bus(BusId::from_parts(0, 1)));
    }
}
