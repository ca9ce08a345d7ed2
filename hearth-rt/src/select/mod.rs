//! Multi-source wait: first-ready resolution over mailbox filters and
//! buses, ties broken by array index.

// Layer 1: Standard library imports
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::cell::WaitKind;
use crate::actor::Wait;
use crate::message::MatchFilter;
use crate::system::errors::{RtError, RtResult};
use crate::system::scheduler::{Core, CoreHandle};
use crate::util::{ActorId, BusId};

/// One source of a multi-source wait.
#[derive(Debug, Clone)]
pub enum SelectSource {
    /// Ready when the mailbox holds a message matching the filter. The
    /// message is left queued for a subsequent receive.
    Mailbox(MatchFilter),
    /// Ready when this subscriber's cursor is behind the bus tip. The
    /// entry is read and the cursor advanced on resolution.
    Bus(BusId),
}

/// What resolved a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectEvent {
    /// A matching mailbox message is waiting.
    MailboxReady,
    /// A bus entry, read on this actor's behalf.
    BusEntry(Vec<u8>),
}

/// Outcome of a select: the winning source index plus its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectResult {
    /// Index into the source array passed to `select`.
    pub index: usize,
    /// The resolving event.
    pub event: SelectEvent,
}

fn try_sources(
    core: &mut Core,
    id: ActorId,
    sources: &[SelectSource],
) -> Option<RtResult<SelectResult>> {
    for (index, source) in sources.iter().enumerate() {
        match source {
            SelectSource::Mailbox(filter) => {
                if core.mailbox_has(id, filter) {
                    return Some(Ok(SelectResult {
                        index,
                        event: SelectEvent::MailboxReady,
                    }));
                }
            }
            SelectSource::Bus(bus) => {
                if core.bus_has_ready(id, *bus) {
                    return Some(match core.bus_read(id, *bus) {
                        Ok(data) => Ok(SelectResult {
                            index,
                            event: SelectEvent::BusEntry(data),
                        }),
                        Err(e) => Err(e),
                    });
                }
            }
        }
    }
    None
}

/// Future returned by [`ActorContext::select`](crate::actor::ActorContext::select).
pub struct SelectFuture {
    core: CoreHandle,
    id: ActorId,
    sources: Vec<SelectSource>,
    wait: Wait,
    deadline: Option<Instant>,
}

impl SelectFuture {
    pub(crate) fn new(core: CoreHandle, id: ActorId, sources: Vec<SelectSource>, wait: Wait) -> Self {
        Self {
            core,
            id,
            sources,
            wait,
            deadline: None,
        }
    }
}

impl Future for SelectFuture {
    type Output = RtResult<SelectResult>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.sources.is_empty() {
            return Poll::Ready(Err(RtError::InvalidArgument("empty select")));
        }
        let mut core = this.core.borrow_mut();
        if let Some(result) = try_sources(&mut core, this.id, &this.sources) {
            return Poll::Ready(result);
        }
        if this.wait == Wait::NoWait {
            return Poll::Ready(Err(RtError::WouldBlock));
        }
        let deadline = match this.wait {
            Wait::For(d) => Some(*this.deadline.get_or_insert_with(|| Instant::now() + d)),
            _ => None,
        };
        if let Some(at) = deadline {
            if Instant::now() >= at {
                return Poll::Ready(Err(RtError::Timeout));
            }
        }
        core.block_current(this.id, WaitKind::Select(this.sources.clone()), deadline);
        Poll::Pending
    }
}
