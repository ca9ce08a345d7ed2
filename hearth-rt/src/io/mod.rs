//! The I/O provider contract.
//!
//! The core never touches platform I/O. A provider (epoll reactor, io_uring
//! shim, simulator, test double) accepts opaque requests on behalf of a
//! blocked actor and later reports a completion record naming that actor.
//! Completions flow either from `poll_completions` (pull, same thread) or
//! through the shared [`CompletionQueue`] (push, worker threads), which is
//! the one place where another thread mutates runtime-adjacent state.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::system::errors::{RtError, RtResult};
use crate::system::scheduler::SchedulerWaker;
use crate::util::ActorId;

/// Request families the core understands; the provider maps them onto
/// platform primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoOp {
    /// Read up to `len` bytes from a stream handle.
    Read { len: usize },
    /// Write bytes to a stream handle.
    Write { data: Vec<u8> },
    /// Accept a connection on a listening handle.
    Accept,
    /// Finish establishing a connection on a handle.
    Connect,
    /// Positioned file read.
    FileRead { offset: u64, len: usize },
    /// Positioned file write.
    FileWrite { offset: u64, data: Vec<u8> },
    /// Flush a file handle to stable storage.
    FileSync,
}

/// An opaque I/O request: a provider-scoped handle plus an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoRequest {
    /// Provider-scoped handle (fd, socket index, simulator channel, ...).
    pub handle: i64,
    /// The operation family.
    pub op: IoOp,
}

/// Completion record pushed by a provider when a request finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The actor blocked on this request.
    pub actor: ActorId,
    /// Result byte count (0 for operations without one).
    pub bytes: usize,
    /// `None` on success; `Closed` when the handle was closed under the
    /// request.
    pub error: Option<RtError>,
}

/// Identifier returned when a provider is registered with the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoProviderId(pub(crate) usize);

/// The four hooks an I/O provider implements, plus an optional waker
/// attachment for threaded providers.
pub trait IoProvider: 'static {
    /// Accept a request on behalf of `actor`. The deadline, when present,
    /// is advisory: the scheduler independently times the wait out and
    /// calls [`IoProvider::cancel`].
    fn submit(
        &mut self,
        request: IoRequest,
        actor: ActorId,
        deadline: Option<Instant>,
    ) -> RtResult<()>;

    /// Hand any finished completions to the scheduler. Called once per
    /// scheduler pass on the scheduler thread.
    fn poll_completions(&mut self, sink: &mut dyn FnMut(Completion));

    /// Abandon the in-flight request for `actor`, if any. The provider
    /// must not deliver a completion for a cancelled request.
    fn cancel(&mut self, actor: ActorId);

    /// Close a handle. Blocked requests on it complete with `Closed`.
    fn close(&mut self, handle: i64);

    /// Receive the scheduler waker so worker threads can interrupt the
    /// idle sleep after pushing to a [`CompletionQueue`]. Single-threaded
    /// providers ignore this.
    fn attach_waker(&mut self, waker: SchedulerWaker) {
        let _ = waker;
    }
}

struct CqInner {
    capacity: usize,
    queue: Mutex<VecDeque<Completion>>,
    waker: SchedulerWaker,
}

/// Bounded multi-producer completion queue drained by the scheduler each
/// pass. Clones share the same queue.
#[derive(Clone)]
pub struct CompletionQueue {
    inner: Arc<CqInner>,
}

impl CompletionQueue {
    pub(crate) fn new(capacity: usize, waker: SchedulerWaker) -> Self {
        Self {
            inner: Arc::new(CqInner {
                capacity,
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                waker,
            }),
        }
    }

    /// Push a completion and wake the scheduler. Fails with `no-memory`
    /// at capacity; the provider should retry after the scheduler drains.
    pub fn push(&self, completion: Completion) -> RtResult<()> {
        {
            let mut queue = self.inner.queue.lock();
            if queue.len() >= self.inner.capacity {
                return Err(RtError::NoMemory);
            }
            queue.push_back(completion);
        }
        self.inner.waker.wake();
        Ok(())
    }

    /// Drain everything queued so far into `sink`.
    pub(crate) fn drain(&self, sink: &mut dyn FnMut(Completion)) {
        let drained: Vec<Completion> = {
            let mut queue = self.inner.queue.lock();
            queue.drain(..).collect()
        };
        for completion in drained {
            sink(completion);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }
}
