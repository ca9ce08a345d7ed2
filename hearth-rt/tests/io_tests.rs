//! I/O Provider Integration Tests
//!
//! Exercises the provider contract end to end with test doubles:
//!
//! 1. **Pull path** - completions surfaced through `poll_completions`
//! 2. **Push path** - a worker thread pushing into the `CompletionQueue`
//!    and interrupting the idle sleep
//! 3. **Deadlines** - timed-out requests are cancelled at the provider
//! 4. **Closed handles** - blocked requests fail with `closed`

// Layer 1: Standard library imports
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use hearth_rt::prelude::*;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).unwrap()
}

#[derive(Default)]
struct EchoState {
    pending: Vec<(ActorId, usize)>,
    cancelled: Vec<ActorId>,
}

/// Completes every request on the next scheduler pass with the request's
/// nominal byte count.
struct EchoProvider {
    state: Rc<RefCell<EchoState>>,
}

impl IoProvider for EchoProvider {
    fn submit(
        &mut self,
        request: IoRequest,
        actor: ActorId,
        _deadline: Option<Instant>,
    ) -> RtResult<()> {
        let bytes = match request.op {
            IoOp::Read { len } | IoOp::FileRead { len, .. } => len,
            IoOp::Write { ref data } | IoOp::FileWrite { ref data, .. } => data.len(),
            IoOp::Accept | IoOp::Connect | IoOp::FileSync => 0,
        };
        self.state.borrow_mut().pending.push((actor, bytes));
        Ok(())
    }

    fn poll_completions(&mut self, sink: &mut dyn FnMut(Completion)) {
        for (actor, bytes) in self.state.borrow_mut().pending.drain(..) {
            sink(Completion {
                actor,
                bytes,
                error: None,
            });
        }
    }

    fn cancel(&mut self, actor: ActorId) {
        let mut state = self.state.borrow_mut();
        state.pending.retain(|(a, _)| *a != actor);
        state.cancelled.push(actor);
    }

    fn close(&mut self, _handle: i64) {}
}

/// Accepts requests and never completes them.
struct BlackHoleProvider {
    state: Rc<RefCell<EchoState>>,
}

impl IoProvider for BlackHoleProvider {
    fn submit(
        &mut self,
        _request: IoRequest,
        actor: ActorId,
        _deadline: Option<Instant>,
    ) -> RtResult<()> {
        self.state.borrow_mut().pending.push((actor, 0));
        Ok(())
    }

    fn poll_completions(&mut self, _sink: &mut dyn FnMut(Completion)) {}

    fn cancel(&mut self, actor: ActorId) {
        self.state.borrow_mut().cancelled.push(actor);
    }

    fn close(&mut self, _handle: i64) {}
}

/// Completes each request from a worker thread via the completion queue.
struct ThreadedProvider {
    queue: CompletionQueue,
    delay: Duration,
}

impl IoProvider for ThreadedProvider {
    fn submit(
        &mut self,
        request: IoRequest,
        actor: ActorId,
        _deadline: Option<Instant>,
    ) -> RtResult<()> {
        let bytes = match request.op {
            IoOp::Read { len } => len,
            _ => 0,
        };
        let queue = self.queue.clone();
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = queue.push(Completion {
                actor,
                bytes,
                error: None,
            });
        });
        Ok(())
    }

    fn poll_completions(&mut self, _sink: &mut dyn FnMut(Completion)) {}

    fn cancel(&mut self, _actor: ActorId) {}

    fn close(&mut self, _handle: i64) {}
}

/// Reports every request's handle as closed, from a worker thread.
struct ClosedProvider {
    queue: CompletionQueue,
}

impl IoProvider for ClosedProvider {
    fn submit(
        &mut self,
        _request: IoRequest,
        actor: ActorId,
        _deadline: Option<Instant>,
    ) -> RtResult<()> {
        let queue = self.queue.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            let _ = queue.push(Completion {
                actor,
                bytes: 0,
                error: Some(RtError::Closed),
            });
        });
        Ok(())
    }

    fn poll_completions(&mut self, _sink: &mut dyn FnMut(Completion)) {}

    fn cancel(&mut self, _actor: ActorId) {}

    fn close(&mut self, _handle: i64) {}
}

// ============================================================================
// TEST GROUP 1: Pull path
// ============================================================================

#[test]
fn test_io_wait_round_trip() {
    let rt = runtime();
    let state = Rc::new(RefCell::new(EchoState::default()));
    let provider = rt.register_io_provider(Box::new(EchoProvider {
        state: Rc::clone(&state),
    }));
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let bytes = ctx
            .io_wait(
                provider,
                IoRequest {
                    handle: 3,
                    op: IoOp::Read { len: 128 },
                },
                Wait::Forever,
            )
            .await
            .unwrap();
        assert_eq!(bytes, 128);
    })
    .unwrap();
    rt.run();
    assert!(state.borrow().pending.is_empty());
}

#[test]
fn test_io_write_reports_payload_length() {
    let rt = runtime();
    let state = Rc::new(RefCell::new(EchoState::default()));
    let provider = rt.register_io_provider(Box::new(EchoProvider {
        state: Rc::clone(&state),
    }));
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let bytes = ctx
            .io_wait(
                provider,
                IoRequest {
                    handle: 3,
                    op: IoOp::Write {
                        data: b"hello".to_vec(),
                    },
                },
                Wait::Forever,
            )
            .await
            .unwrap();
        assert_eq!(bytes, 5);
    })
    .unwrap();
    rt.run();
}

// ============================================================================
// TEST GROUP 2: Push path (worker thread)
// ============================================================================

#[test]
fn test_threaded_provider_wakes_idle_scheduler() {
    let rt = runtime();
    let provider = rt.register_io_provider(Box::new(ThreadedProvider {
        queue: rt.completion_queue(),
        delay: Duration::from_millis(20),
    }));
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let started = Instant::now();
        let bytes = ctx
            .io_wait(
                provider,
                IoRequest {
                    handle: 1,
                    op: IoOp::Read { len: 7 },
                },
                Wait::Forever,
            )
            .await
            .unwrap();
        assert_eq!(bytes, 7);
        assert!(started.elapsed() >= Duration::from_millis(20));
    })
    .unwrap();
    rt.run();
}

// ============================================================================
// TEST GROUP 3: Deadlines and closed handles
// ============================================================================

#[test]
fn test_io_timeout_cancels_at_provider() {
    let rt = runtime();
    let state = Rc::new(RefCell::new(EchoState::default()));
    let provider = rt.register_io_provider(Box::new(BlackHoleProvider {
        state: Rc::clone(&state),
    }));
    let actor = rt
        .spawn(ActorConfig::new(), move |ctx| async move {
            let err = ctx
                .io_wait(
                    provider,
                    IoRequest {
                        handle: 1,
                        op: IoOp::Accept,
                    },
                    Wait::millis(10),
                )
                .await
                .unwrap_err();
            assert_eq!(err, RtError::Timeout);
        })
        .unwrap();
    rt.run();
    assert_eq!(state.borrow().cancelled, vec![actor]);
}

#[test]
fn test_closed_handle_surfaces_closed_status() {
    let rt = runtime();
    let provider = rt.register_io_provider(Box::new(ClosedProvider {
        queue: rt.completion_queue(),
    }));
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let err = ctx
            .io_wait(
                provider,
                IoRequest {
                    handle: 9,
                    op: IoOp::Connect,
                },
                Wait::Forever,
            )
            .await
            .unwrap_err();
        assert_eq!(err, RtError::Closed);
    })
    .unwrap();
    rt.run();
}
