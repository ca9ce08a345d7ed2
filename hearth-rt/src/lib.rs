//! # hearth-rt - Embeddable Cooperative Actor Runtime
//!
//! Isolated lightweight actors communicating purely by message passing,
//! scheduled cooperatively on a single OS thread. Built for hosts that
//! need deterministic, pool-bounded concurrency: no work stealing, no
//! hidden allocation on the messaging path, and every blocking primitive
//! returns a status instead of unwinding.
//!
//! # Quick Start
//!
//! ```rust
//! use hearth_rt::prelude::*;
//!
//! let rt = Runtime::new(RuntimeConfig::default()).unwrap();
//!
//! let echo = rt
//!     .spawn(ActorConfig::new(), |ctx| async move {
//!         while let Ok(msg) = ctx.recv(Wait::Forever).await {
//!             if ctx.reply(&msg, &msg.data).is_err() {
//!                 break;
//!             }
//!         }
//!     })
//!     .unwrap();
//!
//! rt.spawn(ActorConfig::new(), move |ctx| async move {
//!     let reply = ctx.request(echo, b"ping", Wait::Forever).await.unwrap();
//!     assert_eq!(reply.data, b"ping");
//!     let _ = ctx.kill(echo);
//! })
//! .unwrap();
//!
//! rt.run();
//! ```
//!
//! # Core Features
//!
//! ## Cooperative scheduling
//! - Four strict priority classes, round-robin within a class
//! - Suspension only at explicit primitives; no implicit preemption
//! - `run` for ownership of the thread, `step` for embedding in a foreign
//!   event loop
//!
//! ## Pool-bounded messaging
//! - Mailboxes over a fixed entry pool with selective receive
//! - Tag-correlated request/reply
//! - Synchronous sends with real backpressure (sender blocks until
//!   release)
//! - Exhaustion is the recoverable `no-memory` status, never an abort
//!
//! ## Publish/subscribe buses
//! - Bounded rings with per-subscriber cursors
//! - Age- and consume-based reclamation policies
//! - Blocking reads and multi-source [`select`](actor::ActorContext::select)
//!
//! ## Fault tolerance
//! - Links (symmetric) and monitors (asymmetric) with exit-reason
//!   propagation
//! - Timers delivered as messages, cancelled with their owner
//! - Supervisors with one-for-one / one-for-all / rest-for-one strategies
//!   and a restart intensity window
//!
//! # Module Organization
//!
//! - [`actor`] - Priorities, contexts, the behavior trait, spawn config
//! - [`message`] - Message model, filters, fixed pools
//! - [`mailbox`] - FIFO queues with selective receive
//! - [`bus`] - Publish/subscribe rings
//! - [`timer`] - Due-time ordered timers
//! - [`select`] - Multi-source wait
//! - [`watch`] - Links and monitors
//! - [`io`] - The I/O provider contract
//! - [`supervisor`] - Supervision strategies
//! - [`system`] - Configuration, status codes, the [`Runtime`] facade
//! - [`util`] - Identifier types

pub mod actor;
pub mod bus;
pub mod io;
pub mod mailbox;
pub mod message;
pub mod prelude;
pub mod select;
pub mod supervisor;
pub mod system;
pub mod timer;
pub mod util;
pub mod watch;

// Re-export commonly used types
pub use actor::{Actor, ActorConfig, ActorContext, ExitReason, Priority, Wait};
pub use bus::BusConfig;
pub use io::{Completion, CompletionQueue, IoOp, IoProvider, IoProviderId, IoRequest};
pub use message::{MatchFilter, Message, MessageClass};
pub use select::{SelectEvent, SelectResult, SelectSource};
pub use supervisor::{ChildSpec, RestartPolicy, Strategy, SupervisorSpec};
pub use system::{RtError, RtResult, Runtime, RuntimeConfig, SchedulerWaker};
pub use util::{ActorId, BusId, MonitorRef, TimerId};
