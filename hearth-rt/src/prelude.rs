//! Prelude module for convenient imports.
//!
//! Re-exports the types most programs need:
//!
//! ```rust
//! use hearth_rt::prelude::*;
//! ```

pub use crate::actor::{Actor, ActorConfig, ActorContext, ExitReason, Priority, Wait};
pub use crate::bus::BusConfig;
pub use crate::io::{Completion, CompletionQueue, IoOp, IoProvider, IoProviderId, IoRequest};
pub use crate::message::{MatchFilter, Message, MessageClass};
pub use crate::select::{SelectEvent, SelectResult, SelectSource};
pub use crate::supervisor::{ChildSpec, RestartPolicy, Strategy, SupervisorSpec};
pub use crate::system::{RtError, RtResult, Runtime, RuntimeConfig};
pub use crate::util::{ActorId, BusId, MonitorRef, TimerId};
