//! The object-safe actor behavior trait.
//!
//! Most actors are spawned from plain async closures via
//! [`Runtime::spawn`](crate::system::Runtime::spawn); the trait form exists
//! for call sites that need a boxed, re-creatable behavior. Supervisor
//! child factories in particular must produce a fresh instance on every
//! restart.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::context::ActorContext;

/// A boxed actor behavior.
///
/// Returning from `run` terminates the actor with reason `normal`; a panic
/// terminates it with reason `crash`. All blocking happens through the
/// context's primitives.
///
/// # Examples
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use hearth_rt::prelude::*;
///
/// struct Echo;
///
/// #[async_trait(?Send)]
/// impl Actor for Echo {
///     async fn run(self: Box<Self>, ctx: ActorContext) {
///         while let Ok(msg) = ctx.recv(Wait::Forever).await {
///             let _ = ctx.notify(msg.sender, msg.tag, &msg.data);
///         }
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait Actor: 'static {
    /// The actor body. Runs on the scheduler thread; suspends only at the
    /// context's blocking primitives.
    async fn run(self: Box<Self>, ctx: ActorContext);
}
