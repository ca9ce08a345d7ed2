//! Strategy-driven supervision.
//!
//! A supervisor is an ordinary actor: it spawns and links its children in
//! declared order, then loops on `LinkExit` messages. A child death is
//! mapped through its restart policy and the supervisor's strategy into a
//! restart cycle; cycles are counted against the intensity window, and
//! tripping the bound invokes the shutdown hook, terminates the remaining
//! children in reverse order, and exits the supervisor.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

// Layer 2: Third-party crate imports
use tracing::{debug, error, warn};

// Layer 3: Internal module imports
use crate::actor::context::{spawn_with, ActorContext};
use crate::actor::{ActorConfig, ExitReason, Wait};
use crate::message::MessageClass;
use crate::system::errors::RtResult;
use crate::system::scheduler::CoreHandle;
use crate::util::ActorId;

pub mod spec;
pub mod strategy;

pub use spec::{
    ChildSpec, RestartPolicy, Strategy, SupervisorSpec, DEFAULT_MAX_RESTARTS,
    DEFAULT_RESTART_PERIOD,
};
pub use strategy::should_restart;

/// Reserved tag of the runtime-sender control notify that asks a
/// supervisor to stop.
pub(crate) const STOP_TAG: u32 = u32::MAX;

/// Spawn a supervisor actor for `spec`.
pub(crate) fn start(core: &CoreHandle, spec: SupervisorSpec) -> RtResult<ActorId> {
    spawn_with(core, ActorConfig::new(), move |ctx| supervise(ctx, spec))
}

/// Deliver the stop notification to a supervisor.
pub(crate) fn stop(core: &CoreHandle, id: ActorId) -> RtResult<()> {
    core.borrow_mut()
        .send_message(ActorId::RUNTIME, id, MessageClass::Notify, STOP_TAG, &[])
}

struct ChildSlot {
    spec: ChildSpec,
    id: Option<ActorId>,
}

/// Spawn one child incarnation and link it to the supervisor.
fn start_child(ctx: &ActorContext, spec: &ChildSpec) -> RtResult<ActorId> {
    let factory = Rc::clone(&spec.factory);
    let id = ctx.spawn(spec.spawn_config(), move |child_ctx| (factory)().run(child_ctx))?;
    if let Err(e) = ctx.link(id) {
        let _ = ctx.kill(id);
        return Err(e);
    }
    Ok(id)
}

/// Terminate every live child in reverse start order.
fn stop_children(ctx: &ActorContext, children: &mut [ChildSlot]) {
    for slot in children.iter_mut().rev() {
        if let Some(id) = slot.id.take() {
            let _ = ctx.kill(id);
        }
    }
}

async fn supervise(ctx: ActorContext, spec: SupervisorSpec) {
    let SupervisorSpec {
        strategy,
        max_restarts,
        restart_period,
        children,
        mut shutdown_hook,
    } = spec;
    let mut children: Vec<ChildSlot> = children
        .into_iter()
        .map(|spec| ChildSlot { spec, id: None })
        .collect();

    // Initial start, declared order. A failure here aborts the whole
    // supervisor: already-started children are torn down in reverse.
    for index in 0..children.len() {
        match start_child(&ctx, &children[index].spec) {
            Ok(id) => children[index].id = Some(id),
            Err(e) => {
                error!(child = %children[index].spec.name, error = %e, "supervisor start failed");
                stop_children(&ctx, &mut children);
                return;
            }
        }
    }

    let mut ledger: VecDeque<Instant> = VecDeque::new();
    loop {
        let Ok(msg) = ctx.recv(Wait::Forever).await else {
            return;
        };
        if msg.class == MessageClass::Notify
            && msg.sender == ActorId::RUNTIME
            && msg.tag == STOP_TAG
        {
            stop_children(&ctx, &mut children);
            return;
        }
        if msg.class != MessageClass::LinkExit {
            continue;
        }
        let Some(position) = children.iter().position(|c| c.id == Some(msg.sender)) else {
            // A child we already terminated ourselves; its id was retired.
            continue;
        };
        children[position].id = None;

        // A failed restart is treated as a crash of that child and fed
        // back through the same decision path; the intensity ledger bounds
        // the loop.
        let mut pending = Some((position, ExitReason::from_code(msg.tag)));
        while let Some((failed, reason)) = pending.take() {
            if !should_restart(children[failed].spec.restart, reason) {
                debug!(
                    child = %children[failed].spec.name,
                    reason = %reason,
                    "child exit absorbed without restart"
                );
                break;
            }
            let range = strategy::restart_range(strategy, failed, children.len());
            debug!(
                child = %children[failed].spec.name,
                reason = %reason,
                strategy = ?strategy,
                "restarting children"
            );

            // Terminate the cycle's survivors in reverse start order.
            for index in range.clone().rev() {
                if let Some(id) = children[index].id.take() {
                    let _ = ctx.kill(id);
                }
            }
            // Restart in forward start order.
            for index in range {
                match start_child(&ctx, &children[index].spec) {
                    Ok(id) => children[index].id = Some(id),
                    Err(e) => {
                        warn!(
                            child = %children[index].spec.name,
                            error = %e,
                            "child restart failed"
                        );
                        pending = Some((index, ExitReason::Crash));
                        break;
                    }
                }
            }

            // One ledger entry per restart cycle, pruned to the window.
            let now = Instant::now();
            ledger.push_back(now);
            while ledger
                .front()
                .is_some_and(|t| now.duration_since(*t) > restart_period)
            {
                ledger.pop_front();
            }
            if ledger.len() >= max_restarts as usize {
                warn!(restarts = ledger.len(), "restart intensity exceeded; shutting down");
                if let Some(hook) = shutdown_hook.as_mut() {
                    hook();
                }
                stop_children(&ctx, &mut children);
                return;
            }
        }
    }
}
