//! Lifecycle Integration Tests
//!
//! 1. **Links** - symmetric exit notification, one-hop propagation only
//! 2. **Monitors** - asymmetric, reference-keyed, demonitor silences
//! 3. **Cleanup completeness** - a dead actor's name, timers, bus
//!    subscriptions, sync counterparties, and slot are all reclaimed

// Layer 1: Standard library imports
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use hearth_rt::prelude::*;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).unwrap()
}

// ============================================================================
// TEST GROUP 1: Links
// ============================================================================

#[test]
fn test_link_is_symmetric() {
    let rt = runtime();
    let notified = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&notified);
    let a = rt
        .spawn(ActorConfig::new(), move |ctx| async move {
            let msg = ctx.recv(Wait::Forever).await.unwrap();
            assert_eq!(msg.class, MessageClass::LinkExit);
            log.borrow_mut().push("a-heard");
        })
        .unwrap();

    rt.spawn(ActorConfig::new(), move |ctx| async move {
        // The link is created by B, but A still hears about B's death.
        ctx.link(a).unwrap();
    })
    .unwrap();

    rt.run();
    assert_eq!(*notified.borrow(), vec!["a-heard"]);
}

#[test]
fn test_unlink_silences_exit_notification() {
    let rt = runtime();
    let peer = rt
        .spawn(ActorConfig::new(), |ctx| async move {
            let _ = ctx.recv_match(MatchFilter::any().with_tag(7), Wait::Forever).await;
        })
        .unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.link(peer).unwrap();
        ctx.unlink(peer).unwrap();
        ctx.kill(peer).unwrap();
        assert_eq!(
            ctx.recv(Wait::millis(10)).await.unwrap_err(),
            RtError::Timeout
        );
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_link_exit_propagates_one_hop_only() {
    let rt = runtime();
    let c_outcome = Rc::new(RefCell::new(None));

    // Chain A - B - C; killing A must notify B but leave C untouched.
    let outcome = Rc::clone(&c_outcome);
    let c = rt
        .spawn(ActorConfig::new(), move |ctx| async move {
            let result = ctx.recv(Wait::millis(30)).await;
            *outcome.borrow_mut() = Some(result.map(|m| m.class));
        })
        .unwrap();

    let b = rt
        .spawn(ActorConfig::new(), move |ctx| async move {
            ctx.link(c).unwrap();
            let msg = ctx.recv(Wait::Forever).await.unwrap();
            assert_eq!(msg.class, MessageClass::LinkExit);
            // B interprets the exit and chooses to keep running; C must
            // not hear anything from this.
            ctx.sleep(Duration::from_millis(40)).await;
            ctx.unlink(c).unwrap();
        })
        .unwrap();

    let a = rt
        .spawn(ActorConfig::new(), move |ctx| async move {
            ctx.link(b).unwrap();
            let _ = ctx.recv(Wait::Forever).await;
        })
        .unwrap();

    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.yield_now().await;
        ctx.kill(a).unwrap();
    })
    .unwrap();

    rt.run();
    // C saw only its own receive timeout, never a LinkExit.
    assert_eq!(*c_outcome.borrow(), Some(Err(RtError::Timeout)));
}

#[test]
fn test_self_link_rejected() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        assert!(matches!(
            ctx.link(ctx.self_id()).unwrap_err(),
            RtError::InvalidArgument(_)
        ));
    })
    .unwrap();
    rt.run();
}

// ============================================================================
// TEST GROUP 2: Monitors
// ============================================================================

#[test]
fn test_monitor_notifies_watcher_only() {
    let rt = runtime();
    let target = rt
        .spawn(ActorConfig::new(), |ctx| async move {
            // The target never learns it is being watched: its mailbox
            // stays empty until the stop message.
            let msg = ctx.recv(Wait::Forever).await.unwrap();
            assert_eq!(msg.tag, 1);
        })
        .unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let _reference = ctx.monitor(target).unwrap();
        ctx.notify(target, 1, &[]).unwrap();
        let down = ctx.recv(Wait::Forever).await.unwrap();
        assert_eq!(down.class, MessageClass::MonitorDown);
        assert_eq!(down.sender, target);
        assert_eq!(ExitReason::from_code(down.tag), ExitReason::Normal);
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_demonitor_silences_down_notification() {
    let rt = runtime();
    let target = rt
        .spawn(ActorConfig::new(), |ctx| async move {
            let _ = ctx.recv(Wait::Forever).await;
        })
        .unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let reference = ctx.monitor(target).unwrap();
        ctx.demonitor(reference).unwrap();
        // Demonitor twice is an error: the reference is gone.
        assert_eq!(ctx.demonitor(reference).unwrap_err(), RtError::NotFound);
        ctx.kill(target).unwrap();
        assert_eq!(
            ctx.recv(Wait::millis(10)).await.unwrap_err(),
            RtError::Timeout
        );
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_two_monitors_two_notifications() {
    let rt = runtime();
    let target = rt
        .spawn(ActorConfig::new(), |ctx| async move {
            let _ = ctx.recv(Wait::Forever).await;
        })
        .unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        let r1 = ctx.monitor(target).unwrap();
        let r2 = ctx.monitor(target).unwrap();
        assert_ne!(r1, r2);
        ctx.kill(target).unwrap();
        let first = ctx.recv(Wait::Forever).await.unwrap();
        let second = ctx.recv(Wait::Forever).await.unwrap();
        assert_eq!(first.class, MessageClass::MonitorDown);
        assert_eq!(second.class, MessageClass::MonitorDown);
    })
    .unwrap();
    rt.run();
}

// ============================================================================
// TEST GROUP 3: Cleanup completeness
// ============================================================================

#[test]
fn test_death_reclaims_every_resource() {
    let config = RuntimeConfig::builder()
        .with_max_actors(4)
        .build()
        .unwrap();
    let rt = Runtime::new(config).unwrap();
    let bus = rt.bus_create(BusConfig::new(1, 8)).unwrap();

    let doomed = rt
        .spawn(ActorConfig::new().with_name("doomed"), move |ctx| async move {
            ctx.bus_subscribe(bus).unwrap();
            ctx.after(Duration::from_secs(60)).unwrap();
            let _ = ctx.recv_match(MatchFilter::any().with_tag(42), Wait::Forever).await;
        })
        .unwrap();

    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.yield_now().await;
        // A sync message parks us against the doomed receiver.
        let result = ctx.send_sync(doomed, 0, b"held", Wait::Forever).await;
        assert_eq!(result.unwrap_err(), RtError::Closed);

        // Name gone, subscription gone, slot reusable.
        assert_eq!(ctx.whereis("doomed").unwrap_err(), RtError::NotFound);
        ctx.bus_publish(bus, &[1]).unwrap();
        ctx.bus_publish(bus, &[2]).unwrap();
        let reused = ctx
            .spawn(ActorConfig::new().with_name("doomed"), |_ctx| async {})
            .unwrap();
        assert_ne!(reused, doomed);
    })
    .unwrap();

    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.sleep(Duration::from_millis(5)).await;
        ctx.kill(doomed).unwrap();
    })
    .unwrap();

    rt.run();
    rt.bus_destroy(bus).unwrap();
}

#[test]
fn test_spawn_fails_when_actor_table_full() {
    let config = RuntimeConfig::builder().with_max_actors(1).build().unwrap();
    let rt = Runtime::new(config).unwrap();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        assert_eq!(
            ctx.spawn(ActorConfig::new(), |_ctx| async {}).unwrap_err(),
            RtError::NoMemory
        );
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_duplicate_name_rejected_at_spawn() {
    let rt = runtime();
    rt.spawn(ActorConfig::new().with_name("singleton"), |ctx| async move {
        assert_eq!(
            ctx.spawn(ActorConfig::new().with_name("singleton"), |_ctx| async {})
                .unwrap_err(),
            RtError::Exists
        );
    })
    .unwrap();
    rt.run();
}
