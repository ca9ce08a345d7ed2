//! Timer Integration Tests
//!
//! 1. **Ordering** - one-shot timers fire in due order regardless of arm
//!    order (scenario: 30ms, 10ms, 20ms → 10, 20, 30)
//! 2. **Monotonicity** - a one-shot never fires early; a periodic timer's
//!    k-th firing happens at or after k·period
//! 3. **Cancellation** - idempotent, and automatic on owner death

// Layer 1: Standard library imports
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use hearth_rt::prelude::*;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).unwrap()
}

// ============================================================================
// TEST GROUP 1: Ordering (scenario S4)
// ============================================================================

#[test]
fn test_one_shots_fire_in_due_order() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        let t30 = ctx.after(Duration::from_millis(30)).unwrap();
        let t10 = ctx.after(Duration::from_millis(10)).unwrap();
        let t20 = ctx.after(Duration::from_millis(20)).unwrap();

        let mut tags = Vec::new();
        for _ in 0..3 {
            let msg = ctx.recv(Wait::For(Duration::from_secs(1))).await.unwrap();
            assert_eq!(msg.class, MessageClass::Timer);
            assert_eq!(msg.sender, ActorId::RUNTIME);
            tags.push(msg.tag);
        }
        assert_eq!(tags, vec![t10.raw(), t20.raw(), t30.raw()]);
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_one_shot_never_fires_early() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        let armed_at = Instant::now();
        ctx.after(Duration::from_millis(20)).unwrap();
        let msg = ctx.recv(Wait::For(Duration::from_secs(1))).await.unwrap();
        assert_eq!(msg.class, MessageClass::Timer);
        assert!(armed_at.elapsed() >= Duration::from_millis(20));
    })
    .unwrap();
    rt.run();
}

// ============================================================================
// TEST GROUP 2: Periodic timers
// ============================================================================

#[test]
fn test_periodic_fires_repeatedly_with_same_tag() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        let armed_at = Instant::now();
        let period = Duration::from_millis(10);
        let timer = ctx.every(period).unwrap();

        for k in 1..=3u32 {
            let msg = ctx.recv(Wait::For(Duration::from_secs(1))).await.unwrap();
            assert_eq!(msg.class, MessageClass::Timer);
            assert_eq!(msg.tag, timer.raw());
            assert!(armed_at.elapsed() >= period * k);
        }
        ctx.cancel_timer(timer);
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_zero_period_rejected() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        assert!(matches!(
            ctx.every(Duration::ZERO).unwrap_err(),
            RtError::InvalidArgument(_)
        ));
    })
    .unwrap();
    rt.run();
}

// ============================================================================
// TEST GROUP 3: Cancellation
// ============================================================================

#[test]
fn test_cancel_is_idempotent_and_silences_timer() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        let timer = ctx.after(Duration::from_millis(5)).unwrap();
        ctx.cancel_timer(timer);
        ctx.cancel_timer(timer);
        assert_eq!(
            ctx.recv(Wait::millis(20)).await.unwrap_err(),
            RtError::Timeout
        );
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_owner_death_cancels_timers() {
    let config = RuntimeConfig::builder()
        .with_timer_entry_pool_size(1)
        .build()
        .unwrap();
    let rt = Runtime::new(config).unwrap();
    let survived = Rc::new(RefCell::new(false));

    rt.spawn(ActorConfig::new(), |ctx| async move {
        ctx.after(Duration::from_secs(60)).unwrap();
        // Dies with the timer armed.
    })
    .unwrap();

    let flag = Rc::clone(&survived);
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.yield_now().await;
        // The single timer slot was reclaimed when its owner died.
        ctx.after(Duration::from_millis(1)).unwrap();
        let msg = ctx.recv(Wait::For(Duration::from_secs(1))).await.unwrap();
        assert_eq!(msg.class, MessageClass::Timer);
        *flag.borrow_mut() = true;
    })
    .unwrap();

    rt.run();
    assert!(*survived.borrow());
}

#[test]
fn test_timer_pool_exhaustion() {
    let config = RuntimeConfig::builder()
        .with_timer_entry_pool_size(1)
        .build()
        .unwrap();
    let rt = Runtime::new(config).unwrap();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        let held = ctx.after(Duration::from_secs(60)).unwrap();
        assert_eq!(
            ctx.after(Duration::from_secs(60)).unwrap_err(),
            RtError::NoMemory
        );
        ctx.cancel_timer(held);
        assert!(ctx.after(Duration::from_millis(1)).is_ok());
        let _ = ctx.recv(Wait::For(Duration::from_secs(1))).await;
    })
    .unwrap();
    rt.run();
}
