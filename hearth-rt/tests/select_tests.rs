//! Select Integration Tests
//!
//! Multi-source waits over mailbox filters and buses: first-ready
//! resolution, index tie-breaking, and deadline semantics.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use hearth_rt::prelude::*;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).unwrap()
}

#[test]
fn test_select_resolves_on_mailbox_message() {
    let rt = runtime();
    let bus = rt.bus_create(BusConfig::new(4, 8)).unwrap();
    let waiter = rt
        .spawn(ActorConfig::new(), move |ctx| async move {
            ctx.bus_subscribe(bus).unwrap();
            let result = ctx
                .select(
                    vec![
                        SelectSource::Mailbox(MatchFilter::any()),
                        SelectSource::Bus(bus),
                    ],
                    Wait::Forever,
                )
                .await
                .unwrap();
            assert_eq!(result.index, 0);
            assert_eq!(result.event, SelectEvent::MailboxReady);
            // The message is still queued for a normal receive.
            let msg = ctx.recv(Wait::NoWait).await.unwrap();
            assert_eq!(msg.tag, 5);
            ctx.bus_unsubscribe(bus).unwrap();
        })
        .unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.sleep(Duration::from_millis(5)).await;
        ctx.notify(waiter, 5, &[]).unwrap();
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_select_resolves_on_bus_publish_and_advances_cursor() {
    let rt = runtime();
    let bus = rt.bus_create(BusConfig::new(4, 8)).unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.bus_subscribe(bus).unwrap();
        let sources = vec![
            SelectSource::Mailbox(MatchFilter::any()),
            SelectSource::Bus(bus),
        ];
        ctx.bus_publish(bus, &[9]).unwrap();
        let result = ctx.select(sources, Wait::Forever).await.unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.event, SelectEvent::BusEntry(vec![9]));
        // The entry was consumed for this subscriber.
        assert_eq!(ctx.bus_read(bus).unwrap_err(), RtError::WouldBlock);
        ctx.bus_unsubscribe(bus).unwrap();
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_select_tie_broken_by_array_index() {
    let rt = runtime();
    let bus = rt.bus_create(BusConfig::new(4, 8)).unwrap();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.bus_subscribe(bus).unwrap();
        // Both sources ready before the select call.
        ctx.bus_publish(bus, &[1]).unwrap();
        ctx.notify(ctx.self_id(), 2, &[]).unwrap();

        let bus_first = ctx
            .select(
                vec![
                    SelectSource::Bus(bus),
                    SelectSource::Mailbox(MatchFilter::any()),
                ],
                Wait::NoWait,
            )
            .await
            .unwrap();
        assert_eq!(bus_first.index, 0);

        let mailbox_first = ctx
            .select(
                vec![
                    SelectSource::Mailbox(MatchFilter::any()),
                    SelectSource::Bus(bus),
                ],
                Wait::NoWait,
            )
            .await
            .unwrap();
        assert_eq!(mailbox_first.index, 0);
        assert_eq!(mailbox_first.event, SelectEvent::MailboxReady);
        ctx.bus_unsubscribe(bus).unwrap();
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_select_filter_ignores_non_matching_messages() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), move |ctx| async move {
        ctx.notify(ctx.self_id(), 1, &[]).unwrap();
        let err = ctx
            .select(
                vec![SelectSource::Mailbox(MatchFilter::any().with_tag(2))],
                Wait::millis(5),
            )
            .await
            .unwrap_err();
        assert_eq!(err, RtError::Timeout);
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_select_timeout_and_nowait() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        let sources = vec![SelectSource::Mailbox(MatchFilter::any())];
        assert_eq!(
            ctx.select(sources.clone(), Wait::NoWait).await.unwrap_err(),
            RtError::WouldBlock
        );
        assert_eq!(
            ctx.select(sources, Wait::millis(5)).await.unwrap_err(),
            RtError::Timeout
        );
    })
    .unwrap();
    rt.run();
}

#[test]
fn test_empty_select_rejected() {
    let rt = runtime();
    rt.spawn(ActorConfig::new(), |ctx| async move {
        assert!(matches!(
            ctx.select(Vec::new(), Wait::Forever).await.unwrap_err(),
            RtError::InvalidArgument(_)
        ));
    })
    .unwrap();
    rt.run();
}
