//! End-to-end reconnect sequences on the tokio timer with paused time.

#![cfg(feature = "async-tokio")]

mod harness;

use std::time::Duration;

use harness::{MockFactory, URL, init_tracing};
use rsws_reconnect::{
    Builder, CloseCode, Event, EventKind, ReadyState, ReconnectConfig, TokioTimer,
};
use tokio::task::LocalSet;

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_backoff() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let factory = MockFactory::new();
            let socket = Builder::new(URL)
                .build(factory.clone(), TokioTimer::new())
                .unwrap();
            let mut events = socket.events();

            factory.socket(0).open();
            factory.socket(0).close(1006, "");

            assert!(matches!(events.next().await, Some(Event::Open(_))));
            assert!(matches!(events.next().await, Some(Event::Close(c)) if !c.is_final));
            match events.next().await {
                Some(Event::Reconnect(r)) => {
                    assert_eq!(r.attempt, 1);
                    assert_eq!(r.delay, Duration::from_secs(1));
                }
                other => panic!("expected reconnect, got {other:?}"),
            }
            assert!(socket.is_reconnect_pending());

            tokio::time::sleep(Duration::from_millis(999)).await;
            assert_eq!(factory.created(), 1);

            tokio::time::sleep(Duration::from_millis(2)).await;
            assert_eq!(factory.created(), 2);
            assert!(!socket.is_reconnect_pending());

            factory.socket(1).open();
            match events.next().await {
                Some(Event::Open(open)) => assert_eq!(open.attempts, 1),
                other => panic!("expected open, got {other:?}"),
            }
            assert_eq!(socket.ready_state(), ReadyState::Open);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_close_aborts_timer() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let factory = MockFactory::new();
            let socket = Builder::new(URL)
                .build(factory.clone(), TokioTimer::new())
                .unwrap();

            factory.socket(0).close(1006, "");
            assert!(socket.is_reconnect_pending());
            socket.close(CloseCode::Normal, "").unwrap();

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(factory.created(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_delay_hint_on_tokio_timer() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let factory = MockFactory::new();
            let socket = Builder::new(URL)
                .build(factory.clone(), TokioTimer::new())
                .unwrap();
            let mut reconnects = socket.events_of(&[EventKind::Reconnect]);

            factory.socket(0).close(1001, "maintenance delay=3");
            match reconnects.try_next() {
                Some(Event::Reconnect(r)) => assert_eq!(r.delay, Duration::from_secs(3)),
                other => panic!("expected reconnect, got {other:?}"),
            }

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(factory.created(), 1);
            tokio::time::sleep(Duration::from_millis(1001)).await;
            assert_eq!(factory.created(), 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_loop_to_exhaustion() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let factory = MockFactory::new();
            let socket = Builder::new(URL)
                .config(ReconnectConfig::default().with_max_attempts(2u32))
                .build(factory.clone(), TokioTimer::new())
                .unwrap();
            let mut closes = socket.events_of(&[EventKind::Close]);

            factory.socket(0).close(1006, "");
            tokio::time::sleep(Duration::from_secs(2)).await;
            factory.socket(1).close(1006, "");
            tokio::time::sleep(Duration::from_secs(3)).await;
            factory.socket(2).close(1006, "");

            let first = closes.try_next();
            let last = closes.try_next();
            assert!(matches!(first, Some(Event::Close(c)) if !c.is_final));
            assert!(matches!(last, Some(Event::Close(c)) if c.is_final));
            assert_eq!(closes.try_next(), None);
            assert!(!socket.is_reconnect_pending());
        })
        .await;
}

#[tokio::test]
async fn test_stream_ends_when_socket_dropped() {
    init_tracing();
    use futures::StreamExt;

    LocalSet::new()
        .run_until(async {
            let factory = MockFactory::new();
            let socket = Builder::new(URL)
                .build(factory.clone(), TokioTimer::new())
                .unwrap();
            let mut events = socket.events();

            factory.socket(0).open();
            drop(socket);

            assert!(matches!(StreamExt::next(&mut events).await, Some(Event::Open(_))));
            assert_eq!(StreamExt::next(&mut events).await, None);
        })
        .await;
}
