//! Round trips against a real Redis server.
//!
//! Run with `PAPERBOY_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_test::assert_ok;

use paperboy::{Listener, Paperboy, PaperboyConfig, PushOptions, Purpose};

fn live() -> Paperboy {
    let url = std::env::var("PAPERBOY_REDIS_URL").unwrap_or_else(|_| {
        panic!("PAPERBOY_REDIS_URL must be set for live tests");
    });
    assert_ok!(Paperboy::connect(&PaperboyConfig::new(url, "live-test")))
}

#[tokio::test]
#[ignore = "requires a Redis server"]
async fn data_round_trip() {
    let paperboy = live();
    let key = "paperboy:live:data";

    assert_ok!(paperboy.push(key, "Hello World!", PushOptions::new()).await);
    assert_eq!(
        assert_ok!(paperboy.pull(key).await).as_deref(),
        Some("Hello World!")
    );
    assert_eq!(assert_ok!(paperboy.remove(key).await), 1);
    assert_eq!(assert_ok!(paperboy.pull(key).await), None);
    assert_eq!(paperboy.pool_status(Purpose::Data).created, 1);
}

#[tokio::test]
#[ignore = "requires a Redis server"]
async fn expiring_push() {
    let paperboy = live();
    let key = "paperboy:live:expiring";

    assert_ok!(
        paperboy
            .push(key, "soon gone", PushOptions::expire_in_seconds(1))
            .await
    );
    assert!(assert_ok!(paperboy.pull(key).await).is_some());
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(assert_ok!(paperboy.pull(key).await), None);
}

#[tokio::test]
#[ignore = "requires a Redis server"]
async fn event_round_trip() {
    let paperboy = live();
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let listener = Listener::new(move |payload| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(payload.to_string());
        }
    });

    assert_ok!(paperboy.once("paperboy-live-event", &listener).await);
    assert_ok!(paperboy.trigger("paperboy-live-event", "Hello World!").await);

    let received = assert_ok!(tokio::time::timeout(Duration::from_secs(5), rx).await);
    assert_eq!(assert_ok!(received), "Hello World!");
    assert_eq!(paperboy.listener_count("paperboy-live-event"), 0);
}
