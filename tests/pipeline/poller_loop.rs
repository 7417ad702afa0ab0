use super::pipeline_harness::{Harness, ScriptedProvider, incoming, yes};
use replyguard::Config;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.bridge.poll_interval_secs = 1;
    config.bridge.error_backoff_secs = 1;
    config.bridge.ready_wait_secs = 60;
    config
}

#[tokio::test]
async fn run_processes_batches_until_shutdown() {
    let harness = Harness::with_config(fast_config(), ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    harness.bridge.queue(vec![incoming("m1", "still on?")]);

    let poller = Arc::new(harness.poller());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn({
        let poller = Arc::clone(&poller);
        async move { poller.run(rx).await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.bridge.sent_texts().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("reply sent while running");

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller stops after shutdown")
        .unwrap();
    assert_eq!(harness.bridge.sent_texts(), vec!["Sure!".to_string()]);
}

#[tokio::test]
async fn shutdown_while_waiting_for_pairing_skips_polling() {
    let harness = Harness::with_config(fast_config(), ScriptedProvider::new("")).await;
    harness.bridge.not_ready.store(true, Ordering::SeqCst);

    let poller = Arc::new(harness.poller());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn({
        let poller = Arc::clone(&poller);
        async move { poller.run(rx).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller stops while waiting")
        .unwrap();
    assert_eq!(harness.bridge.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn poll_errors_back_off_and_recover() {
    let harness = Harness::with_config(fast_config(), ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    harness.bridge.fail_poll.store(true, Ordering::SeqCst);
    harness.bridge.queue(vec![incoming("m1", "still on?")]);

    let poller = Arc::new(harness.poller());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn({
        let poller = Arc::clone(&poller);
        async move { poller.run(rx).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.bridge.polls.load(Ordering::SeqCst) >= 1);
    harness.bridge.fail_poll.store(false, Ordering::SeqCst);

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.bridge.sent_texts().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("recovered after backoff");

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller stops")
        .unwrap();
}
