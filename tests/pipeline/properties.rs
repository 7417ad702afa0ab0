use super::pipeline_harness::{CHAT, Harness, ScriptedProvider, incoming, yes};
use chrono::{Duration, Local, TimeZone, Utc};
use replyguard::memory::{Commitment, DispatchAction, MemoryStore, UserUtterance};

#[tokio::test]
async fn own_messages_never_reach_the_model() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.99", "ok"))).await;
    let batch: Vec<_> = (0..5)
        .map(|i| {
            let mut m = incoming(&format!("self-{i}"), "on my way");
            m.is_from_me = true;
            m
        })
        .collect();
    harness.bridge.queue(batch);

    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.received, 5);
    assert_eq!(report.suppressed, 5);
    assert_eq!(harness.provider.calls(), 0);
    assert!(harness.bridge.sent_texts().is_empty());
    let history = harness.store.conversation_window(CHAT, 50).await.unwrap();
    assert_eq!(history.len(), 5);
    let record = harness.store.dispatch_for("self-0").await.unwrap().unwrap();
    assert_eq!(record.action, DispatchAction::Suppressed);
}

#[tokio::test]
async fn low_confidence_is_never_sent() {
    let harness = Harness::new(ScriptedProvider::new("")).await;
    let poller = harness.poller();

    for (i, confidence) in ["0.49", "0.1", "0", "49%", "12"].iter().enumerate() {
        harness.provider.set_response(&yes(confidence, "Sure thing"));
        harness
            .bridge
            .queue(vec![incoming(&format!("m{i}"), "can you grab milk?")]);
        let report = poller.poll_once().await.expect("poll");
        assert_eq!(report.sent, 0, "confidence {confidence} must not send");
        assert_eq!(report.notified, 1);
    }
    assert!(harness.bridge.sent_texts().is_empty());
}

#[tokio::test]
async fn conflict_under_notify_policy_never_sends_the_optimistic_reply() {
    let optimistic = "Yes, see you then!";
    let harness = Harness::new(ScriptedProvider::new(&yes("0.95", optimistic))).await;

    let tomorrow = Local::now().date_naive() + Duration::days(1);
    let start = Local
        .from_local_datetime(&tomorrow.and_hms_opt(15, 0, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc);
    let commitment = Commitment::new("dentist", start, start + Duration::hours(1), vec![]).unwrap();
    harness.store.add_commitment(&commitment).await.unwrap();

    harness
        .bridge
        .queue(vec![incoming("m1", "Are you free at 3pm tomorrow?")]);
    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.notified, 1);
    assert!(!harness.bridge.sent_texts().iter().any(|t| t == optimistic));
    let record = harness.store.dispatch_for("m1").await.unwrap().unwrap();
    assert_eq!(record.action, DispatchAction::Notified);
    assert!(record.reason.contains("dentist"));
}

#[tokio::test]
async fn stored_windows_stay_bounded_and_drop_oldest_first() {
    let harness = Harness::new(ScriptedProvider::new("")).await;

    for i in 0..75 {
        let mut m = incoming(&format!("h{i}"), &format!("message {i}"));
        m.timestamp = 1_760_000_000 + i;
        harness.store.append_message(&m).await.unwrap();
    }
    let window = harness.store.conversation_window(CHAT, 500).await.unwrap();
    assert_eq!(window.len(), 50);
    assert_eq!(window.first().unwrap().body, "message 25");
    assert_eq!(window.last().unwrap().body, "message 74");

    for i in 0..40 {
        harness
            .store
            .append_utterance(&UserUtterance::new(format!("note {i}")))
            .await
            .unwrap();
    }
    let utterances = harness.store.user_utterances(500).await.unwrap();
    assert_eq!(utterances.len(), 30);
    assert_eq!(utterances.first().unwrap().text, "note 10");
    assert_eq!(utterances.last().unwrap().text, "note 39");
}

#[tokio::test]
async fn replayed_batch_sends_at_most_once() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    let batch = vec![incoming("m1", "is the door code still 1234?")];
    harness.bridge.queue(batch.clone());
    harness.bridge.queue(batch);

    let poller = harness.poller();
    let first = poller.poll_once().await.expect("first poll");
    let second = poller.poll_once().await.expect("second poll");

    assert_eq!(first.sent, 1);
    assert_eq!(second.sent, 0);
    assert_eq!(second.suppressed, 1);
    assert_eq!(harness.bridge.sent_texts(), vec!["Sure!".to_string()]);
    assert_eq!(harness.provider.calls(), 1);
}

#[tokio::test]
async fn duplicate_inside_one_batch_sends_once() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    let message = incoming("m1", "is the door code still 1234?");
    harness.bridge.queue(vec![message.clone(), message]);

    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.sent, 1);
    assert_eq!(report.suppressed, 1);
    assert_eq!(harness.bridge.sent_texts().len(), 1);
}
