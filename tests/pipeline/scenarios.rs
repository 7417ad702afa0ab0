use super::pipeline_harness::{CHAT, Harness, ScriptedProvider, incoming, yes};
use chrono::{Duration, Local, TimeZone, Utc};
use replyguard::Config;
use replyguard::config::ConflictPolicy;
use replyguard::memory::{Commitment, DispatchAction, MemoryStore};
use replyguard::pipeline::{DECLINE_TEXT, NotificationKind};
use std::time::Duration as StdDuration;

fn tomorrow_at(hour: u32) -> chrono::DateTime<Utc> {
    let day = Local::now().date_naive() + Duration::days(1);
    Local
        .from_local_datetime(&day.and_hms_opt(hour, 0, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn unknown_sender_confident_yes_is_sent() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    let message = incoming("m1", "Can you send me the wifi password later?");

    let outcome = harness
        .poller()
        .process_message(&message)
        .await
        .expect("process");

    assert_eq!(outcome.action, DispatchAction::Sent);
    assert_eq!(outcome.sent_text.as_deref(), Some("Sure!"));
    assert_eq!(
        harness.bridge.sent.lock().unwrap().as_slice(),
        &[(CHAT.to_string(), "Sure!".to_string())]
    );

    let history = harness.store.conversation_window(CHAT, 50).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[1].is_from_me);
    assert_eq!(history[1].body, "Sure!");

    let prompt = harness.provider.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("Relationship with sender: unknown"));
}

#[tokio::test]
async fn classifier_timeout_notifies_the_user() {
    let provider = ScriptedProvider::slow(&yes("0.99", "Sure!"), StdDuration::from_secs(5));
    let harness = Harness::new(provider).await;
    harness.bridge.queue(vec![incoming("m1", "dinner at 7?")]);

    let report = harness
        .poller_with_timeout(StdDuration::from_millis(50))
        .poll_once()
        .await
        .expect("poll");

    assert_eq!(report.notified, 1);
    assert!(harness.bridge.sent_texts().is_empty());
    let record = harness.store.dispatch_for("m1").await.unwrap().unwrap();
    assert_eq!(record.action, DispatchAction::Notified);
    assert!(record.reason.contains("timed out"));
    let pending = harness.store.latest_pending_reply(None).await.unwrap().unwrap();
    assert_eq!(pending.message_id, "m1");
}

#[tokio::test]
async fn decline_policy_replaces_the_optimistic_reply() {
    let mut config = Config::default();
    config.pipeline.on_conflict = ConflictPolicy::Decline;
    let harness =
        Harness::with_config(config, ScriptedProvider::new(&yes("0.95", "Yes, see you then!"))).await;
    let start = tomorrow_at(15);
    harness
        .store
        .add_commitment(&Commitment::new("dentist", start, start + Duration::hours(1), vec![]).unwrap())
        .await
        .unwrap();

    harness
        .bridge
        .queue(vec![incoming("m1", "Are you free at 3pm tomorrow?")]);
    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.sent, 1);
    assert_eq!(harness.bridge.sent_texts(), vec![DECLINE_TEXT.to_string()]);
}

#[tokio::test]
async fn free_slot_is_answered() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.95", "Yes, see you then!"))).await;
    let start = tomorrow_at(15);
    harness
        .store
        .add_commitment(&Commitment::new("dentist", start, start + Duration::hours(1), vec![]).unwrap())
        .await
        .unwrap();

    harness
        .bridge
        .queue(vec![incoming("m1", "Are you free at 5pm tomorrow?")]);
    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn close_contact_needs_more_confidence() {
    let mut config = Config::default();
    config.contacts.close = vec!["Sam".into()];
    let harness = Harness::with_config(config, ScriptedProvider::new(&yes("0.7", "love you too"))).await;
    harness.bridge.queue(vec![incoming("m1", "love you")]);

    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.notified, 1);
    assert!(harness.bridge.sent_texts().is_empty());
}

#[tokio::test]
async fn unaddressed_group_message_skips_the_model() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.99", "me!"))).await;
    let mut message = incoming("g1", "who is bringing snacks?");
    message.chat_id = "120363000000@g.us".into();
    harness.bridge.queue(vec![message]);

    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.notified, 1);
    assert_eq!(harness.provider.calls(), 0);
}

#[tokio::test]
async fn send_failure_is_surfaced() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    harness
        .bridge
        .fail_send
        .store(true, std::sync::atomic::Ordering::SeqCst);
    harness.bridge.queue(vec![incoming("m1", "still on for tomorrow?")]);

    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.notified, 1);
    let kinds: Vec<_> = harness
        .notifier
        .notifications
        .lock()
        .unwrap()
        .iter()
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&NotificationKind::SendFailed));
}

#[tokio::test]
async fn malformed_message_is_contained() {
    let harness = Harness::new(ScriptedProvider::new(&yes("0.9", "Sure!"))).await;
    harness
        .bridge
        .queue(vec![incoming("", "no id"), incoming("m2", "still on?")]);

    let report = harness.poller().poll_once().await.expect("poll");

    assert_eq!(report.received, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 1);
    let notes = harness.notifier.notifications.lock().unwrap();
    assert!(notes.iter().any(|n| n.kind == NotificationKind::ProcessingFailed));
}

#[tokio::test]
async fn poll_error_is_reported() {
    let harness = Harness::new(ScriptedProvider::new("")).await;
    harness
        .bridge
        .fail_poll
        .store(true, std::sync::atomic::Ordering::SeqCst);
    assert!(harness.poller().poll_once().await.is_err());
}

#[tokio::test]
async fn user_notes_reach_the_prompt() {
    let harness = Harness::new(ScriptedProvider::new("SHOULD_SEND=NO\nCONFIDENCE=0.9")).await;
    harness
        .store
        .append_utterance(&replyguard::memory::UserUtterance::new("I'm at the gym until 8"))
        .await
        .unwrap();
    harness.bridge.queue(vec![incoming("m1", "can you call me?")]);

    harness.poller().poll_once().await.expect("poll");

    let prompt = harness.provider.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("I'm at the gym until 8"));
}
