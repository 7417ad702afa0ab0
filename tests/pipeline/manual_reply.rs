use super::pipeline_harness::{CHAT, Harness, ScriptedProvider, incoming};
use replyguard::memory::{DispatchAction, MemoryStore};
use replyguard::pipeline::ManualReply;

#[tokio::test]
async fn manual_reply_rewrites_sends_and_resolves() {
    let harness = Harness::new(ScriptedProvider::new(
        "SHOULD_SEND=NO\nCONFIDENCE=0.9\nREASONING=needs the user\nSUMMARY=Sam asks about dinner",
    ))
    .await;
    harness
        .bridge
        .queue(vec![incoming("m1", "want to grab dinner friday?")]);
    let report = harness.poller().poll_once().await.expect("poll");
    assert_eq!(report.notified, 1);

    let pending = harness.store.latest_pending_reply(None).await.unwrap().unwrap();
    assert_eq!(pending.summary.as_deref(), Some("Sam asks about dinner"));

    harness
        .provider
        .set_response("\"Friday works! What time were you thinking?\"");
    let reply = ManualReply::new(
        &harness.config,
        harness.bridge.clone(),
        harness.store.clone(),
        harness.provider.clone(),
    );
    let outcome = reply.reply("ya friday good, when", None).await.expect("reply");

    assert_eq!(outcome.sent_text, "Friday works! What time were you thinking?");
    assert_eq!(outcome.pending.message_id, "m1");
    assert_eq!(
        harness.bridge.sent.lock().unwrap().as_slice(),
        &[(CHAT.to_string(), outcome.sent_text.clone())]
    );
    let last_prompt = harness.provider.prompts.lock().unwrap().last().cloned().unwrap();
    assert!(last_prompt.contains("ya friday good, when"));
    assert!(last_prompt.contains("want to grab dinner friday?"));

    assert!(harness.store.latest_pending_reply(None).await.unwrap().is_none());
    let record = harness.store.dispatch_for("m1").await.unwrap().unwrap();
    assert_eq!(record.action, DispatchAction::Sent);
    assert_eq!(record.reason, "manual reply");
    let history = harness.store.conversation_window(CHAT, 50).await.unwrap();
    assert!(history.last().unwrap().is_from_me);
}

#[tokio::test]
async fn manual_reply_without_pending_message_fails() {
    let harness = Harness::new(ScriptedProvider::new("ok")).await;
    let reply = ManualReply::new(
        &harness.config,
        harness.bridge.clone(),
        harness.store.clone(),
        harness.provider.clone(),
    );
    let err = reply.reply("sure", None).await.unwrap_err();
    assert!(err.to_string().contains("no message is waiting"));
    assert!(harness.bridge.sent_texts().is_empty());
}

#[tokio::test]
async fn manual_reply_send_failure_keeps_message_pending() {
    let harness = Harness::new(ScriptedProvider::new("SHOULD_SEND=NO\nCONFIDENCE=0.9")).await;
    harness.bridge.queue(vec![incoming("m1", "call me?")]);
    harness.poller().poll_once().await.expect("poll");

    harness.provider.set_response("Calling you in 5");
    harness
        .bridge
        .fail_send
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let reply = ManualReply::new(
        &harness.config,
        harness.bridge.clone(),
        harness.store.clone(),
        harness.provider.clone(),
    );
    assert!(reply.reply("calling in 5", None).await.is_err());
    assert!(harness.store.latest_pending_reply(None).await.unwrap().is_some());
}
