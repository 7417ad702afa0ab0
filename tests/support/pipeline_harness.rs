#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use replyguard::Config;
use replyguard::error::TransportError;
use replyguard::llm::Provider;
use replyguard::llm::traits::ProviderFuture;
use replyguard::memory::{SqliteMemoryStore, StoreLimits};
use replyguard::pipeline::{BridgePoller, DecisionEngine, Notification, Notifier};
use replyguard::transport::bridge::{
    BridgeFuture, BridgeStatus, ChatSummary, ContactMatch, Message, MessagingBridge,
};

pub const POLICY: &str = "Reply only to simple logistics questions.";
pub const CHAT: &str = "15550001111@c.us";

/// In-memory bridge: each `new_messages` call pops one queued batch.
#[derive(Default)]
pub struct FakeBridge {
    batches: Mutex<VecDeque<Vec<Message>>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub not_ready: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_poll: AtomicBool,
    pub polls: AtomicUsize,
}

impl FakeBridge {
    pub fn queue(&self, batch: Vec<Message>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

impl MessagingBridge for FakeBridge {
    fn status<'a>(&'a self) -> BridgeFuture<'a, BridgeStatus> {
        Box::pin(async move {
            let ready = !self.not_ready.load(Ordering::SeqCst);
            Ok(BridgeStatus {
                ready,
                needs_qr: !ready,
            })
        })
    }

    fn new_messages<'a>(&'a self) -> BridgeFuture<'a, Vec<Message>> {
        Box::pin(async move {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_poll.load(Ordering::SeqCst) {
                return Err(TransportError::Request {
                    endpoint: "messages/new".into(),
                    message: "connection refused".into(),
                });
            }
            Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
        })
    }

    fn send_message<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BridgeFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(TransportError::Rejected {
                    endpoint: "messages/send".into(),
                    status: 500,
                    message: "client crashed".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        })
    }

    fn chats<'a>(&'a self) -> BridgeFuture<'a, Vec<ChatSummary>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn chat_messages<'a>(&'a self, _chat_id: &'a str, _limit: usize) -> BridgeFuture<'a, Vec<Message>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn search_contacts<'a>(&'a self, _query: &'a str) -> BridgeFuture<'a, Vec<ContactMatch>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Model stand-in: answers every request with the same text, optionally late.
pub struct ScriptedProvider {
    response: Mutex<String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(response: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response.to_string()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_response(&self, response: &str) {
        *self.response.lock().unwrap() = response.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn chat_with_system<'a>(
        &'a self,
        _system_prompt: Option<&'a str>,
        message: &'a str,
        _model: &'a str,
        _temperature: f64,
    ) -> ProviderFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(message.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.response.lock().unwrap().clone())
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, notification: &Notification) {
        self.notifications.lock().unwrap().push(notification.clone());
    }
}

pub struct Harness {
    pub config: Config,
    pub bridge: Arc<FakeBridge>,
    pub store: Arc<SqliteMemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self::with_config(Config::default(), provider).await
    }

    pub async fn with_config(config: Config, provider: Arc<ScriptedProvider>) -> Self {
        let store = SqliteMemoryStore::in_memory(StoreLimits::default())
            .await
            .expect("in-memory store");
        Self {
            config,
            bridge: Arc::new(FakeBridge::default()),
            store: Arc::new(store),
            provider,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn poller(&self) -> BridgePoller {
        BridgePoller::new(
            &self.config,
            POLICY.to_string(),
            self.bridge.clone(),
            self.store.clone(),
            self.provider.clone(),
            self.notifier.clone(),
        )
    }

    pub fn poller_with_timeout(&self, timeout: Duration) -> BridgePoller {
        let engine = DecisionEngine::new(self.provider.clone(), &self.config).with_timeout(timeout);
        self.poller().with_engine(engine)
    }
}

pub fn incoming(id: &str, body: &str) -> Message {
    Message {
        id: id.to_string(),
        chat_id: CHAT.to_string(),
        chat_name: "Sam".to_string(),
        sender_name: "Sam".to_string(),
        body: body.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        is_from_me: false,
        is_group: false,
        has_media: false,
    }
}

pub fn yes(confidence: &str, reply: &str) -> String {
    format!("SHOULD_SEND=YES\nCONFIDENCE={confidence}\nREPLY={reply}\nREASONING=simple question")
}
