use super::conflict::{ConflictChecker, ConflictResult};
use super::context::ContextAssembler;
use super::decision::DecisionEngine;
use super::dispatch::{DispatchOutcome, Dispatcher};
use super::notify::{Notification, NotificationKind, Notifier, preview};
use crate::config::Config;
use crate::error::{RelayError, TransportError};
use crate::llm::Provider;
use crate::memory::{DispatchAction, MemoryStore};
use crate::transport::bridge::{Message, MessagingBridge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Interval between readiness probes while waiting for the bridge.
const READY_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Counts for one drained batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub received: usize,
    pub sent: usize,
    pub notified: usize,
    pub suppressed: usize,
    pub failed: usize,
}

impl PollReport {
    fn count(&mut self, action: DispatchAction) {
        match action {
            DispatchAction::Sent => self.sent += 1,
            DispatchAction::Notified => self.notified += 1,
            DispatchAction::Suppressed => self.suppressed += 1,
        }
    }
}

/// Pulls new messages from the bridge and drives each one through the
/// pipeline, one at a time, in arrival order.
pub struct BridgePoller {
    bridge: Arc<dyn MessagingBridge>,
    store: Arc<dyn MemoryStore>,
    assembler: ContextAssembler,
    engine: DecisionEngine,
    checker: ConflictChecker,
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
    policy: String,
    interval: Duration,
    error_backoff: Duration,
    ready_wait: Duration,
}

impl BridgePoller {
    pub fn new(
        config: &Config,
        policy: String,
        bridge: Arc<dyn MessagingBridge>,
        store: Arc<dyn MemoryStore>,
        provider: Arc<dyn Provider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let assembler = ContextAssembler::new(
            Arc::clone(&store),
            config.pipeline.clone(),
            config.contacts.clone(),
        )
        .with_bridge(Arc::clone(&bridge));
        let dispatcher = Dispatcher::new(
            Arc::clone(&bridge),
            Arc::clone(&store),
            Arc::clone(&notifier),
            config.pipeline.on_conflict,
        );

        Self {
            assembler,
            engine: DecisionEngine::new(provider, config),
            checker: ConflictChecker::new(config.pipeline.default_event_minutes),
            dispatcher,
            bridge,
            store,
            notifier,
            policy,
            interval: Duration::from_secs(config.bridge.poll_interval_secs.max(1)),
            error_backoff: Duration::from_secs(config.bridge.error_backoff_secs.max(1)),
            ready_wait: Duration::from_secs(config.bridge.ready_wait_secs),
        }
    }

    /// Replace the decision engine, e.g. to shorten the classifier timeout.
    pub fn with_engine(mut self, engine: DecisionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Poll until `shutdown` flips to `true`. A batch in progress always
    /// finishes before the signal is looked at.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if !self.wait_until_ready(&mut shutdown).await {
            return;
        }
        tracing::info!(interval_secs = self.interval.as_secs(), "bridge poller started");

        loop {
            let pause = match self.poll_once().await {
                Ok(report) => {
                    if report.received > 0 {
                        tracing::info!(
                            received = report.received,
                            sent = report.sent,
                            notified = report.notified,
                            suppressed = report.suppressed,
                            failed = report.failed,
                            "batch processed"
                        );
                    }
                    self.interval
                }
                Err(e) => {
                    tracing::warn!(
                        backoff_secs = self.error_backoff.as_secs(),
                        "polling bridge failed: {e}"
                    );
                    self.error_backoff
                }
            };

            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("bridge poller stopped");
    }

    /// Returns `false` only when shutdown was requested while waiting.
    async fn wait_until_ready(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let deadline = tokio::time::Instant::now() + self.ready_wait;
        loop {
            if *shutdown.borrow() {
                return false;
            }
            match self.bridge.status().await {
                Ok(status) if status.ready => return true,
                Ok(status) if status.needs_qr => {
                    tracing::warn!("bridge is waiting for QR pairing");
                }
                Ok(_) => tracing::debug!("bridge not ready yet"),
                Err(e) => tracing::debug!("bridge status unavailable: {e}"),
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    waited_secs = self.ready_wait.as_secs(),
                    "bridge still not ready; polling anyway"
                );
                return true;
            }

            tokio::select! {
                () = tokio::time::sleep(READY_PROBE_INTERVAL) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return false;
                    }
                }
            }
        }
    }

    /// Fetch one batch and process every message in it.
    pub async fn poll_once(&self) -> Result<PollReport, TransportError> {
        let batch = self.bridge.new_messages().await?;
        let mut report = PollReport {
            received: batch.len(),
            ..PollReport::default()
        };

        for message in batch {
            let message = message.normalized();
            match self.process_message(&message).await {
                Ok(outcome) => report.count(outcome.action),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(message_id = %message.id, "message processing failed: {e}");
                    self.notifier.notify(&Notification {
                        kind: NotificationKind::ProcessingFailed,
                        message_id: message.id.clone(),
                        chat_id: message.chat_id.clone(),
                        chat_name: message.chat_name.clone(),
                        sender_name: message.sender_name.clone(),
                        preview: preview(&message.body),
                        reason: e.to_string(),
                        summary: None,
                        speak_aloud: false,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Run one message through assembly, decision, conflict check and dispatch.
    pub async fn process_message(&self, message: &Message) -> Result<DispatchOutcome, RelayError> {
        if message.id.trim().is_empty() || message.chat_id.trim().is_empty() {
            return Err(anyhow::anyhow!("message is missing its id or chat id").into());
        }

        if self.dispatcher.already_handled(&message.id).await {
            tracing::debug!(message_id = %message.id, "replayed message; skipping");
            return Ok(DispatchOutcome {
                action: DispatchAction::Suppressed,
                reason: "duplicate".into(),
                sent_text: None,
            });
        }

        if message.is_from_me {
            self.remember(message).await;
            return Ok(self.dispatcher.record_suppressed(message, "own message").await);
        }

        let bundle = self.assembler.assemble(message).await;
        self.remember(message).await;

        let verdict = self.engine.decide(message, &bundle, &self.policy).await;
        let conflict = if verdict.should_send {
            self.checker
                .check(message, verdict.reply_text.as_deref(), &bundle)
        } else {
            ConflictResult::default()
        };

        Ok(self.dispatcher.dispatch(message, &verdict, &conflict).await)
    }

    async fn remember(&self, message: &Message) {
        if let Err(e) = self.store.append_message(message).await {
            tracing::warn!(message_id = %message.id, "could not store incoming message: {e}");
        }
    }
}
