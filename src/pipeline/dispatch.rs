use super::conflict::ConflictResult;
use super::notify::{Notification, NotificationKind, Notifier, preview};
use super::verdict::Verdict;
use crate::config::ConflictPolicy;
use crate::memory::{
    DispatchAction, DispatchRecord, MemoryStore, PendingReply, RollingWindow,
};
use crate::transport::bridge::{Message, MessagingBridge};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};

/// Sent in place of an optimistic reply that collides with a commitment.
pub const DECLINE_TEXT: &str =
    "Sorry, I can't make it then, I already have something scheduled. I'll get back to you.";

/// Ids remembered in process when the store cannot record claims.
const LOCAL_CLAIM_CAPACITY: usize = 4096;

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub action: DispatchAction,
    pub reason: String,
    pub sent_text: Option<String>,
}

impl DispatchOutcome {
    fn new(action: DispatchAction, reason: impl Into<String>, sent_text: Option<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            sent_text,
        }
    }
}

enum Plan {
    Send { text: String, reason: String },
    Notify { reason: String },
}

/// Turns a verdict and conflict result into exactly one action per message
/// and writes the result back to memory.
pub struct Dispatcher {
    bridge: Arc<dyn MessagingBridge>,
    store: Arc<dyn MemoryStore>,
    notifier: Arc<dyn Notifier>,
    on_conflict: ConflictPolicy,
    local_claims: Mutex<RollingWindow<String>>,
}

impl Dispatcher {
    pub fn new(
        bridge: Arc<dyn MessagingBridge>,
        store: Arc<dyn MemoryStore>,
        notifier: Arc<dyn Notifier>,
        on_conflict: ConflictPolicy,
    ) -> Self {
        Self {
            bridge,
            store,
            notifier,
            on_conflict,
            local_claims: Mutex::new(RollingWindow::new(LOCAL_CLAIM_CAPACITY)),
        }
    }

    /// Whether a message already has a recorded outcome or claim.
    pub async fn already_handled(&self, message_id: &str) -> bool {
        match self.store.dispatch_for(message_id).await {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(e) => tracing::debug!(message_id, "dispatch log unavailable: {e}"),
        }
        self.local_claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&message_id.to_string())
    }

    /// Claim the id; only the first caller proceeds.
    async fn claim(&self, message_id: &str) -> bool {
        let stored = match self.store.claim_dispatch(message_id).await {
            Ok(claimed) => Some(claimed),
            Err(e) => {
                tracing::warn!(message_id, "store claim failed, using in-process claim: {e}");
                None
            }
        };

        let mut local = self
            .local_claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = message_id.to_string();
        let fresh = match stored {
            Some(claimed) => claimed && !local.contains(&id),
            None => !local.contains(&id),
        };
        if fresh {
            local.push(id);
        }
        fresh
    }

    /// The user's own message: stored, never answered.
    pub async fn record_suppressed(&self, message: &Message, reason: &str) -> DispatchOutcome {
        if !self.claim(&message.id).await {
            return DispatchOutcome::new(DispatchAction::Suppressed, "duplicate", None);
        }
        let outcome = DispatchOutcome::new(DispatchAction::Suppressed, reason, None);
        self.record(message, &outcome).await;
        outcome
    }

    pub async fn dispatch(
        &self,
        message: &Message,
        verdict: &Verdict,
        conflict: &ConflictResult,
    ) -> DispatchOutcome {
        if !self.claim(&message.id).await {
            tracing::debug!(message_id = %message.id, "already dispatched; skipping");
            return DispatchOutcome::new(DispatchAction::Suppressed, "duplicate", None);
        }

        let outcome = match self.plan(verdict, conflict) {
            Plan::Notify { reason } => self.hold(message, verdict, reason).await,
            Plan::Send { text, reason } => self.send(message, verdict, text, reason).await,
        };

        self.record(message, &outcome).await;
        outcome
    }

    fn plan(&self, verdict: &Verdict, conflict: &ConflictResult) -> Plan {
        if !verdict.should_send {
            return Plan::Notify {
                reason: verdict.reasoning.clone(),
            };
        }

        if conflict.has_conflict {
            let with = conflict
                .conflicting_commitment
                .as_ref()
                .map_or_else(|| "a commitment".to_string(), |c| format!("\"{}\"", c.description));
            return match self.on_conflict {
                ConflictPolicy::Decline => Plan::Send {
                    text: DECLINE_TEXT.to_string(),
                    reason: format!("declined: conflicts with {with}"),
                },
                ConflictPolicy::Notify => Plan::Notify {
                    reason: format!("conflicts with {with}"),
                },
            };
        }

        match verdict.reply_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Plan::Send {
                text: text.to_string(),
                reason: verdict.reasoning.clone(),
            },
            _ => Plan::Notify {
                reason: "no reply text proposed".into(),
            },
        }
    }

    async fn send(
        &self,
        message: &Message,
        verdict: &Verdict,
        text: String,
        reason: String,
    ) -> DispatchOutcome {
        if !self.bridge.is_ready().await {
            tracing::warn!(message_id = %message.id, "bridge not ready; holding reply for the user");
            return self
                .hold(message, verdict, "bridge not ready to send".into())
                .await;
        }

        if let Err(e) = self.bridge.send_message(&message.chat_id, &text).await {
            tracing::warn!(message_id = %message.id, "auto-reply send failed: {e}");
            self.notify(message, NotificationKind::SendFailed, &e.to_string(), verdict);
            return self.hold(message, verdict, format!("send failed: {e}")).await;
        }

        tracing::info!(
            message_id = %message.id,
            chat_id = %message.chat_id,
            "auto-reply sent"
        );
        self.write_back_sent(message, &text).await;
        self.notify(message, NotificationKind::AutoReplied, &reason, verdict);
        DispatchOutcome::new(DispatchAction::Sent, reason, Some(text))
    }

    async fn hold(&self, message: &Message, verdict: &Verdict, reason: String) -> DispatchOutcome {
        let pending = PendingReply {
            message_id: message.id.clone(),
            chat_id: message.chat_id.clone(),
            chat_name: message.chat_name.clone(),
            sender_name: message.sender_name.clone(),
            body: message.body.clone(),
            summary: verdict.summary.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.add_pending_reply(&pending).await {
            tracing::warn!(message_id = %message.id, "could not record pending reply: {e}");
        }
        self.notify(message, NotificationKind::NeedsAttention, &reason, verdict);
        DispatchOutcome::new(DispatchAction::Notified, reason, None)
    }

    async fn write_back_sent(&self, message: &Message, text: &str) {
        let own = Message {
            id: format!("{}-reply", message.id),
            chat_id: message.chat_id.clone(),
            chat_name: message.chat_name.clone(),
            sender_name: "Me".into(),
            body: text.to_string(),
            timestamp: Utc::now().timestamp(),
            is_from_me: true,
            is_group: message.is_group,
            has_media: false,
        };
        if let Err(e) = self.store.append_message(&own).await {
            tracing::warn!(message_id = %message.id, "could not store sent reply: {e}");
        }
        if let Err(e) = self.store.resolve_pending_replies(&message.chat_id).await {
            tracing::warn!(chat_id = %message.chat_id, "could not resolve pending replies: {e}");
        }
    }

    async fn record(&self, message: &Message, outcome: &DispatchOutcome) {
        let record = DispatchRecord {
            message_id: message.id.clone(),
            chat_id: message.chat_id.clone(),
            action: outcome.action,
            reason: outcome.reason.clone(),
            sent_text: outcome.sent_text.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.store.record_dispatch(&record).await {
            tracing::warn!(message_id = %message.id, "could not record dispatch: {e}");
        }
    }

    fn notify(&self, message: &Message, kind: NotificationKind, reason: &str, verdict: &Verdict) {
        self.notifier.notify(&Notification {
            kind,
            message_id: message.id.clone(),
            chat_id: message.chat_id.clone(),
            chat_name: message.chat_name.clone(),
            sender_name: message.sender_name.clone(),
            preview: preview(&message.body),
            reason: reason.to_string(),
            summary: verdict.summary.clone(),
            speak_aloud: verdict.speak_aloud,
        });
    }
}
