use super::relation::RelationTier;
use crate::config::{ContactsConfig, PipelineConfig};
use crate::error::StoreError;
use crate::memory::{Commitment, MemoryStore, RollingWindow, UserUtterance};
use crate::transport::bridge::{Message, MessagingBridge};
use chrono::{DateTime, Datelike, Duration, Local, Utc, Weekday};
use std::sync::Arc;

/// Everything the decision engine sees besides the message itself.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub conversation: RollingWindow<Message>,
    pub user_utterances: RollingWindow<UserUtterance>,
    pub current_time: DateTime<Local>,
    pub day_of_week: Weekday,
    pub relevant_commitments: Vec<Commitment>,
    pub relation_tier: RelationTier,
    /// Set when the memory store could not be read.
    pub degraded: bool,
}

impl ContextBundle {
    fn empty(now: DateTime<Local>, config: &PipelineConfig, tier: RelationTier) -> Self {
        Self {
            conversation: RollingWindow::new(config.conversation_window),
            user_utterances: RollingWindow::new(config.user_window),
            current_time: now,
            day_of_week: now.weekday(),
            relevant_commitments: Vec::new(),
            relation_tier: tier,
            degraded: false,
        }
    }
}

pub struct ContextAssembler {
    store: Arc<dyn MemoryStore>,
    bridge: Option<Arc<dyn MessagingBridge>>,
    config: PipelineConfig,
    contacts: ContactsConfig,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn MemoryStore>, config: PipelineConfig, contacts: ContactsConfig) -> Self {
        Self {
            store,
            bridge: None,
            config,
            contacts,
        }
    }

    /// Used to backfill an empty conversation window when enabled.
    pub fn with_bridge(mut self, bridge: Arc<dyn MessagingBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub async fn assemble(&self, message: &Message) -> ContextBundle {
        self.assemble_at(message, Local::now()).await
    }

    /// Never fails: a store error yields a degraded, empty bundle.
    pub async fn assemble_at(&self, message: &Message, now: DateTime<Local>) -> ContextBundle {
        match self.load(message, now).await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(
                    chat_id = %message.chat_id,
                    message_id = %message.id,
                    "memory store unavailable, continuing with degraded context: {e}"
                );
                let tier = RelationTier::classify(message, &self.contacts, false);
                let mut bundle = ContextBundle::empty(now, &self.config, tier);
                bundle.degraded = true;
                bundle
            }
        }
    }

    async fn load(&self, message: &Message, now: DateTime<Local>) -> Result<ContextBundle, StoreError> {
        let mut history = self
            .store
            .conversation_window(&message.chat_id, self.config.conversation_window)
            .await?;
        history.retain(|m| m.id != message.id);

        if history.is_empty() && self.config.backfill_history {
            history = self.backfill(message).await;
        }

        let utterances = self.store.user_utterances(self.config.user_window).await?;

        let horizon_start = now.with_timezone(&Utc);
        let horizon_end = Duration::try_hours(self.config.lookahead_hours.max(0))
            .and_then(|ahead| horizon_start.checked_add_signed(ahead));
        if horizon_end.is_none() {
            tracing::warn!(
                lookahead_hours = self.config.lookahead_hours,
                "lookahead out of range; only referenced commitments are considered"
            );
        }
        let relevant_commitments = self
            .store
            .list_commitments()
            .await?
            .into_iter()
            .filter(|c| {
                horizon_end.is_some_and(|end| c.overlaps(horizon_start, end)) || is_referenced(c, message)
            })
            .collect();

        let tier = RelationTier::classify(message, &self.contacts, !history.is_empty());
        Ok(ContextBundle {
            conversation: RollingWindow::from_chronological(self.config.conversation_window, history),
            user_utterances: RollingWindow::from_chronological(self.config.user_window, utterances),
            relevant_commitments,
            ..ContextBundle::empty(now, &self.config, tier)
        })
    }

    async fn backfill(&self, message: &Message) -> Vec<Message> {
        let Some(bridge) = &self.bridge else {
            return Vec::new();
        };
        match bridge
            .chat_messages(&message.chat_id, self.config.conversation_window)
            .await
        {
            Ok(mut fetched) => {
                fetched.retain(|m| m.id != message.id);
                tracing::debug!(
                    chat_id = %message.chat_id,
                    count = fetched.len(),
                    "backfilled conversation window from bridge"
                );
                for earlier in &fetched {
                    if let Err(e) = self.store.append_message(earlier).await {
                        tracing::debug!("could not persist backfilled message: {e}");
                        break;
                    }
                }
                fetched
            }
            Err(e) => {
                tracing::debug!(chat_id = %message.chat_id, "history backfill failed: {e}");
                Vec::new()
            }
        }
    }
}

/// A commitment is referenced when the message names one of its
/// participants or its description, or comes from a participant.
fn is_referenced(commitment: &Commitment, message: &Message) -> bool {
    let body = message.body.to_lowercase();
    let sender = message.sender_name.trim().to_lowercase();
    let description = commitment.description.trim().to_lowercase();

    if !description.is_empty() && body.contains(&description) {
        return true;
    }
    commitment.participants.iter().any(|p| {
        let p = p.trim().to_lowercase();
        !p.is_empty() && (body.contains(&p) || p == sender)
    })
}
