use super::verdict::{strip_code_fences, strip_quotes};
use crate::config::Config;
use crate::llm::Provider;
use crate::memory::{DispatchAction, DispatchRecord, MemoryStore, PendingReply};
use crate::transport::bridge::{Message, MessagingBridge};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::sync::Arc;

const REWRITE_PROMPT: &str = "You turn the user's quick, casual answer into the WhatsApp message \
they would actually send. Keep their meaning and tone, keep it short, and write in the first \
person as the user. Output only the message text, without quotes or commentary.";

/// The reply that went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualReplyOutcome {
    pub pending: PendingReply,
    pub sent_text: String,
}

/// Answers the most recent message the user was notified about.
pub struct ManualReply {
    bridge: Arc<dyn MessagingBridge>,
    store: Arc<dyn MemoryStore>,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl ManualReply {
    pub fn new(
        config: &Config,
        bridge: Arc<dyn MessagingBridge>,
        store: Arc<dyn MemoryStore>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            bridge,
            store,
            provider,
            model: config.default_model.clone(),
            temperature: config.default_temperature,
        }
    }

    /// `chat_id` restricts the lookup to one conversation.
    pub async fn reply(&self, text: &str, chat_id: Option<&str>) -> Result<ManualReplyOutcome> {
        let text = text.trim();
        if text.is_empty() {
            bail!("reply text is empty");
        }

        let Some(pending) = self
            .store
            .latest_pending_reply(chat_id)
            .await
            .context("Failed to load pending reply")?
        else {
            bail!("no message is waiting for a reply");
        };

        let sent_text = self.rewrite(&pending, text).await?;

        self.bridge
            .send_message(&pending.chat_id, &sent_text)
            .await
            .with_context(|| format!("Failed to send reply to {}", pending.chat_name))?;
        tracing::info!(
            chat_id = %pending.chat_id,
            message_id = %pending.message_id,
            "manual reply sent"
        );

        self.write_back(&pending, &sent_text).await?;
        Ok(ManualReplyOutcome { pending, sent_text })
    }

    async fn rewrite(&self, pending: &PendingReply, casual: &str) -> Result<String> {
        let prompt = format!(
            "{} wrote:\n{}\n\nMy answer: {casual}",
            pending.sender_name,
            pending.body.trim()
        );
        let raw = self
            .provider
            .chat_with_system(Some(REWRITE_PROMPT), &prompt, &self.model, self.temperature)
            .await
            .context("Failed to rewrite reply")?;

        let rewritten = clean_rewrite(&raw);
        if rewritten.is_empty() {
            tracing::debug!("rewrite came back empty; sending the answer as typed");
            return Ok(casual.to_string());
        }
        Ok(rewritten)
    }

    async fn write_back(&self, pending: &PendingReply, text: &str) -> Result<()> {
        let own = Message {
            id: format!("{}-manual", pending.message_id),
            chat_id: pending.chat_id.clone(),
            chat_name: pending.chat_name.clone(),
            sender_name: "Me".into(),
            body: text.to_string(),
            timestamp: Utc::now().timestamp(),
            is_from_me: true,
            is_group: false,
            has_media: false,
        };
        self.store
            .append_message(&own)
            .await
            .context("Failed to store sent reply")?;
        self.store
            .resolve_pending_replies(&pending.chat_id)
            .await
            .context("Failed to resolve pending reply")?;
        self.store
            .record_dispatch(&DispatchRecord {
                message_id: pending.message_id.clone(),
                chat_id: pending.chat_id.clone(),
                action: DispatchAction::Sent,
                reason: "manual reply".into(),
                sent_text: Some(text.to_string()),
                recorded_at: Utc::now(),
            })
            .await
            .context("Failed to record manual reply")?;
        Ok(())
    }
}

fn clean_rewrite(raw: &str) -> String {
    strip_quotes(strip_code_fences(raw)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_cleanup_strips_wrappers() {
        assert_eq!(clean_rewrite("\"Sounds great, see you!\""), "Sounds great, see you!");
        assert_eq!(clean_rewrite("```\nOn my way\n```"), "On my way");
        assert_eq!(clean_rewrite("'ok'"), "ok");
        assert_eq!(clean_rewrite("  plain  "), "plain");
        assert_eq!(clean_rewrite("\"\""), "");
    }
}
