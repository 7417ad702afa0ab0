use super::context::ContextBundle;
use super::verdict::{RESPONSE_CONTRACT, Verdict, parse_verdict};
use crate::config::{Config, ContactsConfig};
use crate::error::ClassifierError;
use crate::llm::{Provider, sanitize_api_error};
use crate::transport::bridge::Message;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

/// Lowest confidence floor the engine accepts, whatever the configuration says.
pub const MIN_CONFIDENCE_FLOOR: f64 = 0.5;

pub struct DecisionEngine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    timeout: Duration,
    confidence_floor: f64,
    user_context_max_age_secs: i64,
    contacts: ContactsConfig,
}

impl DecisionEngine {
    pub fn new(provider: Arc<dyn Provider>, config: &Config) -> Self {
        Self {
            provider,
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            timeout: Duration::from_secs(config.pipeline.classifier_timeout_secs.max(1)),
            confidence_floor: config.pipeline.confidence_floor.max(MIN_CONFIDENCE_FLOOR),
            user_context_max_age_secs: config.pipeline.user_context_max_age_secs,
            contacts: config.contacts.clone(),
        }
    }

    /// Override the classifier timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Messages the model never sees.
    pub fn local_rule(&self, message: &Message) -> Option<&'static str> {
        if message.is_from_me {
            Some("own message")
        } else if message.is_blank() {
            Some("no text body (media only)")
        } else if message.is_group && !self.addresses_user(&message.body) {
            Some("group message not addressed to the user")
        } else {
            None
        }
    }

    /// A group message counts as addressed when it names one of the user's
    /// aliases as a whole word, with or without a leading `@`.
    fn addresses_user(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.contacts
            .user_aliases
            .iter()
            .map(|alias| alias.trim().trim_start_matches('@').to_lowercase())
            .filter(|alias| !alias.is_empty())
            .any(|alias| contains_word(&body, &alias))
    }

    pub async fn decide(&self, message: &Message, bundle: &ContextBundle, policy: &str) -> Verdict {
        if let Some(rule) = self.local_rule(message) {
            tracing::debug!(message_id = %message.id, rule, "held by local rule");
            return Verdict::fail_closed(rule);
        }

        let verdict = match self.classify(message, bundle, policy).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(message_id = %message.id, "classifier failed closed: {e}");
                return Verdict::fail_closed(e.to_string());
            }
        };

        let threshold = bundle
            .relation_tier
            .effective_threshold(&self.contacts, self.confidence_floor);
        let verdict = verdict.enforce_threshold(threshold);
        tracing::info!(
            message_id = %message.id,
            should_send = verdict.should_send,
            confidence = verdict.confidence,
            tier = %bundle.relation_tier,
            "classifier verdict"
        );
        verdict
    }

    async fn classify(
        &self,
        message: &Message,
        bundle: &ContextBundle,
        policy: &str,
    ) -> Result<Verdict, ClassifierError> {
        let system_prompt = format!("{}\n\n{RESPONSE_CONTRACT}", policy.trim());
        let user_prompt = render_prompt(message, bundle, self.user_context_max_age_secs);

        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat_with_system(
                Some(&system_prompt),
                &user_prompt,
                &self.model,
                self.temperature,
            ),
        )
        .await
        .map_err(|_| ClassifierError::Timeout {
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| ClassifierError::Request(sanitize_api_error(&format!("{e:#}"))))?;

        parse_verdict(&response)
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn local_time(unix_secs: i64) -> Option<DateTime<Local>> {
    DateTime::<Utc>::from_timestamp(unix_secs, 0).map(|ts| ts.with_timezone(&Local))
}

/// The user prompt: rendered context followed by the new message.
pub fn render_prompt(message: &Message, bundle: &ContextBundle, max_utterance_age_secs: i64) -> String {
    let now = bundle.current_time;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Current time: {} ({})",
        now.format("%Y-%m-%d %H:%M"),
        bundle.day_of_week
    );
    let _ = writeln!(out, "Relationship with sender: {}", bundle.relation_tier);
    if bundle.degraded {
        let _ = writeln!(out, "Note: stored history is unavailable; context is incomplete.");
    }

    out.push_str("\nUpcoming commitments:\n");
    if bundle.relevant_commitments.is_empty() {
        out.push_str("(none)\n");
    }
    for c in &bundle.relevant_commitments {
        let start = c.start.with_timezone(&Local);
        let end = c.end.with_timezone(&Local);
        let _ = write!(
            out,
            "- {}: {} to {}",
            c.description,
            start.format("%a %Y-%m-%d %H:%M"),
            end.format("%H:%M")
        );
        if !c.participants.is_empty() {
            let _ = write!(out, " (with {})", c.participants.join(", "));
        }
        out.push('\n');
    }

    let recent_utterances: Vec<_> = bundle
        .user_utterances
        .iter()
        .filter(|u| (now.with_timezone(&Utc) - u.spoken_at).num_seconds() <= max_utterance_age_secs)
        .collect();
    if !recent_utterances.is_empty() {
        out.push_str("\nWhat the user told the assistant recently:\n");
        for u in recent_utterances {
            let _ = writeln!(
                out,
                "- [{}] {}",
                u.spoken_at.with_timezone(&Local).format("%H:%M"),
                u.text
            );
        }
    }

    out.push_str("\nRecent conversation:\n");
    if bundle.conversation.is_empty() {
        out.push_str("(no earlier messages)\n");
    }
    for m in &bundle.conversation {
        let who = if m.is_from_me { "Me" } else { m.sender_name.as_str() };
        let when = local_time(m.timestamp)
            .map(|t| t.format("%m/%d %H:%M").to_string())
            .unwrap_or_default();
        let body = if m.is_blank() { "[media]" } else { m.body.as_str() };
        let _ = writeln!(out, "[{when}] {who}: {body}");
    }

    let _ = write!(
        out,
        "\nNew message from {} in {}{}:\n{}",
        message.sender_name,
        message.chat_name,
        if message.is_group { " (group)" } else { "" },
        message.body.trim()
    );
    out
}
