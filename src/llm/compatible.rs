//! OpenAI-compatible `/chat/completions` client.

use super::build_provider_client;
use super::scrub::sanitize_api_error;
use super::traits::{Provider, ProviderFuture};
use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: Option<String>,
    chat_url: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let chat_url = if base_url.ends_with("chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            api_key: api_key.map(ToString::to_string),
            chat_url,
            client: build_provider_client(timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> ProviderFuture<'a> {
        Box::pin(async move {
            let Some(api_key) = self.api_key.as_deref() else {
                anyhow::bail!(
                    "{} API key not set. Set api_key in config.toml or export REPLYGUARD_API_KEY.",
                    self.name
                );
            };

            let mut messages = Vec::with_capacity(2);
            if let Some(system) = system_prompt {
                messages.push(ChatMessage {
                    role: "system",
                    content: system,
                });
            }
            messages.push(ChatMessage {
                role: "user",
                content: message,
            });

            let request = ChatRequest {
                model,
                messages,
                temperature,
            };

            let response = self
                .client
                .post(&self.chat_url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .with_context(|| format!("{} chat completions request failed", self.name))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
                anyhow::bail!(
                    "{} API error ({status}): {}",
                    self.name,
                    sanitize_api_error(&body)
                );
            }

            let chat: ChatResponse = response
                .json()
                .await
                .with_context(|| format!("{} chat completions JSON decode failed", self.name))?;

            if let Some(usage) = &chat.usage {
                tracing::debug!(
                    provider = self.name.as_str(),
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "chat completion usage"
                );
            }

            chat.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| anyhow::anyhow!("No response from {}", self.name))
        })
    }
}
