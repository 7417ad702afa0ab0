//! HTTP client for the local WhatsApp bridge.
//!
//! The bridge is a small Node service wrapping a paired WhatsApp Web session.
//! It exposes pull-style JSON endpoints; [`HttpBridge`] maps their failures
//! onto [`TransportError`] so the pipeline can tell "not paired yet" apart
//! from "request failed".

pub mod types;

pub use types::{BridgeStatus, ChatSummary, ContactMatch, Message, canonical_chat_id};

use crate::config::BridgeConfig;
use crate::error::TransportError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use types::{ChatsEnvelope, ContactsEnvelope, MessagesEnvelope, SendRequest};
use url::Url;

pub type BridgeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Everything the pipeline needs from the messaging side.
pub trait MessagingBridge: Send + Sync {
    fn status<'a>(&'a self) -> BridgeFuture<'a, BridgeStatus>;

    /// Messages that arrived since the previous call. Each call drains the
    /// bridge's queue, but a crashed poller may see a batch again.
    fn new_messages<'a>(&'a self) -> BridgeFuture<'a, Vec<Message>>;

    fn send_message<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BridgeFuture<'a, ()>;

    fn chats<'a>(&'a self) -> BridgeFuture<'a, Vec<ChatSummary>>;

    /// Most recent `limit` messages of one chat, oldest first.
    fn chat_messages<'a>(&'a self, chat_id: &'a str, limit: usize)
    -> BridgeFuture<'a, Vec<Message>>;

    fn search_contacts<'a>(&'a self, query: &'a str) -> BridgeFuture<'a, Vec<ContactMatch>>;

    /// Ready means paired and able to send.
    fn is_ready<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { self.status().await.is_ok_and(|status| status.ready) })
    }
}

pub struct HttpBridge {
    base: Url,
    client: Client,
}

impl HttpBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        let base = Url::parse(config.url.trim_end_matches('/')).map_err(|e| {
            TransportError::Request {
                endpoint: config.url.clone(),
                message: format!("invalid bridge url: {e}"),
            }
        })?;
        if base.cannot_be_a_base() {
            return Err(TransportError::Request {
                endpoint: config.url.clone(),
                message: "bridge url cannot carry a path".into(),
            });
        }

        let timeout = config.request_timeout_secs.max(1);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(timeout.min(5)))
            .build()
            .map_err(|e| TransportError::Request {
                endpoint: config.url.clone(),
                message: format!("failed to build http client: {e}"),
            })?;

        Ok(Self { base, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let endpoint = url.path().to_string();
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| request_error(&endpoint, &e))?;
        let response = check_status(&endpoint, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Request {
                endpoint,
                message: format!("invalid response body: {e}"),
            })
    }
}

fn request_error(endpoint: &str, err: &reqwest::Error) -> TransportError {
    let message = if err.is_timeout() {
        "timed out".to_string()
    } else if err.is_connect() {
        "connection refused".to_string()
    } else {
        err.to_string()
    };
    TransportError::Request {
        endpoint: endpoint.to_string(),
        message,
    }
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or(body);

    if status == StatusCode::SERVICE_UNAVAILABLE {
        tracing::debug!(endpoint, "bridge reports not ready: {message}");
        return Err(TransportError::Unavailable);
    }

    Err(TransportError::Rejected {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message: truncate(&message, 200),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl MessagingBridge for HttpBridge {
    fn status<'a>(&'a self) -> BridgeFuture<'a, BridgeStatus> {
        Box::pin(async move { self.get_json(self.endpoint(&["status"]), &[]).await })
    }

    fn new_messages<'a>(&'a self) -> BridgeFuture<'a, Vec<Message>> {
        Box::pin(async move {
            let envelope: MessagesEnvelope = self
                .get_json(self.endpoint(&["messages", "new"]), &[])
                .await?;
            Ok(envelope
                .messages
                .into_iter()
                .map(Message::normalized)
                .collect())
        })
    }

    fn send_message<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BridgeFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint(&["messages", "send"]);
            let endpoint = url.path().to_string();
            let chat_id = canonical_chat_id(chat_id);
            let response = self
                .client
                .post(url)
                .json(&SendRequest {
                    chat_id: &chat_id,
                    message: text,
                })
                .send()
                .await
                .map_err(|e| request_error(&endpoint, &e))?;
            check_status(&endpoint, response).await?;
            tracing::debug!(chat_id = %chat_id, "bridge accepted outbound message");
            Ok(())
        })
    }

    fn chats<'a>(&'a self) -> BridgeFuture<'a, Vec<ChatSummary>> {
        Box::pin(async move {
            let envelope: ChatsEnvelope = self.get_json(self.endpoint(&["chats"]), &[]).await?;
            Ok(envelope.chats)
        })
    }

    fn chat_messages<'a>(
        &'a self,
        chat_id: &'a str,
        limit: usize,
    ) -> BridgeFuture<'a, Vec<Message>> {
        Box::pin(async move {
            let chat_id = canonical_chat_id(chat_id);
            let envelope: MessagesEnvelope = self
                .get_json(
                    self.endpoint(&["chats", &chat_id, "messages"]),
                    &[("limit", limit.to_string())],
                )
                .await?;
            let mut messages: Vec<Message> = envelope
                .messages
                .into_iter()
                .map(|mut msg| {
                    if msg.chat_id.is_empty() {
                        msg.chat_id.clone_from(&chat_id);
                    }
                    msg.normalized()
                })
                .collect();
            messages.sort_by_key(|msg| msg.timestamp);
            Ok(messages)
        })
    }

    fn search_contacts<'a>(&'a self, query: &'a str) -> BridgeFuture<'a, Vec<ContactMatch>> {
        Box::pin(async move {
            let url = self.endpoint(&["contacts", "search"]);
            let endpoint = url.path().to_string();
            let response = self
                .client
                .post(url)
                .json(&serde_json::json!({ "query": query }))
                .send()
                .await
                .map_err(|e| request_error(&endpoint, &e))?;
            let envelope: ContactsEnvelope = check_status(&endpoint, response)
                .await?
                .json()
                .await
                .map_err(|e| TransportError::Request {
                    endpoint,
                    message: format!("invalid response body: {e}"),
                })?;
            Ok(envelope.results)
        })
    }
}
