use super::types::{Commitment, DispatchRecord, PendingReply, UserUtterance};
use crate::error::StoreError;
use crate::transport::bridge::Message;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable state behind the pipeline: per-contact history, the user's own
/// recent utterances, their commitments and the dispatch log.
///
/// Windows are bounded by the implementation; reads return chronological
/// order (oldest first).
pub trait MemoryStore: Send + Sync {
    /// Returns `false` when the message id was already stored for that chat.
    fn append_message<'a>(&'a self, message: &'a Message) -> StoreFuture<'a, bool>;

    fn conversation_window<'a>(
        &'a self,
        chat_id: &'a str,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Message>>;

    /// Whether any message, in either direction, exists for the chat.
    fn has_history<'a>(&'a self, chat_id: &'a str) -> StoreFuture<'a, bool>;

    fn append_utterance<'a>(&'a self, utterance: &'a UserUtterance) -> StoreFuture<'a, ()>;

    fn user_utterances<'a>(&'a self, limit: usize) -> StoreFuture<'a, Vec<UserUtterance>>;

    fn add_commitment<'a>(&'a self, commitment: &'a Commitment) -> StoreFuture<'a, ()>;

    fn remove_commitment<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool>;

    fn list_commitments<'a>(&'a self) -> StoreFuture<'a, Vec<Commitment>>;

    /// Commitments overlapping `[from, to)`, ordered by start.
    fn commitments_between<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<Commitment>>;

    /// Atomically claim a message for dispatch. Only the first caller for a
    /// given id gets `true`.
    fn claim_dispatch<'a>(&'a self, message_id: &'a str) -> StoreFuture<'a, bool>;

    fn record_dispatch<'a>(&'a self, record: &'a DispatchRecord) -> StoreFuture<'a, ()>;

    fn dispatch_for<'a>(&'a self, message_id: &'a str)
    -> StoreFuture<'a, Option<DispatchRecord>>;

    fn recent_dispatches<'a>(&'a self, limit: usize) -> StoreFuture<'a, Vec<DispatchRecord>>;

    fn add_pending_reply<'a>(&'a self, pending: &'a PendingReply) -> StoreFuture<'a, ()>;

    /// Newest unresolved pending reply, optionally restricted to one chat.
    fn latest_pending_reply<'a>(
        &'a self,
        chat_id: Option<&'a str>,
    ) -> StoreFuture<'a, Option<PendingReply>>;

    /// Marks every pending reply for the chat resolved; returns how many.
    fn resolve_pending_replies<'a>(&'a self, chat_id: &'a str) -> StoreFuture<'a, usize>;

    /// Case-insensitive substring search over stored message bodies, newest first.
    fn search_messages<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Message>>;

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}
