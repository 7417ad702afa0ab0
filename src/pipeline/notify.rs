use strum::Display;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// The user has to answer this one.
    NeedsAttention,
    /// Informational: a reply went out in the user's name.
    AutoReplied,
    /// An auto-reply was approved but the bridge refused it.
    SendFailed,
    /// The pipeline failed on a message; it was not answered.
    ProcessingFailed,
}

/// What the user is told about one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message_id: String,
    pub chat_id: String,
    pub chat_name: String,
    pub sender_name: String,
    pub preview: String,
    pub reason: String,
    pub summary: Option<String>,
    pub speak_aloud: bool,
}

const PREVIEW_CHARS: usize = 100;

pub fn preview(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Surfaces pipeline outcomes to the user.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the tracing log.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, n: &Notification) {
        let summary = n.summary.as_deref().unwrap_or("");
        match n.kind {
            NotificationKind::NeedsAttention => info!(
                kind = %n.kind,
                chat = %n.chat_name,
                sender = %n.sender_name,
                speak = n.speak_aloud,
                summary,
                reason = %n.reason,
                "new message needs your reply: {}",
                n.preview
            ),
            NotificationKind::AutoReplied => info!(
                kind = %n.kind,
                chat = %n.chat_name,
                reason = %n.reason,
                "auto-replied to {}",
                n.sender_name
            ),
            NotificationKind::SendFailed | NotificationKind::ProcessingFailed => warn!(
                kind = %n.kind,
                chat = %n.chat_name,
                sender = %n.sender_name,
                reason = %n.reason,
                "message from {} was not answered: {}",
                n.sender_name,
                n.preview
            ),
        }
    }
}
