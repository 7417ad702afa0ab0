use serde::{Deserialize, Deserializer, Serialize};

const DIRECT_SUFFIX: &str = "@c.us";
const GROUP_SUFFIX: &str = "@g.us";

/// One WhatsApp message as reported by the bridge.
///
/// The bridge calls the conversation id `from`; it is accepted under either
/// name. Fields the bridge may omit default to empty/false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(alias = "from")]
    pub chat_id: String,
    #[serde(default)]
    pub chat_name: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, alias = "fromMe")]
    pub is_from_me: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub has_media: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    /// Canonicalize the chat id and fill fields the bridge left implicit.
    pub fn normalized(mut self) -> Self {
        self.chat_id = canonical_chat_id(&self.chat_id);
        if self.chat_id.ends_with(GROUP_SUFFIX) {
            self.is_group = true;
        }
        if self.chat_name.is_empty() {
            self.chat_name.clone_from(&self.sender_name);
        }
        self
    }

    /// No text to reason about: media-only or blank.
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// `GET /status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default, rename = "needsQR", alias = "needsQr")]
    pub needs_qr: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMatch {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessagesEnvelope {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatsEnvelope {
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ContactsEnvelope {
    #[serde(default)]
    pub results: Vec<ContactMatch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendRequest<'a> {
    pub chat_id: &'a str,
    pub message: &'a str,
}

/// Bare phone numbers become direct-chat ids; anything already carrying a
/// WhatsApp suffix is kept as is.
pub fn canonical_chat_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('@') {
        return trimmed.to_string();
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        trimmed.to_string()
    } else {
        format!("{digits}{DIRECT_SUFFIX}")
    }
}
