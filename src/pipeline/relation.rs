use crate::config::ContactsConfig;
use crate::transport::bridge::Message;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How close the sender is to the user. Closer tiers demand more confidence
/// before anything is sent in the user's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RelationTier {
    /// Listed in `contacts.close`.
    Close,
    /// Has earlier history with the user.
    Known,
    Unknown,
}

impl RelationTier {
    /// `has_history` is whether the chat held any message before this one.
    pub fn classify(message: &Message, contacts: &ContactsConfig, has_history: bool) -> Self {
        let is_close = contacts.close.iter().any(|name| {
            let name = name.trim();
            !name.is_empty()
                && (name.eq_ignore_ascii_case(message.sender_name.trim())
                    || name.eq_ignore_ascii_case(message.chat_name.trim())
                    || name.eq_ignore_ascii_case(message.chat_id.trim()))
        });

        if is_close {
            Self::Close
        } else if has_history {
            Self::Known
        } else {
            Self::Unknown
        }
    }

    pub fn threshold(self, contacts: &ContactsConfig) -> f64 {
        match self {
            Self::Close => contacts.close_threshold,
            Self::Known => contacts.known_threshold,
            Self::Unknown => contacts.unknown_threshold,
        }
    }

    /// The bar a verdict must clear: never below the global floor.
    pub fn effective_threshold(self, contacts: &ContactsConfig, floor: f64) -> f64 {
        self.threshold(contacts).max(floor)
    }
}
