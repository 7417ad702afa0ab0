use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Something the user said or typed to the assistant itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUtterance {
    pub text: String,
    pub spoken_at: DateTime<Utc>,
}

impl UserUtterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spoken_at: Utc::now(),
        }
    }
}

/// A scheduled block of the user's time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub id: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl Commitment {
    /// Validates `start < end`; an empty or inverted interval is rejected.
    pub fn new(
        description: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        participants: Vec<String>,
    ) -> Result<Self, StoreError> {
        if start >= end {
            return Err(StoreError::Invariant(format!(
                "commitment must end after it starts (start={start}, end={end})"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            start,
            end,
            participants,
        })
    }

    /// Half-open interval overlap: touching endpoints do not conflict.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Final disposition of one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchAction {
    Sent,
    Notified,
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub message_id: String,
    pub chat_id: String,
    pub action: DispatchAction,
    pub reason: String,
    pub sent_text: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A message the user was notified about and has not answered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReply {
    pub message_id: String,
    pub chat_id: String,
    pub chat_name: String,
    pub sender_name: String,
    pub body: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, hour, 0, 0).unwrap()
    }

    #[test]
    fn commitment_requires_positive_duration() {
        assert!(Commitment::new("standup", at(9), at(10), vec![]).is_ok());
        assert!(matches!(
            Commitment::new("broken", at(10), at(10), vec![]),
            Err(StoreError::Invariant(_))
        ));
        assert!(Commitment::new("inverted", at(11), at(10), vec![]).is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        let meeting = Commitment::new("dentist", at(15), at(16), vec![]).unwrap();
        assert!(meeting.overlaps(at(15), at(16)));
        assert!(meeting.overlaps(at(14), at(17)));
        assert!(!meeting.overlaps(at(16), at(17)));
        assert!(!meeting.overlaps(at(13), at(15)));
    }

    #[test]
    fn dispatch_action_text_form() {
        assert_eq!(DispatchAction::Sent.to_string(), "SENT");
        assert_eq!(
            "NOTIFIED".parse::<DispatchAction>().unwrap(),
            DispatchAction::Notified
        );
        assert!("claimed".parse::<DispatchAction>().is_err());
    }
}
