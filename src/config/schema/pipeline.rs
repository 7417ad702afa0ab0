use serde::{Deserialize, Serialize};

/// What the dispatcher does when an optimistic reply collides with a
/// stored commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the message to the user.
    #[default]
    Notify,
    /// Send an auto-generated decline instead of the proposed reply.
    Decline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum confidence for any auto-send (never below 0.5)
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    /// Upper bound on one classifier call
    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,
    /// Commitments starting within this many hours are always in context
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
    #[serde(default = "default_conversation_window")]
    pub conversation_window: usize,
    #[serde(default = "default_user_window")]
    pub user_window: usize,
    /// Only user utterances younger than this are shown to the classifier
    #[serde(default = "default_user_context_max_age_secs")]
    pub user_context_max_age_secs: i64,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
    /// Assumed length of a requested meeting when the message gives none
    #[serde(default = "default_event_minutes")]
    pub default_event_minutes: i64,
    /// Seed an empty conversation window from the bridge's chat history
    #[serde(default)]
    pub backfill_history: bool,
}

fn default_confidence_floor() -> f64 {
    0.5
}

fn default_classifier_timeout_secs() -> u64 {
    30
}

fn default_lookahead_hours() -> i64 {
    168
}

fn default_conversation_window() -> usize {
    50
}

fn default_user_window() -> usize {
    30
}

fn default_user_context_max_age_secs() -> i64 {
    300
}

fn default_event_minutes() -> i64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            classifier_timeout_secs: default_classifier_timeout_secs(),
            lookahead_hours: default_lookahead_hours(),
            conversation_window: default_conversation_window(),
            user_window: default_user_window(),
            user_context_max_age_secs: default_user_context_max_age_secs(),
            on_conflict: ConflictPolicy::default(),
            default_event_minutes: default_event_minutes(),
            backfill_history: false,
        }
    }
}
