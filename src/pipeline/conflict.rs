use super::context::ContextBundle;
use super::timeparse::{TimeWindow, extract_window};
use crate::error::ConflictError;
use crate::memory::Commitment;
use crate::transport::bridge::Message;

/// Outcome of checking a proposed reply against the user's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConflictResult {
    pub has_conflict: bool,
    pub conflicting_commitment: Option<Commitment>,
    /// The time window the message was understood to refer to, if any.
    pub window: Option<TimeWindow>,
}

impl ConflictResult {
    fn clear(window: Option<TimeWindow>) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }
}

/// Compares the time a message talks about with stored commitments.
///
/// Permissive by construction: when no time can be read out of the
/// message, or the reading is ambiguous, no conflict is reported and the
/// decision engine's verdict stands.
pub struct ConflictChecker {
    default_event_minutes: i64,
}

impl ConflictChecker {
    pub fn new(default_event_minutes: i64) -> Self {
        Self {
            default_event_minutes: default_event_minutes.max(1),
        }
    }

    pub fn check(
        &self,
        message: &Message,
        reply_text: Option<&str>,
        bundle: &ContextBundle,
    ) -> ConflictResult {
        let Some(window) = self.window_for(message, reply_text, bundle) else {
            return ConflictResult::clear(None);
        };

        match first_overlap(&bundle.relevant_commitments, window) {
            Some(commitment) => {
                tracing::info!(
                    message_id = %message.id,
                    commitment = %commitment.description,
                    "proposed reply conflicts with a commitment"
                );
                ConflictResult {
                    has_conflict: true,
                    conflicting_commitment: Some(commitment.clone()),
                    window: Some(window),
                }
            }
            None => ConflictResult::clear(Some(window)),
        }
    }

    /// The incoming text names the time first; the reply is consulted only
    /// when the message itself gives nothing usable.
    fn window_for(
        &self,
        message: &Message,
        reply_text: Option<&str>,
        bundle: &ContextBundle,
    ) -> Option<TimeWindow> {
        let sources = std::iter::once(message.body.as_str()).chain(reply_text);
        for text in sources {
            match extract_window(text, bundle.current_time, self.default_event_minutes) {
                Ok(Some(window)) => return Some(window),
                Ok(None) => {}
                Err(ConflictError::Ambiguous(detail)) => {
                    tracing::debug!(message_id = %message.id, "skipping time extraction: {detail}");
                }
            }
        }
        None
    }
}

fn first_overlap(commitments: &[Commitment], window: TimeWindow) -> Option<&Commitment> {
    commitments
        .iter()
        .filter(|c| c.overlaps(window.start, window.end))
        .min_by_key(|c| c.start)
}
