//! Strict parsing of the classifier's `KEY=VALUE` response.
//!
//! Any deviation from the contract yields an error; callers turn that into
//! [`Verdict::fail_closed`].

use crate::error::ClassifierError;
use serde::Serialize;

/// Appended to the behavior policy so the model knows the reply shape.
pub const RESPONSE_CONTRACT: &str = "\
Respond with exactly these lines and nothing else:
SHOULD_SEND=YES or NO
CONFIDENCE=<number between 0 and 1>
REPLY=<the message to send, required when SHOULD_SEND=YES>
REASONING=<one sentence explaining the decision>
SPEAK=YES or NO (whether the user should be told about this message out loud)
SUMMARY=<short summary of the incoming message for the user>";

/// The engine's send/no-send judgment for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub should_send: bool,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub reply_text: Option<String>,
    pub reasoning: String,
    pub speak_aloud: bool,
    pub summary: Option<String>,
}

impl Verdict {
    pub fn fail_closed(reasoning: impl Into<String>) -> Self {
        Self {
            should_send: false,
            confidence: 0.0,
            reply_text: None,
            reasoning: reasoning.into(),
            speak_aloud: false,
            summary: None,
        }
    }

    /// Coerce to no-send when confidence is under `threshold`.
    pub fn enforce_threshold(mut self, threshold: f64) -> Self {
        if self.should_send && self.confidence < threshold {
            self.reasoning = format!(
                "confidence {:.2} below threshold {threshold:.2}; {}",
                self.confidence, self.reasoning
            );
            self.should_send = false;
        }
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Key {
    ShouldSend,
    Confidence,
    Reply,
    Reasoning,
    Speak,
    Summary,
}

impl Key {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SHOULD_SEND" => Some(Self::ShouldSend),
            "CONFIDENCE" => Some(Self::Confidence),
            "REPLY" => Some(Self::Reply),
            "REASONING" => Some(Self::Reasoning),
            "SPEAK" => Some(Self::Speak),
            "SUMMARY" => Some(Self::Summary),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::ShouldSend => "SHOULD_SEND",
            Self::Confidence => "CONFIDENCE",
            Self::Reply => "REPLY",
            Self::Reasoning => "REASONING",
            Self::Speak => "SPEAK",
            Self::Summary => "SUMMARY",
        }
    }
}

/// Drop a surrounding Markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub(crate) fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if let Some(inner) = value
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    value
}

fn parse_flag(key: Key, value: &str) -> Result<bool, ClassifierError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "YES" | "TRUE" => Ok(true),
        "NO" | "FALSE" => Ok(false),
        other => Err(ClassifierError::Malformed(format!(
            "{}={other} is not YES or NO",
            key.name()
        ))),
    }
}

/// `0.9`, `90%` and `90` all mean 0.9. A bare number between 1 and 2 is
/// neither a fraction nor a plausible percentage and is rejected.
pub fn parse_confidence(value: &str) -> Result<f64, ClassifierError> {
    let trimmed = value.trim();
    let (number, percent) = match trimmed.strip_suffix('%') {
        Some(number) => (number.trim(), true),
        None => (trimmed, false),
    };
    let parsed: f64 = number
        .parse()
        .map_err(|_| ClassifierError::Malformed(format!("unparsable CONFIDENCE={trimmed}")))?;
    if !parsed.is_finite() {
        return Err(ClassifierError::Malformed(format!(
            "non-finite CONFIDENCE={trimmed}"
        )));
    }
    if !percent && parsed > 1.0 && parsed < 2.0 {
        return Err(ClassifierError::Malformed(format!(
            "out-of-range CONFIDENCE={trimmed}"
        )));
    }
    let normalized = if percent || (2.0..=100.0).contains(&parsed) {
        parsed / 100.0
    } else {
        parsed
    };
    Ok(normalized.clamp(0.0, 1.0))
}

#[derive(Default)]
struct Fields {
    should_send: Option<String>,
    confidence: Option<String>,
    reply: Option<String>,
    reasoning: Option<String>,
    speak: Option<String>,
    summary: Option<String>,
}

impl Fields {
    fn slot(&mut self, key: Key) -> &mut Option<String> {
        match key {
            Key::ShouldSend => &mut self.should_send,
            Key::Confidence => &mut self.confidence,
            Key::Reply => &mut self.reply,
            Key::Reasoning => &mut self.reasoning,
            Key::Speak => &mut self.speak,
            Key::Summary => &mut self.summary,
        }
    }

    /// Repeating a marker is tolerated only when the values agree.
    fn set(&mut self, key: Key, value: String) -> Result<(), ClassifierError> {
        let slot = self.slot(key);
        if let Some(existing) = slot.as_deref() {
            if existing.eq_ignore_ascii_case(&value) {
                return Ok(());
            }
            return Err(ClassifierError::Malformed(format!(
                "contradicting {} markers: {existing:?} vs {value:?}",
                key.name()
            )));
        }
        *slot = Some(value);
        Ok(())
    }
}

pub fn parse_verdict(raw: &str) -> Result<Verdict, ClassifierError> {
    let body = strip_code_fences(raw);
    let mut fields = Fields::default();
    // Unmarked lines directly after REPLY continue a multi-line reply.
    let mut reply_continuation: Option<String> = None;

    for line in body.lines() {
        let line = line.trim();
        let marker = line
            .split_once('=')
            .and_then(|(key, value)| Key::parse(key).map(|key| (key, value.trim())));

        match marker {
            Some((key, value)) => {
                if let Some(reply) = reply_continuation.take() {
                    fields.set(Key::Reply, reply)?;
                }
                if key == Key::Reply {
                    reply_continuation = Some(value.to_string());
                } else {
                    fields.set(key, value.to_string())?;
                }
            }
            None => {
                if let Some(reply) = reply_continuation.as_mut()
                    && !line.is_empty()
                {
                    reply.push('\n');
                    reply.push_str(line);
                }
            }
        }
    }
    if let Some(reply) = reply_continuation.take() {
        fields.set(Key::Reply, reply)?;
    }

    let should_send = fields
        .should_send
        .as_deref()
        .ok_or_else(|| ClassifierError::Malformed("missing SHOULD_SEND marker".into()))
        .and_then(|value| parse_flag(Key::ShouldSend, value))?;
    let confidence = fields
        .confidence
        .as_deref()
        .ok_or_else(|| ClassifierError::Malformed("missing CONFIDENCE marker".into()))
        .and_then(parse_confidence)?;

    let reply_text = fields
        .reply
        .as_deref()
        .map(strip_quotes)
        .filter(|reply| !reply.is_empty())
        .map(str::to_string);
    if should_send && reply_text.is_none() {
        return Err(ClassifierError::Malformed(
            "SHOULD_SEND=YES without a REPLY".into(),
        ));
    }

    let speak_aloud = match fields.speak.as_deref() {
        Some(value) => parse_flag(Key::Speak, value)?,
        None => false,
    };

    Ok(Verdict {
        should_send,
        confidence,
        reply_text,
        reasoning: fields.reasoning.unwrap_or_default(),
        speak_aloud,
        summary: fields.summary.filter(|s| !s.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_response() {
        let verdict = parse_verdict(
            "SHOULD_SEND=YES\nCONFIDENCE=0.9\nREPLY=Sure!\nREASONING=simple yes\nSPEAK=NO\nSUMMARY=Alice asks if you're free",
        )
        .unwrap();
        assert!(verdict.should_send);
        assert!((verdict.confidence - 0.9).abs() < 1e-9);
        assert_eq!(verdict.reply_text.as_deref(), Some("Sure!"));
        assert_eq!(verdict.reasoning, "simple yes");
        assert!(!verdict.speak_aloud);
        assert_eq!(verdict.summary.as_deref(), Some("Alice asks if you're free"));
    }

    #[test]
    fn strips_markdown_fences() {
        let verdict = parse_verdict("```text\nSHOULD_SEND=NO\nCONFIDENCE=0.2\n```").unwrap();
        assert!(!verdict.should_send);
        assert!((verdict.confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn missing_markers_are_malformed() {
        assert!(parse_verdict("").is_err());
        assert!(parse_verdict("Sure, I'd reply with hello").is_err());
        assert!(parse_verdict("SHOULD_SEND=YES\nREPLY=hi").is_err());
        assert!(parse_verdict("CONFIDENCE=0.9\nREPLY=hi").is_err());
    }

    #[test]
    fn yes_without_reply_is_malformed() {
        assert!(parse_verdict("SHOULD_SEND=YES\nCONFIDENCE=0.9").is_err());
        assert!(parse_verdict("SHOULD_SEND=YES\nCONFIDENCE=0.9\nREPLY=").is_err());
        assert!(parse_verdict("SHOULD_SEND=YES\nCONFIDENCE=0.9\nREPLY=\"\"").is_err());
    }

    #[test]
    fn no_without_reply_is_fine() {
        let verdict = parse_verdict("SHOULD_SEND=NO\nCONFIDENCE=0.3").unwrap();
        assert!(verdict.reply_text.is_none());
    }

    #[test]
    fn contradicting_duplicates_are_malformed() {
        assert!(parse_verdict("SHOULD_SEND=YES\nSHOULD_SEND=NO\nCONFIDENCE=0.9\nREPLY=x").is_err());
        let verdict =
            parse_verdict("SHOULD_SEND=NO\nshould_send=no\nCONFIDENCE=0.4").unwrap();
        assert!(!verdict.should_send);
    }

    #[test]
    fn invalid_flag_is_malformed() {
        assert!(parse_verdict("SHOULD_SEND=MAYBE\nCONFIDENCE=0.9").is_err());
    }

    #[test]
    fn confidence_forms() {
        assert!((parse_confidence("0.9").unwrap() - 0.9).abs() < 1e-9);
        assert!((parse_confidence("90%").unwrap() - 0.9).abs() < 1e-9);
        assert!((parse_confidence("90").unwrap() - 0.9).abs() < 1e-9);
        assert!((parse_confidence("1").unwrap() - 1.0).abs() < 1e-9);
        assert!((parse_confidence("250").unwrap() - 1.0).abs() < 1e-9);
        assert!(parse_confidence("-0.4").unwrap().abs() < 1e-9);
        assert!(parse_confidence("high").is_err());
        assert!(parse_confidence("NaN").is_err());
        assert!(parse_confidence("1.5").is_err());
        assert!((parse_confidence("1.5%").unwrap() - 0.015).abs() < 1e-9);
        assert!((parse_confidence("2").unwrap() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn reply_quotes_are_stripped_and_multiline_kept() {
        let verdict = parse_verdict(
            "SHOULD_SEND=YES\nCONFIDENCE=0.8\nREPLY=\"On my way\"\nREASONING=ok",
        )
        .unwrap();
        assert_eq!(verdict.reply_text.as_deref(), Some("On my way"));

        let verdict = parse_verdict(
            "SHOULD_SEND=YES\nCONFIDENCE=0.8\nREPLY=Sounds good.\nSee you at 8\nREASONING=ok",
        )
        .unwrap();
        assert_eq!(verdict.reply_text.as_deref(), Some("Sounds good.\nSee you at 8"));
    }

    #[test]
    fn reply_may_contain_equals_sign() {
        let verdict =
            parse_verdict("SHOULD_SEND=YES\nCONFIDENCE=0.8\nREPLY=2+2=4, obviously").unwrap();
        assert_eq!(verdict.reply_text.as_deref(), Some("2+2=4, obviously"));
    }

    #[test]
    fn enforce_threshold_coerces_low_confidence() {
        let verdict = parse_verdict("SHOULD_SEND=YES\nCONFIDENCE=0.45\nREPLY=ok").unwrap();
        let verdict = verdict.enforce_threshold(0.5);
        assert!(!verdict.should_send);
        assert!(verdict.reasoning.contains("below threshold"));

        let verdict = parse_verdict("SHOULD_SEND=YES\nCONFIDENCE=0.5\nREPLY=ok").unwrap();
        assert!(verdict.enforce_threshold(0.5).should_send);
    }

    #[test]
    fn fail_closed_shape() {
        let verdict = Verdict::fail_closed("timeout");
        assert!(!verdict.should_send);
        assert!(verdict.confidence.abs() < f64::EPSILON);
    }
}
