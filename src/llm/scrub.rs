//! Keep credentials out of logged provider errors.

use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Key prefixes that introduce a bare token.
const TOKEN_PREFIXES: [&str; 6] = ["sk-", "sk_", "Bearer ", "bearer ", "eyJ", "AIza"];

/// Field markers whose value is a secret.
const FIELD_MARKERS: [&str; 8] = [
    "api_key=",
    "apikey=",
    "access_token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"authorization\":\"",
    "\"secret\":\"",
    "password=",
];

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

/// Replace whatever token follows each occurrence of `marker`.
fn redact_after(text: &mut String, marker: &str) {
    let mut cursor = 0;
    while let Some(rel) = text[cursor..].find(marker) {
        let start = cursor + rel;
        let value_start = start + marker.len();
        let value_len: usize = text[value_start..]
            .chars()
            .take_while(|c| is_token_char(*c))
            .map(char::len_utf8)
            .sum();
        if value_len == 0 {
            cursor = value_start;
            continue;
        }
        text.replace_range(start..value_start + value_len, REDACTED);
        cursor = start + REDACTED.len();
    }
}

pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let needs_work = TOKEN_PREFIXES
        .iter()
        .chain(FIELD_MARKERS.iter())
        .any(|marker| input.contains(marker));
    if !needs_work {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in TOKEN_PREFIXES.iter().chain(FIELD_MARKERS.iter()) {
        redact_after(&mut scrubbed, marker);
    }
    Cow::Owned(scrubbed)
}

/// Scrub secrets and cap the length of provider error text.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    match scrubbed.char_indices().nth(MAX_API_ERROR_CHARS) {
        Some((end, _)) => format!("{}...", &scrubbed[..end]),
        None => scrubbed.into_owned(),
    }
}
