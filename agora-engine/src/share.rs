//! Share-line helpers.
//!
//! The share line is a single tweet-length hook generated from the tail
//! of a finished transcript. Generation lives in the executor (it owns
//! the model client); the pure parts — clipping the transcript and
//! normalizing the model's output — live here.

use agora_types::TranscriptEntry;

/// Transcript tail fed to the share-line prompt.
const CLIP_BYTES: usize = 2000;

/// Hard cap on the published line.
const MAX_LEN: usize = 140;

/// Join the transcript as `"{name}: {text}"` lines and keep the last
/// [`CLIP_BYTES`] bytes, nudged forward to a char boundary.
pub(crate) fn clip_transcript_tail(transcript: &[TranscriptEntry]) -> String {
    let joined = transcript
        .iter()
        .map(|entry| format!("{}: {}", entry.agent_name, entry.text))
        .collect::<Vec<_>>()
        .join("\n");

    if joined.len() <= CLIP_BYTES {
        return joined;
    }
    let mut start = joined.len() - CLIP_BYTES;
    while !joined.is_char_boundary(start) {
        start += 1;
    }
    joined[start..].to_string()
}

/// Normalize raw model output into a publishable share line: trim, strip
/// one wrapping quote character from each side, and clamp to
/// [`MAX_LEN`] chars with a `...` suffix.
pub(crate) fn normalize_share_line(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = strip_one_quote(trimmed);

    if unquoted.chars().count() <= MAX_LEN {
        return unquoted.to_string();
    }
    let clipped: String = unquoted.chars().take(MAX_LEN - 3).collect();
    format!("{}...", clipped.trim_end())
}

fn strip_one_quote(text: &str) -> &str {
    let text = text
        .strip_prefix('"')
        .or_else(|| text.strip_prefix('\''))
        .unwrap_or(text);
    text.strip_suffix('"')
        .or_else(|| text.strip_suffix('\''))
        .unwrap_or(text)
}
