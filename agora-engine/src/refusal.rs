//! Refusal detection for agent turns.
//!
//! Some models break character mid-bout, declining the persona on
//! ethical grounds. Detection is telemetry only: a match is logged with
//! enough metadata to find patterns across models and presets, and the
//! turn proceeds unchanged.

/// Marker phrases indicating a model has broken character, most specific
/// first. Matching is case-insensitive substring containment.
const REFUSAL_MARKERS: &[&str] = &[
    "step out of character",
    "break character here",
    "need to step out",
    "can't roleplay",
    "cannot roleplay",
    "can't play the role",
    "won't roleplay",
    "I can't pretend",
    "I cannot pretend",
    "What I can do instead",
    "I need to be straightforward",
    "I should be transparent",
    "spreads misinformation",
    "promotes conspiratorial thinking",
    "normalize reasoning patterns that are",
    "genuinely harmful",
    "I appreciate you trying to set this up, but",
    "I need to decline",
    "I'm not comfortable",
    "Let me suggest an alternative",
    "Instead of roleplaying",
];

/// Scan a completed turn for refusal markers. Returns the first matched
/// marker, or `None` when the text stayed in character.
pub(crate) fn detect_refusal(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS
        .iter()
        .find(|marker| lower.contains(&marker.to_lowercase()))
        .copied()
}
