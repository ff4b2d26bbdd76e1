//! Response length and format dials.
//!
//! Both resolve from client-supplied keys with a total lookup: unknown or
//! absent keys land on the documented default rather than an error, so a
//! stale client can never break bout creation over a cosmetic dial.

use serde::{Deserialize, Serialize};

/// How long each turn should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    /// One or two punchy sentences.
    Short,
    /// A tight paragraph. The default.
    Standard,
    /// Several paragraphs; room to build an argument.
    Long,
}

impl Default for ResponseLength {
    fn default() -> Self {
        ResponseLength::Standard
    }
}

impl ResponseLength {
    /// Resolve a client-supplied key. Absent, empty, or unknown keys
    /// resolve to [`ResponseLength::Standard`].
    pub fn resolve(key: Option<&str>) -> ResponseLength {
        match key.map(str::trim) {
            Some("short") => ResponseLength::Short,
            Some("long") => ResponseLength::Long,
            Some("standard") => ResponseLength::Standard,
            _ => ResponseLength::Standard,
        }
    }

    /// Stable wire id.
    pub fn id(&self) -> &'static str {
        match self {
            ResponseLength::Short => "short",
            ResponseLength::Standard => "standard",
            ResponseLength::Long => "long",
        }
    }

    /// Human label used in the prompt's context block.
    pub fn label(&self) -> &'static str {
        match self {
            ResponseLength::Short => "Short",
            ResponseLength::Standard => "Standard",
            ResponseLength::Long => "Long",
        }
    }

    /// Guidance hint placed next to the label in the prompt.
    pub fn hint(&self) -> &'static str {
        match self {
            ResponseLength::Short => "1-2 punchy sentences, land the hit and stop",
            ResponseLength::Standard => "a tight paragraph, every line earns its place",
            ResponseLength::Long => "several paragraphs, build the argument properly",
        }
    }

    /// Hard cap passed to the model as max output tokens.
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            ResponseLength::Short => 120,
            ResponseLength::Standard => 300,
            ResponseLength::Long => 600,
        }
    }

    /// Expected output tokens per turn, the basis of cost estimation.
    /// Deliberately below the hard cap: most turns stop well short of it.
    pub fn output_tokens_per_turn(&self) -> u32 {
        match self {
            ResponseLength::Short => 60,
            ResponseLength::Standard => 120,
            ResponseLength::Long => 240,
        }
    }
}

/// Markup discipline for each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// No markup at all.
    Plain,
    /// Short paragraphs separated by blank lines. The default.
    Spaced,
    /// Markdown allowed.
    Markdown,
    /// A single JSON object per turn.
    Json,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Spaced
    }
}

impl ResponseFormat {
    /// Resolve a client-supplied key. Absent, empty, or unknown keys
    /// resolve to [`ResponseFormat::Spaced`].
    pub fn resolve(key: Option<&str>) -> ResponseFormat {
        match key.map(str::trim) {
            Some("plain") => ResponseFormat::Plain,
            Some("markdown") => ResponseFormat::Markdown,
            Some("json") => ResponseFormat::Json,
            Some("spaced") => ResponseFormat::Spaced,
            _ => ResponseFormat::Spaced,
        }
    }

    /// Stable wire id.
    pub fn id(&self) -> &'static str {
        match self {
            ResponseFormat::Plain => "plain",
            ResponseFormat::Spaced => "spaced",
            ResponseFormat::Markdown => "markdown",
            ResponseFormat::Json => "json",
        }
    }

    /// Human label used in the prompt's context block.
    pub fn label(&self) -> &'static str {
        match self {
            ResponseFormat::Plain => "Plain text",
            ResponseFormat::Spaced => "Spaced paragraphs",
            ResponseFormat::Markdown => "Markdown",
            ResponseFormat::Json => "JSON",
        }
    }

    /// Guidance hint placed next to the label in the prompt.
    pub fn hint(&self) -> &'static str {
        match self {
            ResponseFormat::Plain => "no markup of any kind",
            ResponseFormat::Spaced => "blank line between thoughts, no headers or lists",
            ResponseFormat::Markdown => "markdown markup is fine where it helps",
            ResponseFormat::Json => "one JSON object, no prose around it",
        }
    }

    /// Directive embedded in the system message's format section.
    pub fn instruction(&self) -> &'static str {
        match self {
            ResponseFormat::Plain => "Respond in plain text only. No markdown, no lists, no headers.",
            ResponseFormat::Spaced => {
                "Respond in short paragraphs separated by blank lines. No headers, no lists."
            }
            ResponseFormat::Markdown => {
                "You may use markdown formatting where it strengthens the delivery."
            }
            ResponseFormat::Json => {
                "Respond with a single JSON object and nothing else. No prose outside the object."
            }
        }
    }
}
