//! Anthropic Messages API request types.
//!
//! Serialize-only: responses arrive as SSE and are parsed in
//! [`crate::streaming`]. Everything borrows from the engine's
//! [`agora_types::GenerationRequest`] — prompts are a few kilobytes per
//! turn and there is no reason to copy them.

use serde::Serialize;

/// Request body for `POST /v1/messages`.
#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    /// Model identifier.
    pub model: &'a str,
    /// Output token cap.
    pub max_tokens: u32,
    /// Always `true` — the engine only consumes streams.
    pub stream: bool,
    /// System prompt as a block array, so the prefix can carry a
    /// `cache_control` marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Vec<SystemBlock<'a>>>,
    /// Conversation messages. The engine sends exactly one user turn;
    /// the transcript is already folded into it.
    pub messages: Vec<WireMessage<'a>>,
}

/// A system prompt block.
#[derive(Debug, Serialize)]
pub(crate) struct SystemBlock<'a> {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The prompt text.
    pub text: &'a str,
    /// Prompt-cache marker, when caching is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// Anthropic's cache_control object. Only the ephemeral (5 minute)
/// flavor exists today.
#[derive(Debug, Serialize)]
pub(crate) struct CacheControl {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl CacheControl {
    pub(crate) fn ephemeral() -> Self {
        Self { kind: "ephemeral" }
    }
}

/// One conversation message.
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    /// `"user"` or `"assistant"`.
    pub role: &'static str,
    /// Plain-text content.
    pub content: &'a str,
}

impl<'a> MessagesRequest<'a> {
    /// Assemble the wire body for one generation.
    pub(crate) fn build(
        model: &'a str,
        system: Option<&'a str>,
        user: &'a str,
        max_tokens: u32,
        cache_system_prefix: bool,
    ) -> Self {
        let system = system.map(|text| {
            vec![SystemBlock {
                kind: "text",
                text,
                cache_control: cache_system_prefix.then(CacheControl::ephemeral),
            }]
        });
        Self {
            model,
            max_tokens,
            stream: true,
            system,
            messages: vec![WireMessage {
                role: "user",
                content: user,
            }],
        }
    }
}
