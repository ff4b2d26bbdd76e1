//! Streaming types for incremental model responses.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

/// Token usage reported by a provider for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    #[serde(default)]
    pub input_tokens: u64,
    /// Completion tokens produced.
    #[serde(default)]
    pub output_tokens: u64,
    /// Tokens written to the provider's prompt cache, when caching was on.
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Tokens served from the provider's prompt cache.
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Whether the provider reported any real counts. A fully-zero usage
    /// means the counts were missing and the caller should estimate.
    pub fn is_reported(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }

    /// Merge another usage record into this one (saturating).
    pub fn absorb(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_creation_input_tokens = self
            .cache_creation_input_tokens
            .saturating_add(other.cache_creation_input_tokens);
        self.cache_read_input_tokens = self
            .cache_read_input_tokens
            .saturating_add(other.cache_read_input_tokens);
    }
}

/// A fault surfaced inside a model stream, after headers were already
/// exchanged. Distinct from [`crate::ModelError`], which covers failures
/// to start the stream at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    /// Human-readable description.
    pub message: String,
    /// Whether retrying the whole call might succeed.
    pub retryable: bool,
}

impl StreamFault {
    /// A fault worth retrying (network hiccup, provider overload).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A terminal fault (malformed event, provider-reported error).
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl std::fmt::Display for StreamFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// An event emitted while a model generation streams.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// Incremental text content.
    TextDelta(String),
    /// Token usage. May arrive more than once (start + final delta);
    /// consumers absorb each report.
    Usage(TokenUsage),
    /// The stream failed. No further events follow.
    Error(StreamFault),
}

/// Handle to a streaming generation. Consume with `StreamExt::next()`.
pub struct ModelStream {
    /// The stream of events.
    pub events: Pin<Box<dyn Stream<Item = ModelEvent> + Send>>,
}

impl ModelStream {
    /// Wrap a stream of events.
    pub fn new(events: impl Stream<Item = ModelEvent> + Send + 'static) -> Self {
        Self {
            events: Box::pin(events),
        }
    }
}

impl std::fmt::Debug for ModelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStream").finish_non_exhaustive()
    }
}
