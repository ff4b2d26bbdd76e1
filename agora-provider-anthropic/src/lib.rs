//! Anthropic Messages API client for the agora bout engine.
//!
//! Implements [`ModelClient`] over the
//! [Messages API](https://docs.anthropic.com/en/api/messages) with
//! streaming always on — the engine consumes every generation as a
//! stream of [`agora_types::ModelEvent`]s.
//!
//! # Usage
//!
//! ```no_run
//! use agora_provider_anthropic::Anthropic;
//!
//! let client = Anthropic::new("sk-ant-...")
//!     .model("claude-haiku-4-5-20251001");
//! ```
//!
//! # Features
//!
//! - SSE parsing of `content_block_delta`, `message_start`/`message_delta`
//!   usage, and provider `error` events
//! - Prompt caching via an ephemeral `cache_control` marker on the system
//!   block (on by default, see [`Anthropic::cache_system_prefix`])
//! - Per-call BYOK key override with scoped secret exposure
//! - HTTP status mapping to the [`agora_types::ModelError`] taxonomy

pub mod client;
pub(crate) mod error;
pub(crate) mod streaming;
pub(crate) mod types;

pub use client::Anthropic;

// Re-export the seam types for convenience
pub use agora_types::{ModelClient, ModelError, ModelEvent, ModelStream};
