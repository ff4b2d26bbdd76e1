//! Live bout events and the sink they flow out through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// Roster metadata for a turn, emitted before its text stream opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnMeta {
    /// Zero-based turn index.
    pub turn: u32,
    /// Speaking agent's id.
    pub agent_id: String,
    /// Speaking agent's display name.
    pub agent_name: String,
    /// Display color (the agent's own, or the default).
    pub color: String,
}

/// Payload of the share-line event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLineText {
    /// The generated share line.
    pub text: String,
}

/// One event in a bout's live output sequence.
///
/// Serializes to the streaming wire shape directly; per turn the order
/// is `TurnStart → Turn → TextStart → TextDelta* → TextEnd`, and a
/// single `ShareLine` may follow the final turn. The id on the text
/// events is the turn id, `{bout_id}-{turn}-{agent_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BoutEvent {
    /// A turn is starting.
    #[serde(rename = "start")]
    TurnStart {
        /// Turn id.
        #[serde(rename = "messageId")]
        message_id: String,
    },
    /// Who is speaking this turn.
    #[serde(rename = "data-turn")]
    Turn {
        /// Roster metadata.
        data: TurnMeta,
    },
    /// The turn's text stream opened.
    TextStart {
        /// Turn id.
        id: String,
    },
    /// An incremental text fragment.
    TextDelta {
        /// Turn id.
        id: String,
        /// The fragment, verbatim.
        delta: String,
    },
    /// The turn's text stream closed.
    TextEnd {
        /// Turn id.
        id: String,
    },
    /// Post-bout promotional line.
    #[serde(rename = "data-share-line")]
    ShareLine {
        /// The line.
        data: ShareLineText,
    },
}

/// Output port for live events.
///
/// Emission failures are terminal for the bout: a closed sink means
/// nobody is watching, and the engine aborts through the normal
/// failure-settlement path rather than generating into the void.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event, in order.
    async fn emit(&self, event: BoutEvent) -> Result<(), SinkError>;
}
