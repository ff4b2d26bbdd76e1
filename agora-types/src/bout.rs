//! The bout row — the unit of work and its persisted shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::preset::Agent;
use crate::response::{ResponseFormat, ResponseLength};

/// Lifecycle status of a bout.
///
/// The only legal transitions are `Running → Completed` and
/// `Running → Error`. A row in `Error` state (or in `Running` with an
/// empty transcript, the crash-before-first-append window) is the sole
/// legitimate retry entry point; the validator treats anything else
/// as a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoutStatus {
    /// Execution claimed or in flight.
    Running,
    /// Finished; transcript and share line are final.
    Completed,
    /// Aborted mid-loop; transcript holds whatever turns completed.
    Error,
}

/// One agent's contribution to a bout. Written exactly once per turn,
/// strictly ordered by `turn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Zero-based turn index.
    pub turn: u32,
    /// Id of the agent that spoke.
    pub agent_id: String,
    /// Display name of the agent at the time of the turn.
    pub agent_name: String,
    /// The generated text, verbatim.
    pub text: String,
}

/// A persisted bout row as the engine sees it.
///
/// Created by the validator via [`crate::BoutStore::create_if_absent`],
/// mutated only by the executor, never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoutRecord {
    /// Client-supplied id; doubles as the idempotency key everywhere.
    pub id: String,
    /// Preset the bout was created against (may be the arena sentinel).
    pub preset_id: String,
    /// Lifecycle status.
    pub status: BoutStatus,
    /// Ordered transcript; append-only.
    pub transcript: Vec<TranscriptEntry>,
    /// Debate topic, if one was supplied.
    pub topic: Option<String>,
    /// Response length the bout was created with.
    pub response_length: ResponseLength,
    /// Response format the bout was created with.
    pub response_format: ResponseFormat,
    /// Owning caller, when the bout was created by an authenticated user.
    pub owner_id: Option<String>,
    /// Custom roster persisted at creation time for arena bouts.
    pub agent_lineup: Option<Vec<Agent>>,
    /// Turn budget override persisted with an arena lineup.
    pub max_turns: Option<u32>,
    /// Promotional share line, present once a bout completed with one.
    pub share_line: Option<String>,
    /// Why the bout errored, when `status` is [`BoutStatus::Error`].
    pub error_message: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Fields for the idempotent row materialization step.
///
/// The store inserts the row with [`BoutStatus::Running`] and an empty
/// transcript, and must leave an existing row untouched (create-if-absent) —
/// that property is what makes concurrent validations of the same bout id
/// safe.
#[derive(Debug, Clone)]
pub struct NewBout {
    /// Client-supplied bout id.
    pub id: String,
    /// Resolved preset id.
    pub preset_id: String,
    /// Trimmed topic, when non-empty.
    pub topic: Option<String>,
    /// Resolved response length.
    pub response_length: ResponseLength,
    /// Resolved response format.
    pub response_format: ResponseFormat,
    /// Caller identity, when authenticated.
    pub owner_id: Option<String>,
}

/// What a finished bout hands back to a synchronous caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoutOutcome {
    /// The full transcript, one entry per executed turn.
    pub transcript: Vec<TranscriptEntry>,
    /// Promotional share line, when generation succeeded.
    pub share_line: Option<String>,
    /// Total input tokens across all turns (exact where the provider
    /// reported usage, estimated otherwise).
    pub input_tokens: u64,
    /// Total output tokens across all turns.
    pub output_tokens: u64,
}
