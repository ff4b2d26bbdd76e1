//! The bout store — how bout rows persist across the engine's lifecycle.

use async_trait::async_trait;

use crate::bout::{BoutRecord, NewBout, TranscriptEntry};
use crate::error::StoreError;

/// Persistence for bout rows.
///
/// Implementations:
/// - MemoryBoutStore: HashMap behind an async lock (testing, ephemeral)
/// - a database-backed store in a deployment
///
/// The trait is deliberately minimal — the engine needs exactly the
/// mutations its lifecycle performs, nothing generic. Two behaviors are
/// load-bearing for correctness and must hold for every implementation:
///
/// 1. [`create_if_absent`](BoutStore::create_if_absent) must be atomic:
///    when two validations race on the same bout id, exactly one insert
///    happens and both callers observe the same row afterwards.
/// 2. [`append_turn`](BoutStore::append_turn) is append-only; completed
///    turns are never discarded, even when the bout later errors.
#[async_trait]
pub trait BoutStore: Send + Sync {
    /// Fetch a bout row by id. Returns `None` if no row exists.
    async fn get(&self, id: &str) -> Result<Option<BoutRecord>, StoreError>;

    /// Insert a row in `running` status with an empty transcript, or
    /// return the existing row untouched. Never overwrites.
    async fn create_if_absent(&self, bout: NewBout) -> Result<BoutRecord, StoreError>;

    /// Persist a custom roster and turn budget on the row. Called once,
    /// at creation time, for arena bouts only — it is what makes the
    /// lineup recoverable on retry.
    async fn save_lineup(
        &self,
        id: &str,
        agents: &[crate::preset::Agent],
        max_turns: u32,
    ) -> Result<(), StoreError>;

    /// Set status to `running`. Re-affirms the claim on a retried attempt
    /// whose previous run died in `error` state.
    async fn mark_running(&self, id: &str) -> Result<(), StoreError>;

    /// Append one completed turn to the transcript.
    async fn append_turn(&self, id: &str, entry: TranscriptEntry) -> Result<(), StoreError>;

    /// Set status to `completed` and store the share line. The transcript
    /// was already appended turn by turn.
    async fn complete(&self, id: &str, share_line: Option<&str>) -> Result<(), StoreError>;

    /// Set status to `error` with the failure message. Whatever turns
    /// were appended before the failure stay in place.
    async fn fail(&self, id: &str, message: &str) -> Result<(), StoreError>;
}
