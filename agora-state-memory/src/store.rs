//! In-memory [`BoutStore`].

use std::collections::HashMap;

use agora_types::{Agent, BoutRecord, BoutStatus, BoutStore, NewBout, StoreError, TranscriptEntry};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Bout rows in a `HashMap` behind a `RwLock`.
///
/// The write lock makes [`BoutStore::create_if_absent`] atomic within
/// the process, which is all the atomicity a single-process deployment
/// needs. Data does not survive a restart.
pub struct MemoryBoutStore {
    rows: RwLock<HashMap<String, BoutRecord>>,
}

impl MemoryBoutStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBoutStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(id: &str) -> StoreError {
    StoreError::Other(format!("no bout row: {id}").into())
}

#[async_trait]
impl BoutStore for MemoryBoutStore {
    async fn get(&self, id: &str) -> Result<Option<BoutRecord>, StoreError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn create_if_absent(&self, bout: NewBout) -> Result<BoutRecord, StoreError> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let row = rows.entry(bout.id.clone()).or_insert_with(|| BoutRecord {
            id: bout.id,
            preset_id: bout.preset_id,
            status: BoutStatus::Running,
            transcript: Vec::new(),
            topic: bout.topic,
            response_length: bout.response_length,
            response_format: bout.response_format,
            owner_id: bout.owner_id,
            agent_lineup: None,
            max_turns: None,
            share_line: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        });
        Ok(row.clone())
    }

    async fn save_lineup(
        &self,
        id: &str,
        agents: &[Agent],
        max_turns: u32,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
        row.agent_lineup = Some(agents.to_vec());
        row.max_turns = Some(max_turns);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_running(&self, id: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
        row.status = BoutStatus::Running;
        row.error_message = None;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn append_turn(&self, id: &str, entry: TranscriptEntry) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
        row.transcript.push(entry);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn complete(&self, id: &str, share_line: Option<&str>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
        row.status = BoutStatus::Completed;
        row.share_line = share_line.map(str::to_string);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: &str, message: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
        row.status = BoutStatus::Error;
        row.error_message = Some(message.to_string());
        row.updated_at = Utc::now();
        Ok(())
    }
}
