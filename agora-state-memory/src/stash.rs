//! In-memory single-read [`KeyStash`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use agora_types::{ByokCredentials, KeyStash, StashError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Default deposit lifetime.
pub const DEFAULT_STASH_TTL: Duration = Duration::from_secs(60);

/// Credential drop-box with lazy expiry.
///
/// A deposit lives until it is taken or until [`DEFAULT_STASH_TTL`]
/// passes, whichever comes first. Expiry is checked at `take` time —
/// there is no background sweeper, expired entries just stop being
/// returnable and get dropped on the next access.
pub struct MemoryKeyStash {
    ttl: Duration,
    deposits: RwLock<HashMap<String, (ByokCredentials, Instant)>>,
}

impl MemoryKeyStash {
    /// Create a stash with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STASH_TTL)
    }

    /// Create a stash with an explicit TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            deposits: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyStash {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStash for MemoryKeyStash {
    async fn put(&self, user_id: &str, credentials: ByokCredentials) -> Result<(), StashError> {
        self.deposits
            .write()
            .await
            .insert(user_id.to_string(), (credentials, Instant::now()));
        Ok(())
    }

    async fn take(&self, user_id: &str) -> Result<Option<ByokCredentials>, StashError> {
        let mut deposits = self.deposits.write().await;
        match deposits.remove(user_id) {
            Some((credentials, deposited_at)) if deposited_at.elapsed() < self.ttl => {
                Ok(Some(credentials))
            }
            _ => Ok(None),
        }
    }
}
