//! Short-lived, single-read hand-off for BYOK credentials.

use async_trait::async_trait;

use crate::error::StashError;
use crate::secret::ByokCredentials;

/// A credential drop-box.
///
/// BYOK keys never travel in the request body: the caller deposits the
/// key out-of-band before creating the bout, and the validator collects
/// it here. Keyed by user id — BYOK is for authenticated callers only.
/// `take` is destructive (a key can be read at most once) and entries
/// expire on their own (60 s in the in-memory store) so an abandoned
/// deposit never lingers.
#[async_trait]
pub trait KeyStash: Send + Sync {
    /// Deposit credentials for a user, replacing any prior deposit.
    async fn put(&self, user_id: &str, credentials: ByokCredentials) -> Result<(), StashError>;

    /// Remove and return the user's deposited credentials. `None` when
    /// nothing was deposited, it expired, or it was already taken.
    async fn take(&self, user_id: &str) -> Result<Option<ByokCredentials>, StashError>;
}
