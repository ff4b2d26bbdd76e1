//! The entitlement policy — who is on what tier, and their usage counters.

use async_trait::async_trait;

use crate::error::EntitlementError;
use crate::tier::Tier;

/// Identity → tier, plus the usage counters tier quotas are enforced
/// against.
///
/// Model access itself is pure tier data ([`Tier::can_access`]); this
/// trait covers the parts that need a backend: subscription state and
/// per-user counters. The lifetime free-bout counter exists for exactly
/// one reason — the first-bout promotion fires only when it reads zero.
#[async_trait]
pub trait EntitlementPolicy: Send + Sync {
    /// The tier the user's subscription maps to.
    async fn tier_of(&self, user_id: &str) -> Result<Tier, EntitlementError>;

    /// Lifetime count of platform-funded free bouts this user ran.
    async fn free_bouts_used(&self, user_id: &str) -> Result<u64, EntitlementError>;

    /// Record one more platform-funded free bout. Called after the free
    /// pool draw succeeds, before execution.
    async fn record_free_bout(&self, user_id: &str) -> Result<(), EntitlementError>;

    /// Bouts started today (UTC). Compared against
    /// [`Tier::bouts_per_day`].
    async fn daily_bouts_used(&self, user_id: &str) -> Result<u32, EntitlementError>;
}
