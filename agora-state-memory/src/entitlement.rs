//! In-memory [`EntitlementPolicy`].

use std::collections::HashMap;

use agora_types::{EntitlementError, EntitlementPolicy, Tier};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Usage {
    lifetime_free_bouts: u64,
    day: String,
    bouts_today: u32,
}

/// Tier assignments and usage counters in maps behind a `RwLock`.
///
/// Users default to [`Tier::Free`]. The daily counter resets lazily:
/// the first read or write on a new UTC day clears it.
pub struct MemoryEntitlements {
    tiers: RwLock<HashMap<String, Tier>>,
    usage: RwLock<HashMap<String, Usage>>,
}

impl MemoryEntitlements {
    /// Create a policy where everyone is on the free tier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiers: RwLock::new(HashMap::new()),
            usage: RwLock::new(HashMap::new()),
        }
    }

    /// Assign a tier to a user. Test hook.
    pub async fn set_tier(&self, user_id: &str, tier: Tier) {
        self.tiers.write().await.insert(user_id.to_string(), tier);
    }

    /// Backdate a user's lifetime free-bout counter. Test hook for
    /// exercising the first-bout promotion edge.
    pub async fn set_free_bouts_used(&self, user_id: &str, used: u64) {
        let mut usage = self.usage.write().await;
        usage.entry(user_id.to_string()).or_default().lifetime_free_bouts = used;
    }

    /// Pin a user's bouts-today counter. Test hook — a deployment
    /// derives this from its bout rows, which the fake can't see.
    pub async fn set_daily_bouts_used(&self, user_id: &str, used: u32) {
        let mut usage = self.usage.write().await;
        let entry = usage.entry(user_id.to_string()).or_default();
        entry.day = today();
        entry.bouts_today = used;
    }
}

impl Default for MemoryEntitlements {
    fn default() -> Self {
        Self::new()
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[async_trait]
impl EntitlementPolicy for MemoryEntitlements {
    async fn tier_of(&self, user_id: &str) -> Result<Tier, EntitlementError> {
        Ok(self
            .tiers
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or(Tier::Free))
    }

    async fn free_bouts_used(&self, user_id: &str) -> Result<u64, EntitlementError> {
        Ok(self
            .usage
            .read()
            .await
            .get(user_id)
            .map(|usage| usage.lifetime_free_bouts)
            .unwrap_or(0))
    }

    async fn record_free_bout(&self, user_id: &str) -> Result<(), EntitlementError> {
        let mut usage = self.usage.write().await;
        let entry = usage.entry(user_id.to_string()).or_default();
        let day = today();
        if entry.day != day {
            entry.day = day;
            entry.bouts_today = 0;
        }
        entry.lifetime_free_bouts += 1;
        entry.bouts_today += 1;
        Ok(())
    }

    async fn daily_bouts_used(&self, user_id: &str) -> Result<u32, EntitlementError> {
        Ok(self
            .usage
            .read()
            .await
            .get(user_id)
            .filter(|usage| usage.day == today())
            .map(|usage| usage.bouts_today)
            .unwrap_or(0))
    }
}
