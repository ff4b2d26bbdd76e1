//! In-memory [`SharedPool`] and [`FreeBoutPool`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use agora_types::{FreeBoutPool, FreePoolCap, FreeSlotOutcome, PoolError, PoolStatus, SharedPool};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Default intro pool funding: 15 000 credits (£150).
pub const DEFAULT_INTRO_POOL_MICRO: i64 = 1_500_000;

/// Default intro pool drain: 1 credit per minute.
pub const DEFAULT_INTRO_DRAIN_MICRO_PER_MIN: i64 = 100;

struct SharedPoolState {
    initial_micro: i64,
    claimed_micro: i64,
    drain_micro_per_min: i64,
    started_at: Instant,
}

impl SharedPoolState {
    /// Whole minutes only, so a freshly built pool reads at full capacity.
    fn remaining_micro(&self) -> i64 {
        let elapsed_min = self.started_at.elapsed().as_secs() as i64 / 60;
        (self.initial_micro - self.claimed_micro - elapsed_min * self.drain_micro_per_min).max(0)
    }
}

/// The anonymous intro pool.
///
/// Remaining credit is `initial - claimed - drain`, where drain grows
/// with wall-clock minutes since the pool was built. The drain runs
/// whether or not anyone claims, so an idle pool still empties.
pub struct MemorySharedPool {
    state: RwLock<SharedPoolState>,
}

impl MemorySharedPool {
    /// Create a pool holding [`DEFAULT_INTRO_POOL_MICRO`] draining at
    /// [`DEFAULT_INTRO_DRAIN_MICRO_PER_MIN`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_remaining(DEFAULT_INTRO_POOL_MICRO)
    }

    /// Create a pool holding exactly `remaining_micro` right now.
    #[must_use]
    pub fn with_remaining(remaining_micro: i64) -> Self {
        Self {
            state: RwLock::new(SharedPoolState {
                initial_micro: remaining_micro,
                claimed_micro: 0,
                drain_micro_per_min: DEFAULT_INTRO_DRAIN_MICRO_PER_MIN,
                started_at: Instant::now(),
            }),
        }
    }

    /// Override the drain rate.
    #[must_use]
    pub fn with_drain_rate(mut self, micro_per_min: i64) -> Self {
        self.state.get_mut().drain_micro_per_min = micro_per_min;
        self
    }

    /// Shift the pool's start time into the past so elapsed-time drain
    /// can be exercised without waiting. Test hook.
    pub async fn backdate_start(&self, by: Duration) {
        let mut state = self.state.write().await;
        if let Some(earlier) = state.started_at.checked_sub(by) {
            state.started_at = earlier;
        }
    }
}

impl Default for MemorySharedPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedPool for MemorySharedPool {
    async fn status(&self) -> Result<PoolStatus, PoolError> {
        let remaining_micro = self.state.read().await.remaining_micro();
        Ok(PoolStatus {
            remaining_micro,
            exhausted: remaining_micro <= 0,
        })
    }

    async fn consume(&self, amount_micro: i64) -> Result<bool, PoolError> {
        let mut state = self.state.write().await;
        if state.remaining_micro() < amount_micro {
            return Ok(false);
        }
        state.claimed_micro += amount_micro;
        Ok(true)
    }

    async fn refund(&self, amount_micro: i64) -> Result<(), PoolError> {
        let mut state = self.state.write().await;
        // Floor at zero: a refund can restore at most what was claimed,
        // never push remaining above capacity.
        state.claimed_micro = (state.claimed_micro - amount_micro).max(0);
        Ok(())
    }
}

/// Default free-tier slots per UTC day.
pub const DEFAULT_DAILY_FREE_BOUTS: u32 = 200;

/// Default free-tier spend budget per UTC day: £5.
pub const DEFAULT_DAILY_FREE_SPEND_MICRO: i64 = 50_000;

#[derive(Default)]
struct DayBucket {
    bouts: u32,
    spend_micro: i64,
}

/// Day-bucketed free-tier pool.
///
/// Both caps are checked and the reservation recorded under one write
/// lock, so a burst of free-tier bouts can't collectively overshoot
/// either cap. Old day buckets are kept (they're tiny) so late
/// settlements against a previous day still land somewhere.
pub struct MemoryFreeBoutPool {
    max_daily_bouts: u32,
    max_daily_spend_micro: i64,
    days: RwLock<HashMap<String, DayBucket>>,
}

impl MemoryFreeBoutPool {
    /// Create a pool with the default caps.
    #[must_use]
    pub fn new() -> Self {
        Self::with_caps(DEFAULT_DAILY_FREE_BOUTS, DEFAULT_DAILY_FREE_SPEND_MICRO)
    }

    /// Create a pool with explicit caps.
    #[must_use]
    pub fn with_caps(max_daily_bouts: u32, max_daily_spend_micro: i64) -> Self {
        Self {
            max_daily_bouts,
            max_daily_spend_micro,
            days: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryFreeBoutPool {
    fn default() -> Self {
        Self::new()
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[async_trait]
impl FreeBoutPool for MemoryFreeBoutPool {
    async fn consume(&self, spend_estimate_micro: i64) -> Result<FreeSlotOutcome, PoolError> {
        let day = today();
        let mut days = self.days.write().await;
        let bucket = days.entry(day.clone()).or_default();
        if bucket.bouts >= self.max_daily_bouts {
            return Ok(FreeSlotOutcome::Exhausted(FreePoolCap::Count));
        }
        if bucket.spend_micro + spend_estimate_micro > self.max_daily_spend_micro {
            return Ok(FreeSlotOutcome::Exhausted(FreePoolCap::Spend));
        }
        bucket.bouts += 1;
        bucket.spend_micro += spend_estimate_micro;
        Ok(FreeSlotOutcome::Consumed { day })
    }

    async fn settle(&self, delta_micro: i64, day: &str) -> Result<(), PoolError> {
        let mut days = self.days.write().await;
        let bucket = days.entry(day.to_string()).or_default();
        bucket.spend_micro = (bucket.spend_micro + delta_micro).max(0);
        Ok(())
    }
}
