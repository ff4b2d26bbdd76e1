//! Shared spending pools — the anonymous intro pool and the free-tier
//! daily pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// A point-in-time view of the shared intro pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Micro-credits still available.
    pub remaining_micro: i64,
    /// True once the pool has been drained.
    pub exhausted: bool,
}

/// The shared pool anonymous bouts draw from.
///
/// The check-then-consume sequence is deliberately racy across callers;
/// [`consume`](SharedPool::consume) is the atomic arbiter and reports a
/// lost race in-band by returning `false`.
#[async_trait]
pub trait SharedPool: Send + Sync {
    /// Current pool status.
    async fn status(&self) -> Result<PoolStatus, PoolError>;

    /// Atomically draw `amount_micro` from the pool. Returns `false`
    /// without mutating anything when the remainder can't cover it.
    async fn consume(&self, amount_micro: i64) -> Result<bool, PoolError>;

    /// Return `amount_micro` to the pool. Used by the failure path to
    /// undo a full draw — partial refunds would let a crash loop drain
    /// the pool through estimate/actual gaps, so the engine never issues
    /// them against this pool.
    async fn refund(&self, amount_micro: i64) -> Result<(), PoolError>;
}

/// Which cap stopped a free-pool draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreePoolCap {
    /// The daily bout-count cap.
    Count,
    /// The daily spend cap.
    Spend,
}

/// Outcome of a free-pool draw attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreeSlotOutcome {
    /// A slot was taken. `day` is the UTC date bucket (`YYYY-MM-DD`) the
    /// draw landed in; settlement must target the same bucket even if
    /// the bout finishes after midnight.
    Consumed {
        /// UTC date bucket the slot was drawn from.
        day: String,
    },
    /// No slot available; the named cap fired. Nothing was consumed.
    Exhausted(FreePoolCap),
}

/// The platform-funded daily pool that free-tier bouts draw from.
///
/// Two caps apply per UTC day, checked together under one lock: a bout
/// count and a spend total. A draw reserves one count slot and the
/// estimated spend; settlement trues the spend up or down against actual
/// cost. On bout failure the count slot is retained (the attempt
/// happened) and only the unspent estimate is returned.
#[async_trait]
pub trait FreeBoutPool: Send + Sync {
    /// Try to take today's slot, reserving `spend_estimate_micro`
    /// against the day's spend cap.
    async fn consume(&self, spend_estimate_micro: i64) -> Result<FreeSlotOutcome, PoolError>;

    /// Apply a signed spend correction to the given day bucket.
    /// Positive deltas record overrun, negative deltas return unspent
    /// estimate. Day totals floor at zero.
    async fn settle(&self, delta_micro: i64, day: &str) -> Result<(), PoolError>;
}
