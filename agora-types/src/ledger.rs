//! The credit ledger — per-user balances in micro-credits.

use async_trait::async_trait;

use crate::error::LedgerError;

/// Per-user credit balances, denominated in micro-credits
/// (1 credit = 100 micro = £0.01).
///
/// The engine's financial protocol is preauthorize-then-settle:
/// the validator reserves the estimated cost up front, and settlement
/// applies a single signed correction once actual cost is known, so that
/// `preauthorized + Σ(settlement deltas) == actual cost` over the bout's
/// lifetime. Failed bouts refund the unconsumed remainder through the
/// same `settle` call with a negative delta.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Current balance in micro-credits.
    async fn balance_micro(&self, user_id: &str) -> Result<i64, LedgerError>;

    /// Atomically reserve `amount_micro` against the balance. Returns
    /// `false` (without mutating anything) when the balance can't cover
    /// it — insufficiency is an in-band outcome, not an error.
    async fn preauthorize(
        &self,
        user_id: &str,
        amount_micro: i64,
        reference: &str,
    ) -> Result<bool, LedgerError>;

    /// Apply a signed correction: positive deltas charge further,
    /// negative deltas refund. `reference` ties the movement to its bout
    /// for audit. Balances floor at zero rather than going negative.
    async fn settle(
        &self,
        user_id: &str,
        delta_micro: i64,
        reference: &str,
    ) -> Result<(), LedgerError>;
}
