//! In-memory [`CreditLedger`].

use std::collections::HashMap;

use agora_types::{CreditLedger, LedgerError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Micro-credits granted to a user on first sight. 500 credits (£5),
/// the sign-up grant.
pub const STARTING_BALANCE_MICRO: i64 = 50_000;

/// One recorded balance movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Whose balance moved.
    pub user_id: String,
    /// The amount passed to the call: the reserved amount for a
    /// preauthorization, the signed correction for a settlement.
    pub delta_micro: i64,
    /// `"preauthorize"` or `"settle"`.
    pub kind: &'static str,
    /// The bout the movement belongs to.
    pub reference: String,
}

struct LedgerState {
    balances: HashMap<String, i64>,
    log: Vec<LedgerEntry>,
}

/// Per-user balances plus an append-only movement log, behind one
/// `RwLock`.
///
/// Unknown users start at [`STARTING_BALANCE_MICRO`]. `preauthorize` is
/// conditional-and-atomic under the write lock; balances floor at zero
/// on settle so an over-refund can't mint credit. Declined
/// preauthorizations move nothing and are not logged.
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    /// Create a ledger where every user starts with the sign-up grant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState {
                balances: HashMap::new(),
                log: Vec::new(),
            }),
        }
    }

    /// Set a user's balance directly, bypassing the log. Test hook.
    pub async fn set_balance(&self, user_id: &str, balance_micro: i64) {
        self.state
            .write()
            .await
            .balances
            .insert(user_id.to_string(), balance_micro);
    }

    /// Every movement applied so far, in order.
    pub async fn transactions(&self) -> Vec<LedgerEntry> {
        self.state.read().await.log.clone()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CreditLedger for MemoryLedger {
    async fn balance_micro(&self, user_id: &str) -> Result<i64, LedgerError> {
        Ok(*self
            .state
            .read()
            .await
            .balances
            .get(user_id)
            .unwrap_or(&STARTING_BALANCE_MICRO))
    }

    async fn preauthorize(
        &self,
        user_id: &str,
        amount_micro: i64,
        reference: &str,
    ) -> Result<bool, LedgerError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let balance = state
            .balances
            .entry(user_id.to_string())
            .or_insert(STARTING_BALANCE_MICRO);
        if *balance < amount_micro {
            return Ok(false);
        }
        *balance -= amount_micro;
        state.log.push(LedgerEntry {
            user_id: user_id.to_string(),
            delta_micro: amount_micro,
            kind: "preauthorize",
            reference: reference.to_string(),
        });
        Ok(true)
    }

    async fn settle(
        &self,
        user_id: &str,
        delta_micro: i64,
        reference: &str,
    ) -> Result<(), LedgerError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let balance = state
            .balances
            .entry(user_id.to_string())
            .or_insert(STARTING_BALANCE_MICRO);
        *balance = (*balance - delta_micro).max(0);
        state.log.push(LedgerEntry {
            user_id: user_id.to_string(),
            delta_micro,
            kind: "settle",
            reference: reference.to_string(),
        });
        Ok(())
    }
}
