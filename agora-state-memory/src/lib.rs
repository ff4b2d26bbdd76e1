#![deny(missing_docs)]
//! In-memory implementations of every `agora-types` collaborator trait.
//!
//! `HashMap`s behind `tokio::sync::RwLock`s, nothing persisted. The
//! atomicity each trait demands (conditional pre-authorization, pool
//! draws, create-if-absent) holds within one process because every
//! check-and-mutate runs under a single write lock — which makes these
//! the reference semantics for database-backed implementations, and
//! makes a full engine testable without any service running.
//!
//! Several types carry extra `pub` methods the traits don't have
//! (`set_balance`, `set_tier`, `with_caps`, ...). Those are test hooks
//! for steering a scenario into the state under test.

mod entitlement;
mod ledger;
mod limit;
mod pool;
mod stash;
mod store;

pub use entitlement::MemoryEntitlements;
pub use ledger::{LedgerEntry, MemoryLedger, STARTING_BALANCE_MICRO};
pub use limit::MemoryRateLimiter;
pub use pool::{
    DEFAULT_DAILY_FREE_BOUTS, DEFAULT_DAILY_FREE_SPEND_MICRO, DEFAULT_INTRO_DRAIN_MICRO_PER_MIN,
    DEFAULT_INTRO_POOL_MICRO, MemoryFreeBoutPool, MemorySharedPool,
};
pub use stash::{DEFAULT_STASH_TTL, MemoryKeyStash};
pub use store::MemoryBoutStore;
