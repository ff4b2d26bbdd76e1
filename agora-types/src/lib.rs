//! # agora-types — protocol types for the agora bout engine
//!
//! This crate defines the data model and the collaborator seams the bout
//! engine is written against. The engine itself lives in `agora-engine`;
//! everything stateful or external sits behind a trait defined here.
//!
//! ## The collaborators
//!
//! | Trait | What it owns |
//! |-------|--------------|
//! | [`BoutStore`] | the bout row: create-if-absent, status transitions, transcript |
//! | [`CreditLedger`] | per-user balances: preauthorize / settle / refund, reference-keyed |
//! | [`SharedPool`] | the anonymous intro pool: atomic consume / refund |
//! | [`FreeBoutPool`] | the free-tier daily pool: slot + spend caps, day-keyed settle |
//! | [`RateLimiter`] | sliding-window request throttling |
//! | [`EntitlementPolicy`] | identity → tier, lifetime and daily usage counters |
//! | [`PresetCatalog`] | static preset lookup |
//! | [`ModelClient`] | model id + credentials → incremental text stream + usage |
//! | [`EventSink`] | optional output port for live turn events |
//! | [`KeyStash`] | short-lived, single-read BYOK credential hand-off |
//!
//! ## Design principle
//!
//! Every trait is operation-defined, not mechanism-defined. `CreditLedger::
//! preauthorize` means "atomically reserve this amount if the balance
//! covers it" — not "run this SQL". An in-memory map, a Postgres row with
//! a conditional UPDATE, and a ledger service all implement the same trait,
//! which is what lets the engine's correctness survive multiple concurrent
//! service instances: the atomicity lives behind the seam.
//!
//! All monetary amounts at these seams are integer **micro-credits**
//! (1 credit = 100 micro-credits) so financial state never touches
//! floating point. Decimal cost arithmetic happens inside the engine and
//! is converted at the boundary.

#![deny(missing_docs)]

pub mod bout;
pub mod catalog;
pub mod client;
pub mod entitlement;
pub mod error;
pub mod event;
pub mod ledger;
pub mod limit;
pub mod model;
pub mod plan;
pub mod pool;
pub mod preset;
pub mod response;
pub mod secret;
pub mod stash;
pub mod store;
pub mod stream;
pub mod tier;

pub use bout::{BoutOutcome, BoutRecord, BoutStatus, NewBout, TranscriptEntry};
pub use catalog::PresetCatalog;
pub use client::{GenerationRequest, ModelClient};
pub use entitlement::EntitlementPolicy;
pub use error::{
    BoutRejection, EntitlementError, ExecuteError, LedgerError, ModelError, PoolError, SinkError,
    StashError, StoreError,
};
pub use event::{BoutEvent, EventSink, ShareLineText, TurnMeta};
pub use ledger::CreditLedger;
pub use limit::{RateDecision, RateLimiter};
pub use model::{ByokProvider, ModelFamily, ModelId};
pub use plan::{BoutRequest, Caller, ExecutionPlan, ResolvedModel};
pub use pool::{FreeBoutPool, FreePoolCap, FreeSlotOutcome, PoolStatus, SharedPool};
pub use preset::{Agent, Preset, PresetTier, ARENA_PRESET_ID, DEFAULT_AGENT_COLOR};
pub use response::{ResponseFormat, ResponseLength};
pub use secret::{ByokCredentials, SecretString};
pub use stash::KeyStash;
pub use store::BoutStore;
pub use stream::{ModelEvent, ModelStream, StreamFault, TokenUsage};
pub use tier::{EffectiveTier, Tier, UpgradeHint};
