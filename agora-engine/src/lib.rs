//! # agora-engine — bout orchestration
//!
//! The engine behind a bout: validation, model-facing execution, and
//! financial settlement. Everything stateful or external (persistence,
//! ledgers, pools, rate limits, entitlements, the model provider, the
//! event stream) sits behind the `agora-types` collaborator traits, so
//! the whole lifecycle is testable with in-memory fakes and deployable
//! against real services without touching this crate.
//!
//! ## Lifecycle
//!
//! ```text
//! BoutRequest + Caller
//!        v
//!   validate()   ordered gates; reserves credits/pool slots; creates row
//!        v
//!   ExecutionPlan
//!        v
//!   execute()    round-robin turn loop; streams BoutEvents; persists
//!        |       each turn; generates a share line
//!        v
//!   settlement   trues reservations up against actual cost (both paths)
//! ```
//!
//! `validate` is the only place a request can be refused; everything
//! after it compensates instead of rejecting. A plan that was issued
//! must be executed — its reservations are only released by settlement.

#![deny(missing_docs)]

mod catalog;
mod config;
mod context;
mod cost;
mod executor;
mod prompt;
mod refusal;
mod settle;
mod share;
mod trace;
mod validator;

pub use catalog::StaticCatalog;
pub use config::{CostModel, EngineConfig};

use std::sync::Arc;

use agora_types::{
    BoutStore, CreditLedger, EntitlementPolicy, FreeBoutPool, KeyStash, ModelClient,
    PresetCatalog, RateLimiter, SharedPool,
};

/// The bout engine: one instance per process, shared across requests.
///
/// Construct with [`BoutEngine::new`], then drive bouts through
/// [`BoutEngine::validate`] and [`BoutEngine::execute`]. The engine
/// holds no per-bout state of its own; everything mutable lives behind
/// the collaborator traits, which is what makes concurrent bouts and
/// multiple engine instances safe.
pub struct BoutEngine {
    pub(crate) store: Arc<dyn BoutStore>,
    pub(crate) ledger: Arc<dyn CreditLedger>,
    pub(crate) shared_pool: Arc<dyn SharedPool>,
    pub(crate) free_pool: Arc<dyn FreeBoutPool>,
    pub(crate) limiter: Arc<dyn RateLimiter>,
    pub(crate) entitlements: Arc<dyn EntitlementPolicy>,
    pub(crate) catalog: Arc<dyn PresetCatalog>,
    pub(crate) client: Arc<dyn ModelClient>,
    pub(crate) stash: Option<Arc<dyn KeyStash>>,
    pub(crate) config: EngineConfig,
}

impl BoutEngine {
    /// Assemble an engine from its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn BoutStore>,
        ledger: Arc<dyn CreditLedger>,
        shared_pool: Arc<dyn SharedPool>,
        free_pool: Arc<dyn FreeBoutPool>,
        limiter: Arc<dyn RateLimiter>,
        entitlements: Arc<dyn EntitlementPolicy>,
        catalog: Arc<dyn PresetCatalog>,
        client: Arc<dyn ModelClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            shared_pool,
            free_pool,
            limiter,
            entitlements,
            catalog,
            client,
            stash: None,
            config,
        }
    }

    /// Attach a BYOK key stash. Without one every BYOK request is
    /// rejected with `ByokKeyMissing`, which is the right behavior for
    /// deployments that don't accept caller keys.
    #[must_use]
    pub fn with_key_stash(mut self, stash: Arc<dyn KeyStash>) -> Self {
        self.stash = Some(stash);
        self
    }
}
