//! Error types for each seam.
//!
//! [`BoutRejection`] is the validator's typed rejection (a stable kind plus
//! an HTTP-style status); [`ExecuteError`] is anything that aborts the turn
//! loop. The remaining enums belong to individual collaborator traits.

use thiserror::Error;

use crate::pool::FreePoolCap;
use crate::tier::{EffectiveTier, UpgradeHint};

/// Why the validator refused to produce an execution plan.
///
/// Every variant maps to a stable wire kind ([`BoutRejection::kind`]) and
/// an HTTP-style status ([`BoutRejection::status`]). Rejections fired
/// before the financial gates leave no reservation behind; later gates'
/// reservations are compensated by settlement, never rolled back here.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BoutRejection {
    /// The request body wasn't valid JSON or wasn't an object.
    #[error("invalid request body: {0}")]
    Malformed(String),

    /// No bout id was supplied.
    #[error("missing boutId")]
    MissingBoutId,

    /// No preset id was supplied and none could be recovered from an
    /// existing row.
    #[error("missing presetId")]
    MissingPresetId,

    /// The topic exceeds the 500-character cap.
    #[error("topic must be 500 characters or fewer")]
    TopicTooLong,

    /// The topic matched the disallowed-content pattern (markup/script
    /// injection, script-URI schemes).
    #[error("topic contains disallowed content")]
    UnsafeContent,

    /// A bout with this id is already in flight (running, with turns
    /// already appended).
    #[error("bout is already running")]
    AlreadyRunning,

    /// A bout with this id already finished.
    #[error("bout has already completed")]
    AlreadyCompleted,

    /// The preset id resolved nowhere — not in the catalog, and no
    /// persisted arena lineup to reconstruct from.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// The bout row belongs to a different caller.
    #[error("bout belongs to another caller")]
    NotYourBout,

    /// The sliding-window rate limit fired.
    #[error("rate limit exceeded: max {limit} bouts per hour")]
    RateLimited {
        /// The caller's hourly limit.
        limit: u32,
        /// Seconds until the window resets.
        retry_after_secs: u64,
        /// The tier the limit was computed for.
        tier: EffectiveTier,
        /// Tiers worth upgrading to, with their limits.
        upgrades: Vec<UpgradeHint>,
    },

    /// A tier quota (daily or lifetime bout cap) is exhausted.
    #[error("{reason}")]
    QuotaExhausted {
        /// Human-readable explanation naming the cap.
        reason: String,
    },

    /// The free-tier daily pool is exhausted.
    #[error("daily free bout pool exhausted")]
    FreePoolExhausted {
        /// Which cap fired (bout count or spend).
        cap: FreePoolCap,
    },

    /// The caller asked for BYOK but no key was waiting in the stash.
    #[error("BYOK key required")]
    ByokKeyMissing,

    /// The caller's tier doesn't include the requested model.
    #[error("your plan does not include access to this model")]
    ModelNotAllowed,

    /// Anonymous caller and the shared pool can't cover the estimate —
    /// signing in is the way forward.
    #[error("sign in to continue")]
    SignInRequired,

    /// The shared pool was consumed out from under us between the status
    /// check and the draw.
    #[error("shared pool exhausted")]
    PoolExhausted,

    /// The caller's balance can't cover the pre-authorization.
    #[error("insufficient credits")]
    InsufficientCredits,

    /// A collaborator the validator depends on is down (row
    /// materialization failure, store unreachable).
    #[error("service temporarily unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BoutRejection {
    /// HTTP-style status for transports that speak it.
    pub fn status(&self) -> u16 {
        match self {
            BoutRejection::Malformed(_)
            | BoutRejection::MissingBoutId
            | BoutRejection::MissingPresetId
            | BoutRejection::TopicTooLong
            | BoutRejection::UnsafeContent
            | BoutRejection::ByokKeyMissing => 400,
            BoutRejection::SignInRequired => 401,
            BoutRejection::QuotaExhausted { .. }
            | BoutRejection::ModelNotAllowed
            | BoutRejection::PoolExhausted
            | BoutRejection::InsufficientCredits => 402,
            BoutRejection::NotYourBout => 403,
            BoutRejection::UnknownPreset(_) => 404,
            BoutRejection::AlreadyRunning | BoutRejection::AlreadyCompleted => 409,
            BoutRejection::RateLimited { .. } | BoutRejection::FreePoolExhausted { .. } => 429,
            BoutRejection::Unavailable(_) => 503,
        }
    }

    /// Stable wire identifier for the rejection kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BoutRejection::Malformed(_) => "malformed",
            BoutRejection::MissingBoutId => "missing-bout-id",
            BoutRejection::MissingPresetId => "missing-preset-id",
            BoutRejection::TopicTooLong => "topic-too-long",
            BoutRejection::UnsafeContent => "unsafe-content",
            BoutRejection::AlreadyRunning => "already-running",
            BoutRejection::AlreadyCompleted => "already-completed",
            BoutRejection::UnknownPreset(_) => "unknown-preset",
            BoutRejection::NotYourBout => "forbidden",
            BoutRejection::RateLimited { .. } => "rate-limited",
            BoutRejection::QuotaExhausted { .. } => "quota-exhausted",
            BoutRejection::FreePoolExhausted { .. } => "free-pool-exhausted",
            BoutRejection::ByokKeyMissing => "byok-key-missing",
            BoutRejection::ModelNotAllowed => "model-not-allowed",
            BoutRejection::SignInRequired => "sign-in-required",
            BoutRejection::PoolExhausted => "pool-exhausted",
            BoutRejection::InsufficientCredits => "insufficient-credits",
            BoutRejection::Unavailable(_) => "unavailable",
        }
    }
}

/// Anything that aborts the turn loop. Always triggers the failure-path
/// settlement (partial transcript persisted, reservations refunded) before
/// propagating.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Even a zero-history prompt exceeds the model's input budget.
    /// Raised before the model call — no cost was incurred for the turn.
    #[error("prompt exceeds model context budget ({estimated} estimated tokens > {budget})")]
    ContextBudgetExceeded {
        /// Estimated prompt tokens after truncation.
        estimated: u64,
        /// The model's input token budget.
        budget: u64,
    },

    /// The plan's roster was empty. Validated upstream; kept as a typed
    /// error rather than a panic.
    #[error("preset {0} has no agents")]
    EmptyRoster(String),

    /// Starting a model call failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model stream failed mid-generation.
    #[error("model stream failed: {0}")]
    Stream(crate::stream::StreamFault),

    /// The event sink refused an event (client gone). Aborts the bout
    /// like any other mid-loop failure.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A persistence operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A pool operation failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Errors from model providers when starting a generation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// Connection-level failure before or during the request.
    #[error("network error: {0}")]
    Network(String),

    /// The provider rate-limited the request.
    #[error("provider rate limited")]
    RateLimited {
        /// Provider-suggested wait, when given.
        retry_after_secs: Option<u64>,
    },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The provider reported a transient outage.
    #[error("provider unavailable: {0}")]
    ServiceUnavailable(String),

    /// The key was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The provider rejected the request shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested model doesn't exist upstream.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Whether retrying the request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::Network(_)
                | ModelError::RateLimited { .. }
                | ModelError::Timeout
                | ModelError::ServiceUnavailable(_)
        )
    }
}

/// Persistence errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Serialization of a row failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Credit ledger errors. Insufficiency is NOT an error — `preauthorize`
/// reports it in-band so the validator can map it to a typed rejection.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger backend is unreachable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Shared-pool errors. Exhaustion is reported in-band by `consume`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool backend is unreachable.
    #[error("pool unavailable: {0}")]
    Unavailable(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Entitlement lookups gone wrong (the policy backend, not the policy).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The policy backend is unreachable.
    #[error("entitlements unavailable: {0}")]
    Unavailable(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Event sink delivery failure — usually the client went away.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SinkError {
    /// The receiving end is gone.
    #[error("event sink closed: {0}")]
    Closed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// BYOK stash errors. An absent or expired key is reported in-band by
/// `take` — only backend failures land here.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StashError {
    /// The stash backend is unreachable.
    #[error("key stash unavailable: {0}")]
    Unavailable(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
