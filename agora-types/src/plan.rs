//! The inbound request, the caller, and the validator's output.

use serde::Deserialize;

use crate::error::BoutRejection;
use crate::model::ModelId;
use crate::preset::Preset;
use crate::response::{ResponseFormat, ResponseLength};
use crate::secret::ByokCredentials;
use crate::tier::EffectiveTier;

/// The inbound bout request body.
///
/// Bring-your-own-key material never travels here — it arrives out-of-band
/// through the [`crate::KeyStash`]. `model` may be a platform model id or
/// the literal `"byok"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoutRequest {
    /// Client-supplied bout id; the idempotency key.
    #[serde(default)]
    pub bout_id: Option<String>,
    /// Catalog preset id, or the arena sentinel. May be omitted on a
    /// retry — the validator backfills it from the existing row.
    #[serde(default)]
    pub preset_id: Option<String>,
    /// Debate topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Explicit model request (platform id or `"byok"`).
    #[serde(default)]
    pub model: Option<String>,
    /// Response length key.
    #[serde(default)]
    pub length: Option<String>,
    /// Response format key.
    #[serde(default)]
    pub format: Option<String>,
}

impl BoutRequest {
    /// Parse a raw JSON body. Malformed JSON or a non-object body is the
    /// first validation gate.
    pub fn from_json(body: &str) -> Result<BoutRequest, BoutRejection> {
        serde_json::from_str(body).map_err(|e| BoutRejection::Malformed(e.to_string()))
    }
}

/// Who is asking. Authentication happens upstream; the engine receives
/// the outcome.
#[derive(Debug, Clone)]
pub struct Caller {
    /// Verified user id, when authenticated.
    pub user_id: Option<String>,
    /// Stable client fingerprint (IP-derived upstream) used to key
    /// anonymous rate limits.
    pub fingerprint: String,
    /// Raw research-key header value, when present. Compared in constant
    /// time against the configured key; a match bypasses rate limits and
    /// all financial gates.
    pub research_key: Option<String>,
    /// Correlation id threaded through logs and the bout span.
    pub request_id: String,
}

impl Caller {
    /// An anonymous caller with the given fingerprint.
    pub fn anonymous(fingerprint: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            fingerprint: fingerprint.into(),
            research_key: None,
            request_id: request_id.into(),
        }
    }

    /// An authenticated caller.
    pub fn user(
        user_id: impl Into<String>,
        fingerprint: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            fingerprint: fingerprint.into(),
            research_key: None,
            request_id: request_id.into(),
        }
    }

    /// The rate-limit key: user id when authenticated, fingerprint
    /// otherwise.
    pub fn limit_key(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.fingerprint)
    }
}

/// The model a bout will run against, fixed at validation time.
///
/// Not `Clone`: BYOK credentials must not be duplicable.
pub enum ResolvedModel {
    /// A platform-funded model.
    Platform(ModelId),
    /// Caller-funded call with caller-supplied credentials.
    Byok(ByokCredentials),
}

impl ResolvedModel {
    /// The provider-facing model identifier this bout will request.
    /// BYOK without an explicit model falls back to the free default's id
    /// (the upstream resolves its own default in that case).
    pub fn wire_id(&self) -> &str {
        match self {
            ResolvedModel::Platform(model) => model.as_str(),
            ResolvedModel::Byok(creds) => creds
                .model
                .as_deref()
                .unwrap_or(ModelId::FREE_DEFAULT.as_str()),
        }
    }

    /// Whether this is a caller-funded call.
    pub fn is_byok(&self) -> bool {
        matches!(self, ResolvedModel::Byok(_))
    }

    /// The platform model, when this isn't BYOK.
    pub fn platform(&self) -> Option<ModelId> {
        match self {
            ResolvedModel::Platform(model) => Some(*model),
            ResolvedModel::Byok(_) => None,
        }
    }
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedModel::Platform(model) => f.debug_tuple("Platform").field(model).finish(),
            ResolvedModel::Byok(creds) => f.debug_tuple("Byok").field(creds).finish(),
        }
    }
}

/// The validator's output and the executor's input: every decision made,
/// every reservation taken.
///
/// Deliberately not `Clone` — exactly one plan exists per execution
/// attempt, and the credentials inside must not multiply.
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The bout id.
    pub bout_id: String,
    /// Resolved preset id (catalog id or the arena sentinel).
    pub preset_id: String,
    /// The resolved roster and turn budget.
    pub preset: Preset,
    /// Trimmed topic, when non-empty.
    pub topic: Option<String>,
    /// Resolved length dial.
    pub length: ResponseLength,
    /// Resolved format dial.
    pub format: ResponseFormat,
    /// The model this bout runs against.
    pub model: ResolvedModel,
    /// Caller identity, when authenticated.
    pub owner: Option<String>,
    /// The caller's effective tier at validation time.
    pub tier: EffectiveTier,
    /// Micro-credits reserved against the owner's balance (0 for
    /// anonymous or research-bypassed bouts).
    pub preauth_micro: i64,
    /// Micro-credits drawn from the shared anonymous pool (0 for
    /// authenticated bouts).
    pub pool_draw_micro: i64,
    /// Estimated spend recorded against the free-tier daily pool (0 when
    /// the free pool wasn't involved).
    pub free_spend_micro: i64,
    /// UTC day key the free-pool draw was recorded under.
    pub free_pool_day: Option<String>,
    /// Correlation id from the caller.
    pub request_id: String,
}
