//! Engine configuration and the cost model constants.

use agora_types::SecretString;
use rust_decimal::Decimal;

/// Feature switches and deployment secrets for a [`crate::BoutEngine`].
pub struct EngineConfig {
    /// Whether the credit ledger participates at all. Off means no
    /// pre-authorization and no settlement for authenticated callers;
    /// the free-tier pool still applies.
    pub credits_enabled: bool,
    /// Whether subscription tiers gate anything. Off skips tier caps,
    /// model access control, and the free-tier pool; every bout runs on
    /// the free default model.
    pub subscriptions_enabled: bool,
    /// Whether BYOK bouts are accepted.
    pub byok_enabled: bool,
    /// Research bypass key. `None` disables the bypass entirely.
    pub research_key: Option<SecretString>,
    /// Cost constants.
    pub cost: CostModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credits_enabled: true,
            subscriptions_enabled: true,
            byok_enabled: false,
            research_key: None,
            cost: CostModel::default(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("credits_enabled", &self.credits_enabled)
            .field("subscriptions_enabled", &self.subscriptions_enabled)
            .field("byok_enabled", &self.byok_enabled)
            .field("research_key", &self.research_key.is_some())
            .field("cost", &self.cost)
            .finish()
    }
}

/// Pricing constants, all GBP, all [`Decimal`] so no money math touches
/// floating point.
///
/// Defaults give roughly a 10% margin over upstream API cost at a USD
/// conversion of ~0.732 GBP/USD. 1 credit = 100 micro-credits = £0.01,
/// so one micro-credit is worth `micro_value_gbp`.
#[derive(Debug, Clone)]
pub struct CostModel {
    /// GBP value of one micro-credit.
    pub micro_value_gbp: Decimal,
    /// Margin applied on top of raw platform-model cost.
    pub platform_margin: Decimal,
    /// Estimated input tokens per output token when estimating a bout
    /// up front (system prompts plus the growing transcript re-sent each
    /// turn dominate input).
    pub input_factor: Decimal,
    /// Flat BYOK platform fee per 1 000 total tokens.
    pub byok_fee_per_1k_gbp: Decimal,
    /// BYOK fee floor per bout.
    pub byok_min_gbp: Decimal,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            micro_value_gbp: Decimal::new(1, 4),
            platform_margin: Decimal::new(1, 1),
            input_factor: Decimal::new(55, 1),
            byok_fee_per_1k_gbp: Decimal::new(2, 4),
            byok_min_gbp: Decimal::new(1, 3),
        }
    }
}
