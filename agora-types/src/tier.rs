//! Subscription tiers and the entitlements attached to them.
//!
//! All tier-dependent numbers live here as total functions on the enum,
//! so adding a tier forces every policy site to be revisited.

use serde::{Deserialize, Serialize};

use crate::model::ModelFamily;

/// Subscription tier of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Default tier for any signed-in user without a subscription.
    Free,
    /// Paid pass.
    Pass,
    /// Top tier; API access, all models, rate limits bypassed.
    Lab,
}

impl Tier {
    /// Platform-funded bouts allowed per UTC day.
    pub fn bouts_per_day(&self) -> u32 {
        match self {
            Tier::Free => 5,
            Tier::Pass => 15,
            Tier::Lab => 100,
        }
    }

    /// Lifetime cap on platform-funded bouts. Currently uncapped for every
    /// tier; kept as an `Option` so policy can tighten without a shape
    /// change at the call sites.
    pub fn lifetime_bout_cap(&self) -> Option<u64> {
        match self {
            Tier::Free | Tier::Pass | Tier::Lab => None,
        }
    }

    /// Model families this tier may select explicitly.
    pub fn allowed_families(&self) -> &'static [ModelFamily] {
        match self {
            Tier::Free | Tier::Pass => &[ModelFamily::Haiku, ModelFamily::Sonnet],
            Tier::Lab => &[ModelFamily::Haiku, ModelFamily::Sonnet, ModelFamily::Opus],
        }
    }

    /// Whether this tier may select the given family. Fails closed: a
    /// family not in the allow-list is denied.
    pub fn can_access(&self, family: ModelFamily) -> bool {
        self.allowed_families().contains(&family)
    }

    /// Whether this tier has API access.
    pub fn api_access(&self) -> bool {
        matches!(self, Tier::Lab)
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pass => "pass",
            Tier::Lab => "lab",
        }
    }
}

/// The caller's tier as the validator sees it — anonymous callers have no
/// account and therefore no [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "tier")]
pub enum EffectiveTier {
    /// No identity; fingerprint-keyed limits, free model only.
    Anonymous,
    /// Authenticated caller with a resolved tier.
    User(Tier),
}

impl EffectiveTier {
    /// Bout-creation requests allowed per sliding hour. `None` means the
    /// rate limiter is bypassed entirely (lab tier).
    pub fn hourly_bout_limit(&self) -> Option<u32> {
        match self {
            EffectiveTier::Anonymous => Some(2),
            EffectiveTier::User(Tier::Free) => Some(5),
            EffectiveTier::User(Tier::Pass) => Some(15),
            EffectiveTier::User(Tier::Lab) => None,
        }
    }

    /// Upgrade paths worth advertising on a rate-limit rejection: every
    /// tier above the current one, with its hourly limit (`None` =
    /// unlimited).
    pub fn upgrade_hints(&self) -> Vec<UpgradeHint> {
        let mut hints = Vec::new();
        if !matches!(self, EffectiveTier::User(Tier::Pass | Tier::Lab)) {
            hints.push(UpgradeHint {
                tier: Tier::Pass,
                hourly_limit: Some(15),
            });
        }
        if !matches!(self, EffectiveTier::User(Tier::Lab)) {
            hints.push(UpgradeHint {
                tier: Tier::Lab,
                hourly_limit: None,
            });
        }
        hints
    }

    /// Lowercase wire name ("anonymous" or the tier name).
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveTier::Anonymous => "anonymous",
            EffectiveTier::User(tier) => tier.as_str(),
        }
    }
}

/// A tier worth upgrading to, attached to rate-limit rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeHint {
    /// The advertised tier.
    pub tier: Tier,
    /// That tier's hourly bout limit; `None` = unlimited.
    pub hourly_limit: Option<u32>,
}
