//! The platform model registry.
//!
//! Model ids, families, and access rules use exhaustive enums with total
//! lookup functions — there is no string-keyed map with an implicit
//! fallback anywhere in the pipeline. A model id that doesn't parse is an
//! unknown model, and unknown models fail closed at the entitlement gate.

use serde::{Deserialize, Serialize};

/// Platform-funded models the engine can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    /// Fast, cheap — the free default.
    Haiku45,
    /// Mid-tier.
    Sonnet45,
    /// Strong.
    Opus45,
    /// Strongest; also the first-bout promotion model.
    Opus46,
}

/// Model family, the granularity tier entitlements are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Haiku-class models.
    Haiku,
    /// Sonnet-class models.
    Sonnet,
    /// Opus-class models.
    Opus,
}

impl ModelId {
    /// The free-tier and anonymous default.
    pub const FREE_DEFAULT: ModelId = ModelId::Haiku45;

    /// Model silently granted for a free-tier caller's first bout.
    pub const FIRST_BOUT_PROMOTION: ModelId = ModelId::Opus46;

    /// Premium models, cheapest-capable first. A premium preset without an
    /// explicit model request takes the first entry the caller's tier can
    /// access.
    pub const PREMIUM_OPTIONS: &'static [ModelId] =
        &[ModelId::Sonnet45, ModelId::Opus45, ModelId::Opus46];

    /// The provider-facing model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Haiku45 => "claude-haiku-4-5-20251001",
            ModelId::Sonnet45 => "claude-sonnet-4-5-20250929",
            ModelId::Opus45 => "claude-opus-4-5-20251101",
            ModelId::Opus46 => "claude-opus-4-6",
        }
    }

    /// Parse a provider-facing identifier. Unknown ids are `None`, never a
    /// default — the caller decides whether unknown means reject or
    /// fall back.
    pub fn parse(s: &str) -> Option<ModelId> {
        match s {
            "claude-haiku-4-5-20251001" => Some(ModelId::Haiku45),
            "claude-sonnet-4-5-20250929" => Some(ModelId::Sonnet45),
            "claude-opus-4-5-20251101" => Some(ModelId::Opus45),
            "claude-opus-4-6" => Some(ModelId::Opus46),
            _ => None,
        }
    }

    /// Total mapping onto the entitlement granularity.
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelId::Haiku45 => ModelFamily::Haiku,
            ModelId::Sonnet45 => ModelFamily::Sonnet,
            ModelId::Opus45 | ModelId::Opus46 => ModelFamily::Opus,
        }
    }

    /// Context window, in tokens. All current platform models share one
    /// window; the mapping stays total so a future model with a different
    /// window is a compile error at every budget call site, not a silent
    /// fallback.
    pub fn context_window(&self) -> u64 {
        match self {
            ModelId::Haiku45 | ModelId::Sonnet45 | ModelId::Opus45 | ModelId::Opus46 => 200_000,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream provider for a bring-your-own-key call, detected from the key
/// prefix (`sk-ant-` → Anthropic, `sk-or-` → OpenRouter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByokProvider {
    /// Direct Anthropic key.
    Anthropic,
    /// OpenRouter key (any curated model).
    OpenRouter,
}

impl ByokProvider {
    /// Detect the provider from a raw key. Unknown prefixes default to
    /// Anthropic, matching the legacy raw-key hand-off format.
    pub fn detect(key: &str) -> ByokProvider {
        if key.starts_with("sk-or-") {
            ByokProvider::OpenRouter
        } else {
            ByokProvider::Anthropic
        }
    }
}
