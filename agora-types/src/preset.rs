//! Presets — named rosters of debate personas.

use serde::{Deserialize, Serialize};

/// Sentinel preset id for custom lineups. Arena bouts store their roster
/// on the bout row (`agent_lineup`) instead of referencing a catalog
/// entry; the validator reconstructs the preset from the row.
pub const ARENA_PRESET_ID: &str = "arena";

/// Fallback agent color when a roster entry doesn't specify one.
pub const DEFAULT_AGENT_COLOR: &str = "#f8fafc";

/// One persona in a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Stable id, unique within the roster.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Persona instructions injected into the system message.
    pub system_prompt: String,
    /// Display color for live transports; [`DEFAULT_AGENT_COLOR`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Agent {
    /// The agent's display color, falling back to [`DEFAULT_AGENT_COLOR`].
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_AGENT_COLOR)
    }
}

/// Catalog tier of a preset. Premium presets steer model selection toward
/// the stronger models the caller's tier can access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetTier {
    /// Included for everyone.
    Free,
    /// Richer personas, premium model preference.
    Premium,
}

/// An ordered, non-empty roster plus a turn budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Catalog id (or [`ARENA_PRESET_ID`] for reconstructed lineups).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Turn order. Agents speak round-robin; the roster must be non-empty.
    pub agents: Vec<Agent>,
    /// Number of turns a bout of this preset runs.
    pub max_turns: u32,
    /// Catalog tier.
    pub tier: PresetTier,
}
