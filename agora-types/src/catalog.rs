//! The preset catalog seam.

use crate::preset::Preset;

/// Preset lookup by id.
///
/// Synchronous by design: catalogs are static data compiled in or loaded
/// at startup. The arena sentinel id is NOT resolved here — the validator
/// reconstructs arena presets from the persisted row's lineup and only
/// falls back to the catalog for real preset ids.
pub trait PresetCatalog: Send + Sync {
    /// Look up a preset. `None` for unknown ids.
    fn preset(&self, id: &str) -> Option<Preset>;
}
