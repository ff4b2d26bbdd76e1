//! Context window budgeting for turn prompts.
//!
//! The transcript is re-sent in full every turn, so long bouts with
//! verbose agents can outgrow the model's input window. The heuristic
//! estimator (4 bytes per token) and an 85% budget keep enough headroom
//! that estimation error doesn't turn into upstream 400s.

use agora_types::{ModelId, ResolvedModel};

/// Share of the context window usable for input.
const BUDGET_NUMERATOR: u64 = 85;
const BUDGET_DENOMINATOR: u64 = 100;

/// Window assumed for BYOK models we can't identify.
const DEFAULT_CONTEXT_WINDOW: u64 = 100_000;

/// Heuristic token estimate: `max(min, ceil(bytes / 4))`.
pub(crate) fn estimate_tokens(text: &str, min: u64) -> u64 {
    ((text.len() as u64).div_ceil(4)).max(min)
}

/// Input token budget for the turn's model.
///
/// Platform models use their known window. BYOK models use their own
/// window when the caller picked an id we recognize, and a conservative
/// default otherwise.
pub(crate) fn input_token_budget(model: &ResolvedModel) -> u64 {
    let window = match model {
        ResolvedModel::Platform(id) => id.context_window(),
        ResolvedModel::Byok(credentials) => credentials
            .model
            .as_deref()
            .and_then(ModelId::parse)
            .map(|id| id.context_window())
            .unwrap_or(DEFAULT_CONTEXT_WINDOW),
    };
    window * BUDGET_NUMERATOR / BUDGET_DENOMINATOR
}

/// Drop history entries from the front until the prompt fits the budget.
///
/// Returns the retained suffix (chronological order preserved) and how
/// many entries were dropped. The fixed cost is the system message plus
/// the user-message scaffolding without any history; when even an empty
/// suffix doesn't fit, everything is dropped and the caller's hard guard
/// decides whether the turn can proceed.
pub(crate) fn truncate_history_to_fit<'a>(
    history: &'a [String],
    system: &str,
    overhead: &str,
    budget: u64,
) -> (&'a [String], usize) {
    let fixed = estimate_tokens(system, 1) + estimate_tokens(overhead, 1);
    let mut available = budget.saturating_sub(fixed);

    // Walk backward keeping the newest entries that fit.
    let mut start = history.len();
    while start > 0 {
        let entry_tokens = estimate_tokens(&history[start - 1], 0);
        if entry_tokens > available {
            break;
        }
        available -= entry_tokens;
        start -= 1;
    }

    (&history[start..], start)
}
