//! Bout cost arithmetic.
//!
//! Everything here is [`Decimal`] in GBP until the final conversion to
//! integer micro-credits at the collaborator boundary. Platform models
//! price per million tokens with a margin on top; BYOK bouts pay a flat
//! platform fee per thousand total tokens with a per-bout floor.

use agora_types::{ModelId, ResolvedModel};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::CostModel;

const MTOK: u64 = 1_000_000;

/// Per-MTok GBP prices `(input, output)`. Total over [`ModelId`] — adding
/// a platform model without a price is a compile error, which is the
/// point of the enum.
pub(crate) fn price_per_mtok(model: ModelId) -> (Decimal, Decimal) {
    match model {
        ModelId::Haiku45 => (Decimal::new(732, 3), Decimal::new(366, 2)),
        ModelId::Sonnet45 => (Decimal::new(2196, 3), Decimal::new(1098, 2)),
        ModelId::Opus45 => (Decimal::new(366, 2), Decimal::new(183, 1)),
        ModelId::Opus46 => (Decimal::new(366, 2), Decimal::new(183, 1)),
    }
}

/// Up-front token estimate for a whole bout: `output = max(1, turns ×
/// per-turn)`, `input = max(1, ceil(output × input_factor))`.
pub(crate) fn estimate_bout_tokens(cost: &CostModel, turns: u32, output_per_turn: u32) -> (u64, u64) {
    let output = u64::from(turns) * u64::from(output_per_turn);
    let output = output.max(1);
    let input = (Decimal::from(output) * cost.input_factor)
        .ceil()
        .to_u64()
        .unwrap_or(u64::MAX)
        .max(1);
    (input, output)
}

/// Cost of a bout given actual token totals.
pub(crate) fn compute_cost_gbp(
    cost: &CostModel,
    model: &ResolvedModel,
    input_tokens: u64,
    output_tokens: u64,
) -> Decimal {
    match model.platform() {
        Some(id) => {
            let (price_in, price_out) = price_per_mtok(id);
            let raw = (Decimal::from(input_tokens) * price_in
                + Decimal::from(output_tokens) * price_out)
                / Decimal::from(MTOK);
            raw * (Decimal::ONE + cost.platform_margin)
        }
        None => byok_fee_gbp(cost, input_tokens + output_tokens),
    }
}

/// Estimated cost of a bout before it runs.
pub(crate) fn estimate_bout_cost_gbp(
    cost: &CostModel,
    model: &ResolvedModel,
    turns: u32,
    output_per_turn: u32,
) -> Decimal {
    let (input, output) = estimate_bout_tokens(cost, turns, output_per_turn);
    compute_cost_gbp(cost, model, input, output)
}

fn byok_fee_gbp(cost: &CostModel, total_tokens: u64) -> Decimal {
    let fee = Decimal::from(total_tokens) / Decimal::from(1_000u64) * cost.byok_fee_per_1k_gbp;
    fee.max(cost.byok_min_gbp)
}

/// GBP → micro-credits, rounded up so fractional micro never goes
/// unbilled.
pub(crate) fn to_micro(cost: &CostModel, gbp: Decimal) -> i64 {
    (gbp / cost.micro_value_gbp)
        .ceil()
        .to_i64()
        .unwrap_or(i64::MAX)
}
