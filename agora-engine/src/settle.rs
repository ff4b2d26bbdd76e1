//! Post-bout financial settlement.
//!
//! The validator reserves pessimistically from estimates; settlement
//! trues those reservations up against what the bout actually cost.
//! Success settles the signed delta in both directions. Failure refunds
//! whatever the partial run didn't earn, with every step best-effort so
//! one collaborator being down never strands the others' refunds or
//! masks the error that killed the bout.

use agora_types::{ExecuteError, ExecutionPlan, TokenUsage};
use rust_decimal::Decimal;

use crate::BoutEngine;
use crate::cost::{compute_cost_gbp, to_micro};

impl BoutEngine {
    fn actual_cost(&self, plan: &ExecutionPlan, usage: &TokenUsage) -> (Decimal, i64) {
        let gbp = compute_cost_gbp(
            &self.config.cost,
            &plan.model,
            usage.input_tokens,
            usage.output_tokens,
        );
        let micro = to_micro(&self.config.cost, gbp);
        (gbp, micro)
    }

    /// True reservations up after a completed bout.
    ///
    /// Credits settle only when a pre-authorization exists; anonymous
    /// bouts keep their full pool draw (the intro pool is never trued
    /// up, it absorbs the estimate/actual gap). The free-pool correction
    /// runs regardless of the credits switch.
    pub(crate) async fn settle_success(
        &self,
        plan: &ExecutionPlan,
        usage: &TokenUsage,
    ) -> Result<(), ExecuteError> {
        if self.config.credits_enabled && plan.preauth_micro > 0 {
            if let Some(owner) = plan.owner.as_deref() {
                let (actual_gbp, actual_micro) = self.actual_cost(plan, usage);
                let delta_micro = actual_micro - plan.preauth_micro;
                tracing::info!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    model = %plan.model.wire_id(),
                    estimated_micro = plan.preauth_micro,
                    actual_micro,
                    delta_micro,
                    actual_cost_gbp = %actual_gbp,
                    margin_health = if delta_micro <= 0 { "healthy" } else { "leak" },
                    "financial_settlement"
                );
                if delta_micro != 0 {
                    self.ledger.settle(owner, delta_micro, &plan.bout_id).await?;
                }
            }
        }

        if plan.free_spend_micro > 0 {
            if let Some(day) = plan.free_pool_day.as_deref() {
                let (_, actual_micro) = self.actual_cost(plan, usage);
                let delta_micro = actual_micro - plan.free_spend_micro;
                if delta_micro != 0 {
                    self.free_pool.settle(delta_micro, day).await?;
                }
            }
        }

        Ok(())
    }

    /// Compensate reservations after a failed bout.
    ///
    /// Turns that completed before the failure stay billed at actual
    /// cost; the unearned slice of the pre-authorization flows back, the
    /// intro pool draw comes back whole, and the free pool keeps only
    /// the actual spend.
    pub(crate) async fn settle_failure(&self, plan: &ExecutionPlan, usage: &TokenUsage) {
        let (_, actual_micro) = self.actual_cost(plan, usage);

        if self.config.credits_enabled && plan.preauth_micro > 0 {
            if let Some(owner) = plan.owner.as_deref() {
                let refund_micro = plan.preauth_micro - actual_micro;
                if refund_micro > 0 {
                    if let Err(err) = self
                        .ledger
                        .settle(owner, -refund_micro, &plan.bout_id)
                        .await
                    {
                        tracing::error!(
                            request_id = %plan.request_id,
                            bout_id = %plan.bout_id,
                            refund_micro,
                            error = %err,
                            "failed to refund preauthorization"
                        );
                    }
                }
            }
        }

        if plan.pool_draw_micro > 0 {
            tracing::info!(
                request_id = %plan.request_id,
                bout_id = %plan.bout_id,
                pool_draw_micro = plan.pool_draw_micro,
                "refunding intro pool on error"
            );
            if let Err(err) = self.shared_pool.refund(plan.pool_draw_micro).await {
                tracing::error!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    error = %err,
                    "failed to refund intro pool"
                );
            }
        }

        if plan.free_spend_micro > 0 {
            if let Some(day) = plan.free_pool_day.as_deref() {
                let delta_micro = actual_micro - plan.free_spend_micro;
                tracing::info!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    estimated_micro = plan.free_spend_micro,
                    actual_micro,
                    "refunding free pool on error"
                );
                if delta_micro != 0 {
                    if let Err(err) = self.free_pool.settle(delta_micro, day).await {
                        tracing::error!(
                            request_id = %plan.request_id,
                            bout_id = %plan.bout_id,
                            error = %err,
                            "failed to settle free pool"
                        );
                    }
                }
            }
        }
    }
}
