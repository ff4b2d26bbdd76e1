//! Bout lifecycle tracing.
//!
//! One [`tracing`] span per bout, carrying the identifiers an operator
//! needs to follow a bout across log lines. Outcome fields are declared
//! empty at creation and recorded once the bout finishes, so a span
//! that never reaches [`BoutSpan::record_outcome`] is visibly abandoned.
//!
//! User ids are never logged raw. They are reduced to a short SHA-256
//! prefix, enough to correlate bouts from one account without exposing
//! the id itself.

use std::cell::Cell;

use agora_types::{ExecutionPlan, TokenUsage};
use sha2::{Digest, Sha256};

/// Hex chars of the user-id hash kept in span fields.
const USER_HASH_LEN: usize = 16;

/// Correlation tag for a caller: a SHA-256 prefix for signed-in users,
/// the literal `"anonymous"` otherwise.
pub(crate) fn caller_tag(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => {
            let mut hasher = Sha256::new();
            hasher.update(id.as_bytes());
            let digest = hex::encode(hasher.finalize());
            digest[..USER_HASH_LEN].to_string()
        }
        None => "anonymous".to_string(),
    }
}

/// The span wrapping one bout execution.
///
/// Created by the executor once a plan is approved. Holds the
/// `tracing` span open for the bout's lifetime; dropping it without a
/// recorded outcome marks the bout `abandoned`.
pub(crate) struct BoutSpan {
    span: tracing::Span,
    finished: Cell<bool>,
}

impl BoutSpan {
    pub(crate) fn new(plan: &ExecutionPlan) -> Self {
        let span = tracing::info_span!(
            "bout",
            bout_id = %plan.bout_id,
            preset_id = %plan.preset_id,
            model = %plan.model.wire_id(),
            agent_count = plan.preset.agents.len(),
            request_id = %plan.request_id,
            byok = plan.model.is_byok(),
            caller = %caller_tag(plan.owner.as_deref()),
            outcome = tracing::field::Empty,
            turns = tracing::field::Empty,
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
        );
        Self {
            span,
            finished: Cell::new(false),
        }
    }

    /// The underlying span, for `.instrument()` on the execution future.
    pub(crate) fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Record how the bout ended. Call exactly once.
    pub(crate) fn record_outcome(&self, outcome: &str, turns: u32, usage: &TokenUsage) {
        self.span.record("outcome", outcome);
        self.span.record("turns", turns);
        self.span.record("input_tokens", usage.input_tokens);
        self.span.record("output_tokens", usage.output_tokens);
        self.finished.set(true);
    }
}

impl Drop for BoutSpan {
    fn drop(&mut self) {
        if !self.finished.get() {
            self.span.record("outcome", "abandoned");
            self.span
                .in_scope(|| tracing::warn!("bout span dropped without an outcome"));
        }
    }
}
