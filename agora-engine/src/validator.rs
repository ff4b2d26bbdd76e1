//! Request validation: the ordered gates between a raw payload and an
//! [`ExecutionPlan`].
//!
//! Every gate short-circuits with a typed [`BoutRejection`]. Rejections
//! fired before the reservation gates leave nothing behind; the research
//! bypass, pool draws, and pre-authorization are one-way — nothing here
//! rolls them back, settlement compensates them after execution.

use std::sync::LazyLock;

use agora_types::{
    Agent, ARENA_PRESET_ID, BoutRejection, BoutRequest, BoutStatus, Caller, EffectiveTier,
    ExecutionPlan, FreeSlotOutcome, ModelId, NewBout, Preset, PresetTier, ResolvedModel,
    ResponseFormat, ResponseLength, Tier,
};
use chrono::Utc;
use regex::Regex;

use crate::BoutEngine;
use crate::cost::{estimate_bout_cost_gbp, to_micro};

/// Rate-limit namespace for bout creation.
const BOUT_CREATION_SCOPE: &str = "bout-creation";

/// Sliding-window width for the bout-creation limit.
const RATE_WINDOW_SECS: u64 = 3600;

/// Trimmed-topic length cap, in characters.
const MAX_TOPIC_CHARS: usize = 500;

/// Topics matching this are rejected outright: URLs invite link spam in
/// shared transcripts, the rest are markup/script-injection shapes.
static UNSAFE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://|www\.|<script|javascript:|on\w+\s*=|data:text/html")
        .expect("valid regex")
});

fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> BoutRejection {
    BoutRejection::Unavailable(Box::new(err))
}

/// Length-guarded constant-time byte comparison for the research key.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Rebuild the arena preset from a lineup persisted at creation time.
/// Rows written before turn budgets were persisted default to two full
/// rounds of the roster.
fn arena_preset_from_row(lineup: Vec<Agent>, max_turns: Option<u32>) -> Preset {
    let default_turns = (lineup.len() as u32).saturating_mul(2).max(1);
    Preset {
        id: ARENA_PRESET_ID.to_string(),
        name: "Custom Arena".to_string(),
        agents: lineup,
        max_turns: max_turns.unwrap_or(default_turns),
        tier: PresetTier::Free,
    }
}

impl BoutEngine {
    /// Validate a bout request and reserve everything execution needs.
    ///
    /// On success the returned plan carries every resolved decision and
    /// every reservation taken; the caller must hand it to
    /// [`BoutEngine::execute`] (or an equivalent settlement path) —
    /// dropping a plan strands its reservations.
    pub async fn validate(
        &self,
        request: &BoutRequest,
        caller: &Caller,
    ) -> Result<ExecutionPlan, BoutRejection> {
        // Shape checks
        let bout_id = request
            .bout_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(BoutRejection::MissingBoutId)?;
        let mut topic = request
            .topic
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let length_key = request
            .length
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());
        let format_key = request
            .format
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());
        let mut length = ResponseLength::resolve(length_key);
        let mut format = ResponseFormat::resolve(format_key);

        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(BoutRejection::TopicTooLong);
        }
        if UNSAFE_PATTERN.is_match(&topic) {
            return Err(BoutRejection::UnsafeContent);
        }

        // Idempotency / conflict
        let existing = self.store.get(bout_id).await.map_err(unavailable)?;
        if let Some(row) = &existing {
            match row.status {
                BoutStatus::Running if !row.transcript.is_empty() => {
                    return Err(BoutRejection::AlreadyRunning);
                }
                BoutStatus::Completed => return Err(BoutRejection::AlreadyCompleted),
                // Error, or running before the first append: retryable.
                _ => {}
            }
        }

        let preset_id = request
            .preset_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|row| row.preset_id.clone()))
            .ok_or(BoutRejection::MissingPresetId)?;

        // Preset resolution
        let mut preset = self.catalog.preset(&preset_id);
        if preset.is_none() && preset_id == ARENA_PRESET_ID {
            let lineup = existing
                .as_ref()
                .and_then(|row| row.agent_lineup.as_ref())
                .filter(|lineup| !lineup.is_empty());
            let (Some(row), Some(lineup)) = (existing.as_ref(), lineup) else {
                return Err(BoutRejection::UnknownPreset(preset_id));
            };
            preset = Some(arena_preset_from_row(lineup.clone(), row.max_turns));
            // An arena retry may arrive with a bare bout id; recover the
            // dial settings the bout was created with.
            if topic.is_empty() {
                if let Some(row_topic) = &row.topic {
                    topic = row_topic.clone();
                }
            }
            if length_key.is_none() {
                length = row.response_length;
            }
            if format_key.is_none() {
                format = row.response_format;
            }
        }
        let Some(preset) = preset else {
            return Err(BoutRejection::UnknownPreset(preset_id));
        };

        // Ownership
        if let Some(owner) = existing.as_ref().and_then(|row| row.owner_id.as_deref()) {
            if caller.user_id.as_deref() != Some(owner) {
                return Err(BoutRejection::NotYourBout);
            }
        }

        // Research bypass: lab tier, no rate limit, no pool or ledger
        // reservations. Used by internal batch tooling.
        let research_bypass = match (&caller.research_key, &self.config.research_key) {
            (Some(presented), Some(expected)) => expected
                .expose(|secret| constant_time_eq(presented.as_bytes(), secret.as_bytes())),
            _ => false,
        };
        if research_bypass {
            tracing::info!(bout_id, preset_id = %preset_id, "research bypass active");
        }

        // Tier-aware rate limiting
        let tier = if research_bypass {
            EffectiveTier::User(Tier::Lab)
        } else if let Some(user_id) = caller.user_id.as_deref() {
            EffectiveTier::User(self.entitlements.tier_of(user_id).await.map_err(unavailable)?)
        } else {
            EffectiveTier::Anonymous
        };

        if let Some(limit) = tier.hourly_bout_limit() {
            let decision = self
                .limiter
                .check(BOUT_CREATION_SCOPE, caller.limit_key(), limit, RATE_WINDOW_SECS)
                .await;
            if !decision.allowed {
                let retry_after_secs = (decision.reset_at - Utc::now()).num_seconds().max(0) as u64;
                return Err(BoutRejection::RateLimited {
                    limit,
                    retry_after_secs,
                    tier,
                    upgrades: tier.upgrade_hints(),
                });
            }
        }

        // Tier-based access control and model resolution
        let requested_raw = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty());
        let explicit_request = requested_raw.is_some();
        let wants_byok = requested_raw == Some("byok");
        let is_byok = wants_byok && self.config.byok_enabled;
        // "byok" with the feature disabled degrades to the defaults
        // rather than erroring.
        let requested_model = requested_raw.filter(|_| !wants_byok);

        let mut model = ResolvedModel::Platform(ModelId::FREE_DEFAULT);
        let mut free_spend_micro = 0i64;
        let mut free_pool_day: Option<String> = None;

        if self.config.subscriptions_enabled {
            if let (EffectiveTier::User(user_tier), Some(user_id)) =
                (tier, caller.user_id.as_deref())
            {
                // Platform-funded caps. BYOK bouts run on the caller's own
                // key and bypass both.
                if !is_byok {
                    if let Some(cap) = user_tier.lifetime_bout_cap() {
                        let used = self
                            .entitlements
                            .free_bouts_used(user_id)
                            .await
                            .map_err(unavailable)?;
                        if used >= cap {
                            return Err(BoutRejection::QuotaExhausted {
                                reason: format!(
                                    "lifetime limit reached ({cap} bouts on the {} plan); \
                                     upgrade or use your own API key",
                                    user_tier.as_str()
                                ),
                            });
                        }
                    }
                    let daily = self
                        .entitlements
                        .daily_bouts_used(user_id)
                        .await
                        .map_err(unavailable)?;
                    if daily >= user_tier.bouts_per_day() {
                        return Err(BoutRejection::QuotaExhausted {
                            reason: format!(
                                "daily limit reached ({} bouts per day on the {} plan); \
                                 upgrade or use your own API key",
                                user_tier.bouts_per_day(),
                                user_tier.as_str()
                            ),
                        });
                    }
                }

                if is_byok {
                    let credentials = match &self.stash {
                        Some(stash) => stash.take(user_id).await.map_err(unavailable)?,
                        None => None,
                    };
                    let Some(credentials) = credentials else {
                        return Err(BoutRejection::ByokKeyMissing);
                    };
                    model = ResolvedModel::Byok(credentials);
                } else if let Some(requested) = requested_model {
                    // Unknown ids fail closed rather than falling back.
                    let requested_id =
                        ModelId::parse(requested).ok_or(BoutRejection::ModelNotAllowed)?;
                    if !user_tier.can_access(requested_id.family()) {
                        return Err(BoutRejection::ModelNotAllowed);
                    }
                    model = ResolvedModel::Platform(requested_id);
                } else if preset.tier == PresetTier::Premium || preset.id == ARENA_PRESET_ID {
                    let best = ModelId::PREMIUM_OPTIONS
                        .iter()
                        .copied()
                        .find(|option| user_tier.can_access(option.family()));
                    model = ResolvedModel::Platform(best.unwrap_or(ModelId::FREE_DEFAULT));
                }

                // First-bout promotion: a free-tier caller's very first
                // bout silently runs on the promotion model.
                if !is_byok
                    && user_tier == Tier::Free
                    && !explicit_request
                    && model.platform() == Some(ModelId::FREE_DEFAULT)
                {
                    let used = self
                        .entitlements
                        .free_bouts_used(user_id)
                        .await
                        .map_err(unavailable)?;
                    if used == 0 {
                        model = ResolvedModel::Platform(ModelId::FIRST_BOUT_PROMOTION);
                        tracing::info!(
                            user = %crate::trace::caller_tag(Some(user_id)),
                            model = %ModelId::FIRST_BOUT_PROMOTION,
                            "first-bout promotion applied"
                        );
                    }
                }

                if !is_byok && user_tier == Tier::Free {
                    // Estimate before the draw so the pool can enforce the
                    // count cap and the spend cap in one atomic step.
                    let estimate_gbp = estimate_bout_cost_gbp(
                        &self.config.cost,
                        &model,
                        preset.max_turns,
                        length.output_tokens_per_turn(),
                    );
                    free_spend_micro = to_micro(&self.config.cost, estimate_gbp);
                    match self
                        .free_pool
                        .consume(free_spend_micro)
                        .await
                        .map_err(unavailable)?
                    {
                        FreeSlotOutcome::Consumed { day } => free_pool_day = Some(day),
                        FreeSlotOutcome::Exhausted(cap) => {
                            return Err(BoutRejection::FreePoolExhausted { cap });
                        }
                    }
                    self.entitlements
                        .record_free_bout(user_id)
                        .await
                        .map_err(unavailable)?;
                }
            }
        }

        // Financial pre-authorization. Research bouts are platform-internal
        // and skip every credit gate.
        let mut preauth_micro = 0i64;
        let mut pool_draw_micro = 0i64;
        if self.config.credits_enabled && !research_bypass {
            let estimate_gbp = estimate_bout_cost_gbp(
                &self.config.cost,
                &model,
                preset.max_turns,
                length.output_tokens_per_turn(),
            );
            let estimate_micro = to_micro(&self.config.cost, estimate_gbp);

            match caller.user_id.as_deref() {
                None => {
                    let status = self.shared_pool.status().await.map_err(unavailable)?;
                    if status.exhausted || status.remaining_micro < estimate_micro {
                        return Err(BoutRejection::SignInRequired);
                    }
                    // The status check is advisory; consume is the atomic
                    // arbiter and may still lose the race.
                    if !self
                        .shared_pool
                        .consume(estimate_micro)
                        .await
                        .map_err(unavailable)?
                    {
                        return Err(BoutRejection::PoolExhausted);
                    }
                    pool_draw_micro = estimate_micro;
                    tracing::info!(
                        bout_id,
                        preset_id = %preset_id,
                        pool_draw_micro,
                        "intro pool bout created"
                    );
                }
                Some(user_id) => {
                    let reserved = self
                        .ledger
                        .preauthorize(user_id, estimate_micro, bout_id)
                        .await
                        .map_err(unavailable)?;
                    if !reserved {
                        return Err(BoutRejection::InsufficientCredits);
                    }
                    preauth_micro = estimate_micro;
                }
            }
        }

        // Row materialization (idempotent)
        let new_bout = NewBout {
            id: bout_id.to_string(),
            preset_id: preset_id.clone(),
            topic: (!topic.is_empty()).then(|| topic.clone()),
            response_length: length,
            response_format: format,
            owner_id: caller.user_id.clone(),
        };
        if let Err(err) = self.store.create_if_absent(new_bout).await {
            tracing::error!(bout_id, error = %err, "failed to materialize bout row");
            return Err(unavailable(err));
        }

        Ok(ExecutionPlan {
            bout_id: bout_id.to_string(),
            preset_id,
            preset,
            topic: (!topic.is_empty()).then_some(topic),
            length,
            format,
            model,
            owner: caller.user_id.clone(),
            tier,
            preauth_micro,
            pool_draw_micro,
            free_spend_micro,
            free_pool_day,
            request_id: caller.request_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_pattern_catches_injection_shapes() {
        for topic in [
            "check https://evil.example",
            "HTTP://caps.example",
            "visit www.spam.example now",
            "<script>alert(1)</script>",
            "javascript:alert(1)",
            "onclick = steal()",
            "onload\t =x",
            "data:text/html;base64,xxx",
        ] {
            assert!(UNSAFE_PATTERN.is_match(topic), "should match: {topic}");
        }
    }

    #[test]
    fn unsafe_pattern_leaves_ordinary_topics_alone() {
        for topic in [
            "should pineapple go on pizza",
            "cats vs dogs",
            "the moon landing, pro and con",
            "on the whole, a fine day", // "on" word alone is not a handler
        ] {
            assert!(!UNSAFE_PATTERN.is_match(topic), "should not match: {topic}");
        }
    }

    #[test]
    fn constant_time_eq_requires_equal_length_and_content() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn arena_preset_defaults_to_two_rounds() {
        let lineup = vec![
            Agent {
                id: "a".into(),
                name: "A".into(),
                system_prompt: "You are A".into(),
                color: None,
            },
            Agent {
                id: "b".into(),
                name: "B".into(),
                system_prompt: "You are B".into(),
                color: None,
            },
        ];
        let preset = arena_preset_from_row(lineup.clone(), None);
        assert_eq!(preset.id, ARENA_PRESET_ID);
        assert_eq!(preset.max_turns, 4);
        let preset = arena_preset_from_row(lineup, Some(10));
        assert_eq!(preset.max_turns, 10);
    }
}
