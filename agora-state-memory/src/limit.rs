//! In-memory sliding-window [`RateLimiter`].

use std::collections::HashMap;

use agora_types::{RateDecision, RateLimiter};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// How often the stale-key sweep runs.
const SWEEP_INTERVAL_SECS: i64 = 300;

struct LimiterState {
    windows: HashMap<String, Vec<DateTime<Utc>>>,
    last_sweep: DateTime<Utc>,
}

/// Timestamp-list sliding window per `(scope, key)`.
///
/// Exact (no bucketing): each admitted request is one timestamp, pruned
/// as it ages out of the window. A key that stops arriving would hold
/// its dead timestamps forever, so every [`SWEEP_INTERVAL_SECS`] a
/// check also sweeps the calling scope's keys and drops the empty ones.
pub struct MemoryRateLimiter {
    state: RwLock<LimiterState>,
}

impl MemoryRateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LimiterState {
                windows: HashMap::new(),
                last_sweep: Utc::now(),
            }),
        }
    }
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(
        &self,
        scope: &str,
        key: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> RateDecision {
        let now = Utc::now();
        let window = Duration::seconds(window_secs as i64);
        let cutoff = now - window;

        let mut state = self.state.write().await;

        if (now - state.last_sweep).num_seconds() >= SWEEP_INTERVAL_SECS {
            state.last_sweep = now;
            // Only this scope's keys: other scopes may run wider windows
            // and their cutoffs are not ours to apply.
            let prefix = format!("{scope}:");
            state.windows.retain(|entry_key, hits| {
                if !entry_key.starts_with(&prefix) {
                    return true;
                }
                hits.retain(|at| *at > cutoff);
                !hits.is_empty()
            });
        }

        let hits = state.windows.entry(format!("{scope}:{key}")).or_default();
        hits.retain(|at| *at > cutoff);

        if hits.len() >= max_requests as usize {
            // Denied requests don't count; the window frees up when the
            // oldest admitted one ages out.
            let reset_at = hits.first().copied().unwrap_or(now) + window;
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        hits.push(now);
        let reset_at = hits.first().copied().unwrap_or(now) + window;
        RateDecision {
            allowed: true,
            remaining: max_requests - hits.len() as u32,
            reset_at,
        }
    }
}
