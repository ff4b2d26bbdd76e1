//! Sliding-window rate limiting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Verdict from a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed. An allowed check counts against
    /// the window; a denied one does not.
    pub allowed: bool,
    /// Requests left in the window after this one.
    pub remaining: u32,
    /// When the oldest counted request ages out.
    pub reset_at: DateTime<Utc>,
}

/// A sliding-window rate limiter keyed by `(scope, key)`.
///
/// `scope` namespaces independent limits ("bout-creation" is the only
/// scope the engine uses today); `key` identifies the caller — user id
/// when authenticated, client fingerprint otherwise. Fail-open is the
/// implementation's call; the in-memory one never fails.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record-and-check: admits the request and counts it when under
    /// the limit, rejects without counting otherwise.
    async fn check(
        &self,
        scope: &str,
        key: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> RateDecision;
}
