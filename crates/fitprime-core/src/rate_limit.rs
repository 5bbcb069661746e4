use crate::config::RateLimitConfig;
use crate::sweeper::Sweep;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Records idle for longer than this are evicted by `cleanup`
pub const DEFAULT_RETENTION_SECS: i64 = 2 * 60 * 60;

/// Attempt counter for a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            window_start: now,
            blocked_until: None,
        }
    }

    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RateLimitDecision {
    fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            blocked_until: None,
            message: None,
        }
    }

    fn blocked(until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            blocked_until: Some(until),
            message: Some(retry_message(minutes_until(until, now))),
        }
    }
}

/// Per-key sliding window limiter with lockout
///
/// Cloning is cheap and every clone shares the same store, so one instance can
/// be handed to request handlers and to the background sweeper.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<DashMap<String, RateLimitRecord>>,
    retention: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_retention(Duration::seconds(DEFAULT_RETENTION_SECS))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Count an attempt for `key` and decide whether it may proceed
    pub fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitDecision {
        self.check_at(key, config, Utc::now())
    }

    pub fn check_at(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let fresh_remaining = config.max_attempts.saturating_sub(1);

        // The entry guard holds the shard lock for the whole read-modify-write
        let mut entry = match self.store.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitRecord::fresh(now));
                return RateLimitDecision::allow(fresh_remaining);
            }
            Entry::Occupied(occupied) => occupied,
        };
        let record = entry.get_mut();

        if let Some(until) = record.blocked_until {
            if now < until {
                debug!("Rejected attempt for blocked key {}", key);
                return RateLimitDecision::blocked(until, now);
            }
            *record = RateLimitRecord::fresh(now);
            return RateLimitDecision::allow(fresh_remaining);
        }

        if now - record.window_start > config.window() {
            *record = RateLimitRecord::fresh(now);
            return RateLimitDecision::allow(fresh_remaining);
        }

        record.count += 1;
        if record.count > config.max_attempts {
            let until = now
                .checked_add_signed(config.block_duration())
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.blocked_until = Some(until);
            warn!(
                "Rate limit exceeded for key {} after {} attempts, blocked until {}",
                key, record.count, until
            );
            return RateLimitDecision::blocked(until, now);
        }

        RateLimitDecision::allow(config.max_attempts - record.count)
    }

    /// Forget everything known about `key`
    pub fn reset(&self, key: &str) {
        if self.store.remove(key).is_some() {
            debug!("Rate limit reset for key {}", key);
        }
    }

    pub fn get(&self, key: &str) -> Option<RateLimitRecord> {
        self.store.get(key).map(|record| record.clone())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Evict stale, unblocked records; returns how many were removed
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.store.len();
        let retention = self.retention;
        self.store.retain(|_, record| {
            record.is_blocked_at(now) || now - record.window_start <= retention
        });
        before.saturating_sub(self.store.len())
    }
}

impl Sweep for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.cleanup_at(now)
    }
}

/// Join the non-empty parts of a composite key with `:`
///
/// # Examples
///
/// ```
/// use fitprime_core::rate_limit::generate_rate_limit_key;
///
/// assert_eq!(generate_rate_limit_key(["login", "ana@example.com", "10.0.0.1"]), "login:ana@example.com:10.0.0.1");
/// assert_eq!(generate_rate_limit_key(["reset", "", "10.0.0.1"]), "reset:10.0.0.1");
/// ```
pub fn generate_rate_limit_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|part| !part.as_ref().is_empty())
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// User-facing retry guidance
///
/// # Examples
///
/// ```
/// use fitprime_core::rate_limit::retry_message;
///
/// assert_eq!(retry_message(30), "Muitas tentativas. Tente novamente em 30 minutos.");
/// assert_eq!(retry_message(1), "Muitas tentativas. Tente novamente em 1 minuto.");
/// ```
pub fn retry_message(minutes: i64) -> String {
    let unit = if minutes == 1 { "minuto" } else { "minutos" };
    format!("Muitas tentativas. Tente novamente em {} {}.", minutes, unit)
}

/// Whole minutes until `until`, rounded up
fn minutes_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (until - now).num_milliseconds().max(0);
    ((ms + 59_999) / 60_000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitPreset;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_attempt_allowed() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(5, 60_000, 60_000);

        let decision = limiter.check_at("user", &config, t0());
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.blocked_until, None);
        assert_eq!(decision.message, None);
    }

    #[test]
    fn test_remaining_strictly_decreases_then_blocks() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(4, 60_000, 120_000);
        let now = t0();

        let mut previous = u32::MAX;
        for i in 0..4 {
            let decision = limiter.check_at("k", &config, now + Duration::seconds(i));
            assert!(decision.allowed);
            assert!(decision.remaining < previous);
            previous = decision.remaining;
        }
        assert_eq!(previous, 0);

        let at = now + Duration::seconds(10);
        let decision = limiter.check_at("k", &config, at);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.blocked_until, Some(at + Duration::milliseconds(120_000)));
    }

    #[test]
    fn test_password_reset_preset_scenario() {
        let limiter = RateLimiter::new();
        let config = RateLimitPreset::PasswordReset.config();
        let now = t0();

        for expected in [2, 1, 0] {
            let decision = limiter.check_at("ana@example.com", &config, now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected);
        }

        let decision = limiter.check_at("ana@example.com", &config, now);
        assert!(!decision.allowed);
        assert_eq!(decision.blocked_until, Some(now + Duration::minutes(30)));
        assert!(decision.message.unwrap().contains("30 minutos"));
    }

    #[test]
    fn test_blocked_key_rejected_regardless_of_count() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(1, 60_000, 600_000);
        let now = t0();

        limiter.check_at("k", &config, now);
        let blocked = limiter.check_at("k", &config, now);
        assert!(!blocked.allowed);

        // Well past the window but still inside the block
        let later = now + Duration::minutes(9);
        let decision = limiter.check_at("k", &config, later);
        assert!(!decision.allowed);
        assert_eq!(decision.blocked_until, blocked.blocked_until);
        assert_eq!(
            decision.message.as_deref(),
            Some("Muitas tentativas. Tente novamente em 1 minuto.")
        );
    }

    #[test]
    fn test_oversized_block_saturates_instead_of_overflowing() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(1, 60_000, 9_000_000_000_000_000);

        assert!(limiter.check_at("huge", &config, t0()).allowed);
        let decision = limiter.check_at("huge", &config, t0());
        assert!(!decision.allowed);
        assert_eq!(decision.blocked_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(decision.message.is_some());

        let decision = limiter.check_at("huge", &config, t0() + Duration::days(365));
        assert!(!decision.allowed);
    }

    #[test]
    fn test_retry_message_rounds_up() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(1, 60_000, 30 * 60_000);
        let now = t0();

        limiter.check_at("k", &config, now);
        limiter.check_at("k", &config, now);

        let decision = limiter.check_at("k", &config, now + Duration::seconds(61));
        assert_eq!(
            decision.message.as_deref(),
            Some("Muitas tentativas. Tente novamente em 29 minutos.")
        );
    }

    #[test]
    fn test_fresh_window_after_block_expires() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(3, 60_000, 300_000);
        let now = t0();

        for _ in 0..4 {
            limiter.check_at("k", &config, now);
        }
        let until = limiter.get("k").unwrap().blocked_until.unwrap();

        let decision = limiter.check_at("k", &config, until);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);

        let record = limiter.get("k").unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.window_start, until);
        assert_eq!(record.blocked_until, None);
    }

    #[test]
    fn test_window_elapsed_starts_fresh() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(3, 60_000, 300_000);
        let now = t0();

        limiter.check_at("k", &config, now);
        limiter.check_at("k", &config, now);

        // Exactly at the window boundary still counts
        let decision = limiter.check_at("k", &config, now + Duration::milliseconds(60_000));
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);

        let decision = limiter.check_at("k", &config, now + Duration::milliseconds(60_001));
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
    }

    #[test]
    fn test_reset_behaves_like_new_key() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(2, 60_000, 60_000);
        let now = t0();

        for _ in 0..3 {
            limiter.check_at("k", &config, now);
        }
        assert!(!limiter.check_at("k", &config, now).allowed);

        limiter.reset("k");
        assert!(limiter.get("k").is_none());

        let after_reset = limiter.check_at("k", &config, now);
        let brand_new = limiter.check_at("other", &config, now);
        assert_eq!(after_reset, brand_new);
    }

    #[test]
    fn test_reset_unknown_key_is_noop() {
        let limiter = RateLimiter::new();
        limiter.reset("missing");
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(1, 60_000, 60_000);
        let now = t0();

        limiter.check_at("a", &config, now);
        assert!(!limiter.check_at("a", &config, now).allowed);
        assert!(limiter.check_at("b", &config, now).allowed);
    }

    #[test]
    fn test_cleanup_evicts_stale_unblocked_records() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(1, 60_000, 4 * 60 * 60_000);
        let now = t0();

        limiter.check_at("stale", &config, now);
        limiter.check_at("blocked", &config, now);
        limiter.check_at("blocked", &config, now);
        limiter.check_at("recent", &config, now + Duration::minutes(90));

        let evicted = limiter.cleanup_at(now + Duration::hours(2) + Duration::seconds(1));
        assert_eq!(evicted, 1);
        assert!(limiter.get("stale").is_none());
        assert!(limiter.get("blocked").is_some());
        assert!(limiter.get("recent").is_some());
    }

    #[test]
    fn test_cleanup_respects_custom_retention() {
        let limiter = RateLimiter::with_retention(Duration::minutes(5));
        let config = RateLimitConfig::new(3, 60_000, 60_000);
        let now = t0();

        limiter.check_at("k", &config, now);
        assert_eq!(limiter.cleanup_at(now + Duration::minutes(5)), 0);
        assert_eq!(limiter.cleanup_at(now + Duration::minutes(6)), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_clones_share_store() {
        let limiter = RateLimiter::new();
        let clone = limiter.clone();
        let config = RateLimitConfig::new(3, 60_000, 60_000);

        clone.check_at("k", &config, t0());
        assert_eq!(limiter.get("k").unwrap().count, 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_budget() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(50, 60 * 60_000, 60 * 60_000);
        let now = t0();

        let allowed: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let limiter = limiter.clone();
                    scope.spawn(move || {
                        (0..20)
                            .filter(|_| limiter.check_at("shared", &config, now).allowed)
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_generate_rate_limit_key() {
        assert_eq!(generate_rate_limit_key(["a", "b"]), "a:b");
        assert_eq!(generate_rate_limit_key(["", "b", ""]), "b");
        assert_eq!(generate_rate_limit_key(Vec::<String>::new()), "");
        assert_eq!(
            generate_rate_limit_key(vec!["email".to_string(), "1.2.3.4".to_string()]),
            "email:1.2.3.4"
        );
    }

    #[test]
    fn test_decision_serialization_skips_empty_fields() {
        let json = serde_json::to_value(RateLimitDecision::allow(3)).unwrap();
        assert_eq!(json, serde_json::json!({"allowed": true, "remaining": 3}));
    }
}
