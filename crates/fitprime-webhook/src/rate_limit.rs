use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fitprime_core::Sweep;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW_MS: i64 = 60_000;

/// Outcome of a webhook rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct WindowCounter {
    count: u32,
    reset_time: DateTime<Utc>,
}

/// Fixed-window request counter for webhook ingestion
///
/// Unlike [`fitprime_core::RateLimiter`] there is no lockout: once
/// `reset_time` passes the whole window starts over.
#[derive(Clone, Default)]
pub struct WebhookRateLimiter {
    store: Arc<DashMap<String, WindowCounter>>,
}

impl WebhookRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check with the default budget of 100 requests per minute
    pub fn check_default(&self, key: &str) -> WebhookRateLimitDecision {
        self.check(
            key,
            DEFAULT_MAX_REQUESTS,
            Duration::milliseconds(DEFAULT_WINDOW_MS),
        )
    }

    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> WebhookRateLimitDecision {
        self.check_at(key, max_requests, window, Utc::now())
    }

    pub fn check_at(
        &self,
        key: &str,
        max_requests: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> WebhookRateLimitDecision {
        let fresh = WindowCounter {
            count: 1,
            reset_time: now
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let fresh_decision = WebhookRateLimitDecision {
            allowed: true,
            remaining: max_requests.saturating_sub(1),
            reset_time: fresh.reset_time,
        };

        let mut entry = match self.store.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                return fresh_decision;
            }
            Entry::Occupied(occupied) => occupied,
        };
        let counter = entry.get_mut();

        if now > counter.reset_time {
            *counter = fresh;
            return fresh_decision;
        }

        if counter.count >= max_requests {
            warn!(
                "Webhook rate limit exceeded for {} ({} requests), resets at {}",
                key, counter.count, counter.reset_time
            );
            return WebhookRateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time: counter.reset_time,
            };
        }

        counter.count += 1;
        WebhookRateLimitDecision {
            allowed: true,
            remaining: max_requests - counter.count,
            reset_time: counter.reset_time,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop windows that have already expired
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.store.len();
        self.store.retain(|_, counter| now <= counter.reset_time);
        before.saturating_sub(self.store.len())
    }
}

impl Sweep for WebhookRateLimiter {
    fn name(&self) -> &'static str {
        "webhook_rate_limit"
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.cleanup_at(now)
    }
}
