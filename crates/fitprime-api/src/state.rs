use crate::services::GuardServices;
use axum::extract::FromRef;
use chrono::Duration;
use fitprime_core::{RateLimitConfig, RateLimitPreset, RateLimiter};
use fitprime_webhook::{TokenRegistry, WebhookRateLimiter, WebhookSecret, constant_time_eq};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Instant;

/// Operator key required on `/api/admin` routes
#[derive(Clone)]
pub struct AdminKey(Arc<SecretString>);

impl AdminKey {
    pub fn new(key: String) -> Self {
        Self(Arc::new(SecretString::from(key)))
    }

    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.0.expose_secret();
        !expected.is_empty() && constant_time_eq(expected.as_bytes(), provided.as_bytes())
    }
}

/// Per-instance budget for webhook ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookLimits {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for WebhookLimits {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::seconds(60),
        }
    }
}

/// Application state for Axum dependency injection
///
/// This is the DI root that contains all shared resources needed by handlers:
/// - Sliding-window rate limiter for sensitive endpoints
/// - Webhook token registry
/// - Fixed-window webhook rate limiter
/// - Optional webhook signing secret for HMAC verification
/// - Admin key and its lockout budget for operator routes
#[derive(Clone)]
pub struct AppState {
    /// Per-key attempt limiter with lockout
    pub rate_limiter: RateLimiter,

    /// Tokens issued to messaging instances
    pub token_registry: TokenRegistry,

    /// Fixed-window limiter for webhook ingestion
    pub webhook_limiter: WebhookRateLimiter,

    /// Webhook secret for HMAC verification; signatures are not required when unset
    pub webhook_secret: Option<WebhookSecret>,

    /// Key expected in `X-Admin-Key`
    pub admin_key: AdminKey,

    /// Budget applied per instance by the webhook limiter
    pub webhook_limits: WebhookLimits,

    /// Failed admin key attempts allowed per client before lockout
    pub admin_limit: RateLimitConfig,

    /// Whether client addresses may be taken from forwarding headers
    pub trust_proxy_headers: bool,

    /// Process start, for the health endpoint
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state sharing the stores owned by `services`
    pub fn new(
        services: &GuardServices,
        admin_key: AdminKey,
        webhook_secret: Option<WebhookSecret>,
        webhook_limits: WebhookLimits,
    ) -> Self {
        Self {
            rate_limiter: services.rate_limiter().clone(),
            token_registry: services.token_registry().clone(),
            webhook_limiter: services.webhook_limiter().clone(),
            webhook_secret,
            admin_key,
            webhook_limits,
            admin_limit: RateLimitPreset::Login.config(),
            trust_proxy_headers: false,
            started_at: Instant::now(),
        }
    }

    pub fn with_admin_limit(mut self, admin_limit: RateLimitConfig) -> Self {
        self.admin_limit = admin_limit;
        self
    }

    /// Only enable behind a reverse proxy that overwrites `X-Forwarded-For`
    pub fn with_trusted_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl FromRef<AppState> for TokenRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.token_registry.clone()
    }
}
