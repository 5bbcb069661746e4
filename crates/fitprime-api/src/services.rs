use chrono::Duration;
use fitprime_core::{RateLimiter, Sweeper};
use fitprime_webhook::{TokenRegistry, UnregisteredInstancePolicy, WebhookRateLimiter};
use tracing::{info, warn};

/// Sweep periods for the in-memory stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    pub rate_limit_interval: std::time::Duration,
    pub webhook_interval: std::time::Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            rate_limit_interval: std::time::Duration::from_secs(10 * 60),
            webhook_interval: std::time::Duration::from_secs(5 * 60),
        }
    }
}

/// Owner of the guard stores and their background sweepers
///
/// Handlers receive clones of the stores through [`crate::AppState`]; the
/// sweepers live here so the server controls when they start and stop.
pub struct GuardServices {
    rate_limiter: RateLimiter,
    token_registry: TokenRegistry,
    webhook_limiter: WebhookRateLimiter,
    sweepers: Vec<Sweeper>,
}

impl Default for GuardServices {
    fn default() -> Self {
        Self::new(RateLimiter::new(), UnregisteredInstancePolicy::default())
    }
}

impl GuardServices {
    pub fn new(rate_limiter: RateLimiter, policy: UnregisteredInstancePolicy) -> Self {
        Self {
            rate_limiter,
            token_registry: TokenRegistry::new(policy),
            webhook_limiter: WebhookRateLimiter::new(),
            sweepers: Vec::new(),
        }
    }

    /// Services whose rate limiter keeps idle records for `retention`
    pub fn with_retention(retention: Duration, policy: UnregisteredInstancePolicy) -> Self {
        Self::new(RateLimiter::with_retention(retention), policy)
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn token_registry(&self) -> &TokenRegistry {
        &self.token_registry
    }

    pub fn webhook_limiter(&self) -> &WebhookRateLimiter {
        &self.webhook_limiter
    }

    pub fn is_running(&self) -> bool {
        !self.sweepers.is_empty() && self.sweepers.iter().all(Sweeper::is_running)
    }

    /// Spawn the sweepers; must be called inside a tokio runtime
    pub fn start(&mut self, settings: &SweepSettings) {
        if !self.sweepers.is_empty() {
            warn!("Guard services already started");
            return;
        }

        self.sweepers.push(Sweeper::start(
            self.rate_limiter.clone(),
            settings.rate_limit_interval,
        ));
        self.sweepers.push(Sweeper::start(
            self.webhook_limiter.clone(),
            settings.webhook_interval,
        ));
        info!("Guard services started");
    }

    /// Stop every sweeper and wait for them to exit
    pub async fn stop(&mut self) {
        for sweeper in self.sweepers.drain(..) {
            sweeper.stop().await;
        }
        info!("Guard services stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitprime_core::RateLimitConfig;

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let mut services = GuardServices::default();
        assert!(!services.is_running());

        services.start(&SweepSettings::default());
        assert!(services.is_running());

        // Starting twice keeps the existing sweepers
        services.start(&SweepSettings::default());
        assert!(services.is_running());

        services.stop().await;
        assert!(!services.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweepers_evict_stale_entries() {
        let mut services =
            GuardServices::with_retention(Duration::zero(), UnregisteredInstancePolicy::Reject);
        let past = chrono::Utc::now() - Duration::minutes(10);

        services
            .rate_limiter()
            .check_at("k", &RateLimitConfig::new(3, 60_000, 60_000), past);
        services
            .webhook_limiter()
            .check_at("webhook:inst", 10, Duration::seconds(60), past);

        services.start(&SweepSettings {
            rate_limit_interval: std::time::Duration::from_secs(10),
            webhook_interval: std::time::Duration::from_secs(5),
        });
        tokio::time::sleep(std::time::Duration::from_secs(11)).await;

        assert!(services.rate_limiter().is_empty());
        assert!(services.webhook_limiter().is_empty());
        services.stop().await;
    }
}
