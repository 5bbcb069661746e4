use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use fitprime_api::{SweepSettings, WebhookLimits};
use fitprime_core::RateLimitConfig;
use fitprime_webhook::UnregisteredInstancePolicy;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Longest window, retention or sweep period accepted
const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

/// Complete application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub webhook: WebhookConfig,
    pub admin: AdminConfig,
    pub sweep: SweepConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take client addresses from `X-Forwarded-For`/`X-Real-IP`; enable only
    /// behind a reverse proxy that overwrites them
    pub trust_proxy_headers: bool,
}

/// Credentials guarding the admin routes and webhook bodies
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    pub admin_api_key: String,
    pub webhook_signing_secret: Option<String>,
    pub allow_unregistered_instances: bool,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("admin_api_key", &"[REDACTED]")
            .field(
                "webhook_signing_secret",
                &self.webhook_signing_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "allow_unregistered_instances",
                &self.allow_unregistered_instances,
            )
            .finish()
    }
}

/// Per-instance webhook window
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

/// Lockout applied to failed admin key attempts, per client address
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub max_attempts: u32,
    pub window_seconds: u64,
    pub block_seconds: u64,
}

/// Background sweep periods and rate limit record retention
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    pub rate_limit_interval_seconds: u64,
    pub webhook_interval_seconds: u64,
    pub retention_seconds: u64,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. config.toml file (if present)
    /// 3. Environment variables (prefixed with FITPRIME_)
    ///
    /// Environment variables use double underscore for nesting:
    /// - FITPRIME_SERVER__PORT=9000
    /// - FITPRIME_SECURITY__ADMIN_API_KEY=...
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?;

        // Try to load config.toml if it exists
        let builder = if Path::new("config.toml").exists() {
            builder.add_source(File::with_name("config"))
        } else {
            builder
        };

        // Override with environment variables
        let builder = builder.add_source(
            Environment::with_prefix("FITPRIME")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.trust_proxy_headers", false)?
            .set_default("security.allow_unregistered_instances", false)?
            .set_default("webhook.max_requests", 100)?
            .set_default("webhook.window_seconds", 60)?
            .set_default("admin.max_attempts", 5)?
            .set_default("admin.window_seconds", 900)?
            .set_default("admin.block_seconds", 900)?
            .set_default("sweep.rate_limit_interval_seconds", 600)?
            .set_default("sweep.webhook_interval_seconds", 300)?
            .set_default("sweep.retention_seconds", 7200)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let mut config: Self = builder.build()?.try_deserialize()?;
        // An empty secret in the environment means "not configured"
        if config
            .security
            .webhook_signing_secret
            .as_deref()
            .is_some_and(str::is_empty)
        {
            config.security.webhook_signing_secret = None;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.admin_api_key.is_empty() {
            return Err(ConfigError::Message(
                "security.admin_api_key must not be empty".to_string(),
            ));
        }
        if self.webhook.max_requests == 0 || self.webhook.window_seconds == 0 {
            return Err(ConfigError::Message(
                "webhook.max_requests and webhook.window_seconds must be positive".to_string(),
            ));
        }
        if self.sweep.rate_limit_interval_seconds == 0 || self.sweep.webhook_interval_seconds == 0
        {
            return Err(ConfigError::Message(
                "sweep intervals must be positive".to_string(),
            ));
        }
        if self.webhook.window_seconds > MAX_DURATION_SECS
            || self.sweep.retention_seconds > MAX_DURATION_SECS
            || self.sweep.rate_limit_interval_seconds > MAX_DURATION_SECS
            || self.sweep.webhook_interval_seconds > MAX_DURATION_SECS
        {
            return Err(ConfigError::Message(format!(
                "durations must not exceed {} seconds",
                MAX_DURATION_SECS
            )));
        }
        self.admin_limit()
            .validate()
            .map_err(|e| ConfigError::Message(format!("admin: {}", e)))?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn unregistered_policy(&self) -> UnregisteredInstancePolicy {
        if self.security.allow_unregistered_instances {
            UnregisteredInstancePolicy::Allow
        } else {
            UnregisteredInstancePolicy::Reject
        }
    }

    pub fn webhook_limits(&self) -> WebhookLimits {
        WebhookLimits {
            max_requests: self.webhook.max_requests,
            window: saturating_seconds(self.webhook.window_seconds),
        }
    }

    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            rate_limit_interval: Duration::from_secs(self.sweep.rate_limit_interval_seconds),
            webhook_interval: Duration::from_secs(self.sweep.webhook_interval_seconds),
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        saturating_seconds(self.sweep.retention_seconds)
    }

    pub fn admin_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(
            self.admin.max_attempts,
            self.admin.window_seconds.saturating_mul(1000),
            self.admin.block_seconds.saturating_mul(1000),
        )
    }
}

fn saturating_seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
