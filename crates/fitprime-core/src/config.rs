use crate::error::{CoreError, CoreResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

const MINUTE_MS: u64 = 60 * 1000;

/// Longest window or lockout accepted by [`RateLimitConfig::validate`]
pub const MAX_DURATION_MS: u64 = 366 * 24 * 60 * MINUTE_MS;

/// Named endpoint classes with their own strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitPreset {
    PasswordReset,
    Login,
    CodeVerification,
    Webhook,
}

impl RateLimitPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitPreset::PasswordReset => "password-reset",
            RateLimitPreset::Login => "login",
            RateLimitPreset::CodeVerification => "code-verification",
            RateLimitPreset::Webhook => "webhook",
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        RateLimitConfig::preset(*self)
    }
}

impl fmt::Display for RateLimitPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempt budget for one class of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Attempts allowed inside one window
    pub max_attempts: u32,

    /// Window length in milliseconds
    pub window_ms: u64,

    /// Lockout length in milliseconds once the budget is exceeded
    pub block_duration_ms: u64,
}

impl RateLimitConfig {
    pub fn new(max_attempts: u32, window_ms: u64, block_duration_ms: u64) -> Self {
        Self {
            max_attempts,
            window_ms,
            block_duration_ms,
        }
    }

    /// Built-in configuration for a preset
    ///
    /// # Examples
    ///
    /// ```
    /// use fitprime_core::config::{RateLimitConfig, RateLimitPreset};
    ///
    /// let config = RateLimitConfig::preset(RateLimitPreset::PasswordReset);
    /// assert_eq!(config.max_attempts, 3);
    /// assert_eq!(config.window_ms, 15 * 60 * 1000);
    /// assert_eq!(config.block_duration_ms, 30 * 60 * 1000);
    /// ```
    pub fn preset(preset: RateLimitPreset) -> Self {
        match preset {
            RateLimitPreset::PasswordReset => Self::new(3, 15 * MINUTE_MS, 30 * MINUTE_MS),
            RateLimitPreset::Login => Self::new(5, 15 * MINUTE_MS, 15 * MINUTE_MS),
            RateLimitPreset::CodeVerification => Self::new(5, 10 * MINUTE_MS, 30 * MINUTE_MS),
            RateLimitPreset::Webhook => Self::new(100, MINUTE_MS, 5 * MINUTE_MS),
        }
    }

    pub fn window(&self) -> Duration {
        saturating_millis(self.window_ms)
    }

    pub fn block_duration(&self) -> Duration {
        saturating_millis(self.block_duration_ms)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "window_ms must be greater than zero".to_string(),
            ));
        }
        if self.window_ms > MAX_DURATION_MS || self.block_duration_ms > MAX_DURATION_MS {
            return Err(CoreError::InvalidConfig(format!(
                "window_ms and block_duration_ms must not exceed {} ms",
                MAX_DURATION_MS
            )));
        }
        Ok(())
    }
}

/// Milliseconds to a `Duration`, clamped to `Duration::MAX`
fn saturating_millis(ms: u64) -> Duration {
    i64::try_from(ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .unwrap_or(Duration::MAX)
}
