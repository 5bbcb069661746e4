pub mod config;
pub mod error;
pub mod rate_limit;
pub mod sweeper;

// Re-export commonly used types
pub use config::{RateLimitConfig, RateLimitPreset};
pub use error::{CoreError, CoreResult};
pub use rate_limit::{
    RateLimitDecision, RateLimitRecord, RateLimiter, generate_rate_limit_key, retry_message,
};
pub use sweeper::{Sweep, Sweeper};
