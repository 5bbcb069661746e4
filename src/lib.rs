//! FitPrime Manager edge guards
//!
//! Facade over the workspace crates:
//! - [`core`]: sliding-window rate limiter with lockout and the store sweeper
//! - [`webhook`]: webhook tokens, HMAC signatures, the fixed-window webhook
//!   limiter and Stevo payload validation
//! - [`api`]: axum router, middleware and handlers wiring the guards together

pub use fitprime_api as api;
pub use fitprime_core as core;
pub use fitprime_webhook as webhook;
