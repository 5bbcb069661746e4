pub mod error;
pub mod guard;
pub mod headers;
pub mod rate_limit;
pub mod signature;
pub mod stevo;
pub mod token;

// Re-export commonly used types
pub use error::{WebhookError, WebhookResult};
pub use guard::authenticate_request;
pub use headers::{SIGNATURE_HEADER, TOKEN_HEADER, extract_signature, extract_token};
pub use rate_limit::{WebhookRateLimitDecision, WebhookRateLimiter};
pub use signature::{
    SIGNATURE_PREFIX, WebhookSecret, constant_time_eq, sign_payload, validate_webhook_signature,
};
pub use stevo::{EnvelopeShape, PayloadError, StevoEnvelope, validate_stevo_payload};
pub use token::{TokenRegistry, UnregisteredInstancePolicy, generate_token};
