pub mod admin_handlers;
pub mod auth_middleware;
pub mod error;
pub mod extractors;
pub mod health;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
pub mod webhook_handler;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extractors::VerifiedStevoWebhook;
pub use health::health;
pub use rate_limit::{PresetLimit, client_ip, enforce_preset};
pub use routes::build_router;
pub use services::{GuardServices, SweepSettings};
pub use state::{AdminKey, AppState, WebhookLimits};
pub use webhook_handler::handle_stevo_webhook;
