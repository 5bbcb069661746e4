use crate::error::ApiError;
use crate::rate_limit::client_ip;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fitprime_core::generate_rate_limit_key;
use tracing::warn;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Auth middleware for operator routes
///
/// Attempts are throttled per client with `AppState::admin_limit` (the login
/// preset by default); a successful attempt clears the client's failure count.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request, state.trust_proxy_headers);
    let key = generate_rate_limit_key(["admin", ip.as_str()]);

    let decision = state
        .rate_limiter
        .check(&key, &state.admin_limit);
    if !decision.allowed {
        warn!("Admin access from {} locked out", ip);
        return ApiError::from_decision(&decision).into_response();
    }

    let authorized = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|provided| state.admin_key.matches(provided));

    match authorized {
        Some(true) => {
            state.rate_limiter.reset(&key);
            next.run(request).await
        }
        Some(false) => {
            warn!(
                "Invalid admin key from {} ({} attempts left)",
                ip, decision.remaining
            );
            ApiError::Unauthorized("Invalid admin key".to_string()).into_response()
        }
        None => {
            warn!("Admin request from {} without key", ip);
            ApiError::Unauthorized(format!("{} header not found", ADMIN_KEY_HEADER))
                .into_response()
        }
    }
}
