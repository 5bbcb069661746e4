use crate::{error::ApiError, state::AppState};
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use fitprime_core::generate_rate_limit_key;
use fitprime_webhook::{
    StevoEnvelope, WebhookError, WebhookRateLimitDecision, authenticate_request,
    validate_stevo_payload,
};
use serde_json::Value;
use tracing::warn;

/// Largest webhook body accepted, in bytes
pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

/// Authenticated and shape-checked Stevo webhook
///
/// Extraction runs, in order:
/// 1. the per-instance fixed-window limit
/// 2. token (and, when a secret is configured, signature) verification
/// 3. JSON parsing and envelope validation
#[derive(Debug)]
pub struct VerifiedStevoWebhook {
    pub instance: String,
    pub envelope: StevoEnvelope,
    pub payload: Value,
    pub rate_limit: WebhookRateLimitDecision,
}

impl FromRequest<AppState> for VerifiedStevoWebhook {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        let Path(instance) = Path::<String>::from_request_parts(&mut parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid instance path: {}", e)))?;

        // Throttle before doing any crypto work
        let key = generate_rate_limit_key(["webhook", instance.as_str()]);
        let rate_limit = state.webhook_limiter.check(
            &key,
            state.webhook_limits.max_requests,
            state.webhook_limits.window,
        );
        if !rate_limit.allowed {
            return Err(ApiError::from_webhook_decision(&rate_limit));
        }

        let body_bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY)
            .await
            .map_err(|e| ApiError::InvalidPayload(format!("Failed to read request body: {}", e)))?;

        authenticate_request(
            &state.token_registry,
            state.webhook_secret.as_ref(),
            &instance,
            &parts.headers,
            &body_bytes,
        )?;

        let payload: Value = serde_json::from_slice(&body_bytes)?;
        let envelope = validate_stevo_payload(&payload).map_err(|e| {
            warn!("Rejected webhook payload for instance {}: {}", instance, e);
            WebhookError::from(e)
        })?;

        Ok(VerifiedStevoWebhook {
            instance,
            envelope,
            payload,
            rate_limit,
        })
    }
}
