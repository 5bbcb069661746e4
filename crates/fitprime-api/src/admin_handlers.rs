use crate::error::{ApiError, ApiResult};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use fitprime_core::{RateLimitRecord, RateLimiter};
use fitprime_webhook::TokenRegistry;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Freshly issued webhook token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub instance: String,
    pub token: String,
}

/// Registration status; the token itself is never echoed back
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenStatusResponse {
    pub instance: String,
    pub registered: bool,
}

/// Current limiter state for one key
#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitStatusResponse {
    pub key: String,
    #[serde(flatten)]
    pub record: RateLimitRecord,
}

/// POST /api/admin/webhook-tokens/{instance}
///
/// Issues a new token, replacing any previous one for the instance.
pub async fn generate_webhook_token(
    State(registry): State<TokenRegistry>,
    Path(instance): Path<String>,
) -> ApiResult<impl IntoResponse> {
    validate_instance_name(&instance)?;

    let token = registry.generate(&instance);
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse { instance, token }),
    ))
}

/// GET /api/admin/webhook-tokens/{instance}
pub async fn webhook_token_status(
    State(registry): State<TokenRegistry>,
    Path(instance): Path<String>,
) -> ApiResult<Json<TokenStatusResponse>> {
    if !registry.contains(&instance) {
        return Err(ApiError::NotFound(format!(
            "No webhook token registered for instance {}",
            instance
        )));
    }

    Ok(Json(TokenStatusResponse {
        instance,
        registered: true,
    }))
}

/// DELETE /api/admin/webhook-tokens/{instance}
pub async fn revoke_webhook_token(
    State(registry): State<TokenRegistry>,
    Path(instance): Path<String>,
) -> ApiResult<StatusCode> {
    if registry.remove(&instance) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "No webhook token registered for instance {}",
            instance
        )))
    }
}

/// GET /api/admin/rate-limits/{key}
pub async fn rate_limit_status(
    State(limiter): State<RateLimiter>,
    Path(key): Path<String>,
) -> ApiResult<Json<RateLimitStatusResponse>> {
    let record = limiter
        .get(&key)
        .ok_or_else(|| ApiError::NotFound(format!("No rate limit record for key {}", key)))?;

    Ok(Json(RateLimitStatusResponse { key, record }))
}

/// DELETE /api/admin/rate-limits/{key}
///
/// Clears the record unconditionally, lifting any active block.
pub async fn reset_rate_limit(
    State(limiter): State<RateLimiter>,
    Path(key): Path<String>,
) -> StatusCode {
    limiter.reset(&key);
    info!("Rate limit manually reset for key {}", key);
    StatusCode::NO_CONTENT
}

fn validate_instance_name(instance: &str) -> ApiResult<()> {
    let valid = !instance.is_empty()
        && instance.len() <= 128
        && instance
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid instance name: {}",
            instance
        )))
    }
}
