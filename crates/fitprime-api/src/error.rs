use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fitprime_core::RateLimitDecision;
use fitprime_webhook::{WebhookError, WebhookRateLimitDecision};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

const WEBHOOK_LIMIT_MESSAGE: &str = "Limite de requisições excedido. Tente novamente em instantes.";

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Webhook authentication or payload error
    Webhook(WebhookError),

    /// Too many attempts (429)
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },

    /// Invalid request payload
    InvalidPayload(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404)
    NotFound(String),

    /// Bad request (400)
    BadRequest(String),
}

impl ApiError {
    /// Rejection for a lockout from the sliding-window limiter
    pub fn from_decision(decision: &RateLimitDecision) -> Self {
        let retry_after_secs = decision
            .blocked_until
            .map(|until| (until - Utc::now()).num_seconds().max(1) as u64)
            .unwrap_or(1);
        let message = decision
            .message
            .clone()
            .unwrap_or_else(|| WEBHOOK_LIMIT_MESSAGE.to_string());

        ApiError::RateLimited {
            message,
            retry_after_secs,
        }
    }

    /// Rejection for an exhausted webhook window
    pub fn from_webhook_decision(decision: &WebhookRateLimitDecision) -> Self {
        let retry_after_secs = (decision.reset_time - Utc::now()).num_seconds().max(1) as u64;

        ApiError::RateLimited {
            message: WEBHOOK_LIMIT_MESSAGE.to_string(),
            retry_after_secs,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Webhook(e) => write!(f, "Webhook error: {}", e),
            ApiError::RateLimited { message, .. } => write!(f, "Rate limited: {}", message),
            ApiError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, error_type, message) = match self {
            ApiError::Webhook(e) => {
                let (status, error_type) = match &e {
                    WebhookError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
                    WebhookError::InvalidToken(_) => (StatusCode::FORBIDDEN, "invalid_token"),
                    WebhookError::MissingSignature(_) => {
                        (StatusCode::UNAUTHORIZED, "missing_signature")
                    }
                    WebhookError::InvalidSignature(_) => {
                        (StatusCode::UNAUTHORIZED, "invalid_signature")
                    }
                    WebhookError::HmacError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                    }
                    WebhookError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
                };
                (status, error_type, e.to_string())
            }
            ApiError::RateLimited {
                message,
                retry_after_secs,
            } => {
                retry_after = Some(retry_after_secs);
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", message)
            }
            ApiError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, "invalid_payload", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let mut response = (status, Json(error_response)).into_response();
        if let Some(secs) = retry_after {
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u32));
        }
        response
    }
}

// Conversions from domain errors to ApiError
impl From<WebhookError> for ApiError {
    fn from(e: WebhookError) -> Self {
        ApiError::Webhook(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::InvalidPayload(format!("JSON parsing error: {}", e))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
