use crate::error::{WebhookError, WebhookResult};
use crate::headers::{SIGNATURE_HEADER, extract_signature, extract_token};
use crate::signature::WebhookSecret;
use crate::token::TokenRegistry;
use axum::http::HeaderMap;
use tracing::warn;

/// Authenticate an inbound webhook call for `instance`
///
/// The token is always required. The signature is only checked when a
/// signing secret is configured.
pub fn authenticate_request(
    registry: &TokenRegistry,
    secret: Option<&WebhookSecret>,
    instance: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> WebhookResult<()> {
    let token = extract_token(headers).ok_or(WebhookError::MissingToken)?;
    if !registry.validate(instance, Some(token)) {
        return Err(WebhookError::InvalidToken(instance.to_string()));
    }

    if let Some(secret) = secret {
        let signature = extract_signature(headers)
            .ok_or_else(|| WebhookError::MissingSignature(SIGNATURE_HEADER.to_string()))?;
        if !secret.verify(body, signature) {
            warn!("Webhook signature mismatch for instance {}", instance);
            return Err(WebhookError::InvalidSignature(
                "Signature mismatch".to_string(),
            ));
        }
    }

    Ok(())
}
