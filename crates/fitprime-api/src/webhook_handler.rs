use crate::error::{RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER};
use crate::extractors::VerifiedStevoWebhook;
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use fitprime_webhook::EnvelopeShape;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Acknowledgement returned to the messaging provider
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    pub instance: String,
    pub shape: EnvelopeShape,
}

/// Webhook handler for Stevo (WhatsApp) events
///
/// Authentication, throttling and shape validation all happen in the
/// [`VerifiedStevoWebhook`] extractor; by the time this runs the event is
/// trusted and is acknowledged immediately.
pub async fn handle_stevo_webhook(webhook: VerifiedStevoWebhook) -> impl IntoResponse {
    let event = webhook
        .payload
        .get("event")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    info!(
        "Accepted {} webhook for instance {} from {} ({:?} envelope)",
        event,
        webhook.instance,
        webhook.envelope.sender().unwrap_or("unknown sender"),
        webhook.envelope.shape
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(webhook.rate_limit.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET_HEADER,
        HeaderValue::from(webhook.rate_limit.reset_time.timestamp()),
    );

    (
        StatusCode::OK,
        headers,
        Json(WebhookAck {
            status: "ok".to_string(),
            instance: webhook.instance,
            shape: webhook.envelope.shape,
        }),
    )
}
