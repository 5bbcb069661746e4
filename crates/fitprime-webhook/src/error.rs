use crate::stevo::PayloadError;
use thiserror::Error;

/// Webhook crate error types
#[derive(Debug, Error, PartialEq)]
pub enum WebhookError {
    #[error("Webhook token not provided")]
    MissingToken,

    #[error("Invalid webhook token for instance {0}")]
    InvalidToken(String),

    #[error("Missing required header: {0}")]
    MissingSignature(String),

    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("HMAC error: {0}")]
    HmacError(String),

    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),
}

pub type WebhookResult<T> = Result<T, WebhookError>;
