use crate::error::{WebhookError, WebhookResult};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value, followed by the lowercase hex digest
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Shared secret used to sign inbound webhook bodies
#[derive(Clone)]
pub struct WebhookSecret(Arc<SecretString>);

impl WebhookSecret {
    pub fn new(secret: String) -> Self {
        Self(Arc::new(SecretString::from(secret)))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        validate_webhook_signature(payload, signature, self.expose())
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret([REDACTED])")
    }
}

/// Compute the `sha256=<hex>` signature header value for a payload
pub fn sign_payload(payload: &[u8], secret: &str) -> WebhookResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::HmacError(format!("HMAC initialization failed: {}", e)))?;

    mac.update(payload);
    let digest = mac.finalize().into_bytes();

    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest)))
}

/// Check a `sha256=<hex>` signature against the HMAC-SHA256 of `payload`
///
/// Never panics: malformed or wrong-length signatures simply fail.
pub fn validate_webhook_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = match sign_payload(payload, secret) {
        Ok(expected) => expected,
        Err(e) => {
            warn!("Could not compute webhook signature: {}", e);
            return false;
        }
    };

    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

/// Compare two secrets without leaking where they differ
///
/// Lengths are compared first; only equal-length inputs reach the
/// constant-time comparison.
///
/// # Examples
///
/// ```
/// use fitprime_webhook::signature::constant_time_eq;
///
/// assert!(constant_time_eq(b"abc", b"abc"));
/// assert!(!constant_time_eq(b"abc", b"abd"));
/// assert!(!constant_time_eq(b"abc", b"abcd"));
/// ```
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
