use axum::http::header::{AUTHORIZATION, HeaderMap};

pub const TOKEN_HEADER: &str = "x-webhook-token";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Token presented by the caller
///
/// `X-Webhook-Token` wins; otherwise `Authorization` is used with any
/// `Bearer ` prefix stripped.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = header_str(headers, TOKEN_HEADER) {
        return Some(token);
    }

    let authorization = header_str(headers, AUTHORIZATION.as_str())?;
    let token = authorization
        .strip_prefix("Bearer ")
        .unwrap_or(authorization)
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Raw `X-Webhook-Signature` value (`sha256=<hex>`)
pub fn extract_signature(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, SIGNATURE_HEADER)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
