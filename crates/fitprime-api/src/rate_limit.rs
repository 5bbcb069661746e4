use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use fitprime_core::{RateLimitPreset, RateLimiter, generate_rate_limit_key};
use std::net::SocketAddr;
use tracing::warn;

/// Limiter plus the preset to enforce, used as middleware state
#[derive(Clone)]
pub struct PresetLimit {
    pub limiter: RateLimiter,
    pub preset: RateLimitPreset,
    pub trust_proxy_headers: bool,
}

impl PresetLimit {
    pub fn new(limiter: RateLimiter, preset: RateLimitPreset) -> Self {
        Self {
            limiter,
            preset,
            trust_proxy_headers: false,
        }
    }

    /// Key clients by `X-Forwarded-For`/`X-Real-IP`; only safe behind a proxy
    /// that overwrites those headers
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

/// Middleware that throttles a route per client address using a preset
pub async fn enforce_preset(
    State(limit): State<PresetLimit>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request, limit.trust_proxy_headers);
    let key = generate_rate_limit_key([limit.preset.as_str(), ip.as_str()]);
    let decision = limit.limiter.check(&key, &limit.preset.config());

    if !decision.allowed {
        warn!(
            "Request to {} rejected by {} limit for {}",
            request.uri().path(),
            limit.preset,
            ip
        );
        return ApiError::from_decision(&decision).into_response();
    }

    next.run(request).await
}

/// Best-effort client address
///
/// The socket address (available when the server runs with connect info) is
/// used unless `trust_proxy_headers` is set, in which case the first
/// `X-Forwarded-For` hop, then `X-Real-IP`, take precedence. Clients control
/// those headers, so they are ignored by default.
pub fn client_ip(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    from_header("x-forwarded-for").or_else(|| from_header("x-real-ip"))
}
