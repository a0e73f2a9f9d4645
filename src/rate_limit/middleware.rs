use crate::api::routes::AppState;
use crate::domain::audit::{AuditEvent, LogType, Severity};
use crate::errors::AppError;
use crate::observability::metrics;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Sentinel identifier used when no proxy header yields a client address
const UNKNOWN_CLIENT_IP: &str = "0.0.0.0";

/// Rate limiting middleware for the admin surface
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = extract_client_ip(&headers);

    let decision = {
        let mut limiter = state.rate_limiter.lock().await;
        limiter.check_ip_limit(&client_ip).await
    };

    if !decision.allowed {
        let retry_after = decision.retry_after().unwrap_or(0);

        tracing::warn!(
            client_ip = %client_ip,
            limit = decision.limit,
            attempts = decision.attempts,
            "Rate limit exceeded"
        );
        metrics::record_rate_limit_exceeded("ip");

        let event = AuditEvent::new(LogType::RateLimitExceeded, Severity::Warning, "ip_rate_limit")
            .with_context(Some(client_ip.clone()), user_agent(&headers))
            .with_details(serde_json::json!({
                "identifier": client_ip,
                "limit": decision.limit,
                "attempts": decision.attempts,
            }));
        // Audit failure must not block the rejection itself
        let _ = state.audit.log(event).await;

        return Err(AppError::RateLimitExceeded {
            retry_after_seconds: retry_after,
        });
    }

    let mut response = next.run(request).await;
    add_rate_limit_headers(response.headers_mut(), &decision);

    Ok(response)
}

/// Resolve the client address from proxy headers, first match wins:
/// forwarded-for first hop, then the CDN header, then the reverse
/// proxy header, then the sentinel address.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            let first_hop = value.split(',').next().unwrap_or("").trim();
            if !first_hop.is_empty() {
                return first_hop.to_string();
            }
        }
    }

    if let Some(cdn_ip) = headers.get("cf-connecting-ip") {
        if let Ok(value) = cdn_ip.to_str() {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    UNKNOWN_CLIENT_IP.to_string()
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Add rate limit headers to the response
fn add_rate_limit_headers(
    headers: &mut HeaderMap,
    decision: &crate::rate_limit::fixed_window::RateLimitDecision,
) {
    use axum::http::header::HeaderName;

    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), value);
    }

    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), value);
    }

    if let Ok(value) = HeaderValue::from_str(&(decision.reset_at_ms / 1000).to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-reset"), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.42"));

        assert_eq!(extract_client_ip(&headers), "192.168.1.1");
    }

    #[test]
    fn test_cdn_header_before_reverse_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.42"));

        assert_eq!(extract_client_ip(&headers), "198.51.100.7");
    }

    #[test]
    fn test_reverse_proxy_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.42"));

        assert_eq!(extract_client_ip(&headers), "203.0.113.42");
    }

    #[test]
    fn test_sentinel_when_no_headers() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), "0.0.0.0");
    }

    #[test]
    fn test_empty_forwarded_for_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.42"));

        assert_eq!(extract_client_ip(&headers), "203.0.113.42");
    }
}
