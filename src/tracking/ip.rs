//! Client IP extraction from HTTP headers with socket-address fallback.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Extract the client IP for ban checks and visitor identity.
///
/// Proxied deployments put the client address in `X-Forwarded-For` (first
/// entry) or `X-Real-IP`; otherwise the socket remote address is used.
/// Returns an empty string when nothing is available, which simply never
/// matches an existing record or a ban entry.
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: Option<SocketAddr>) -> String {
    if let Some(ip) = extract_from_x_forwarded_for(headers) {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    socket_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    xff.split(',')
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}
