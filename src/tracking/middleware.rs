use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::beacon::{capture_title, AnalyticsForwarder, BeaconContext};
use crate::registry::BanRegistry;
use crate::tracking::ip::extract_client_ip;
use crate::tracking::processor::{PageRequest, TrackingProcessor};

/// Cookie carrying the opaque session identifier.
pub const SESSION_COOKIE: &str = "sessionid";

/// Authenticated identity, inserted as a request extension by the host
/// application's auth layer when present.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

pub struct TrackingState {
    pub processor: TrackingProcessor,
    pub bans: Arc<dyn BanRegistry>,
    /// `None` disables the beacon entirely (no collector account configured)
    pub forwarder: Option<AnalyticsForwarder>,
}

/// Request-tracking middleware: ban gate, best-effort visitor tracking,
/// and fire-and-forget beacon dispatch on the response path.
///
/// Only the ban gate may alter the client-visible outcome; tracking and
/// beacon failures are logged and isolated from the response.
pub async fn track_requests(
    State(state): State<Arc<TrackingState>>,
    request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let headers = request.headers();
    let ip_address = extract_client_ip(headers, socket_addr);

    // Ban gate runs before anything else. The rejection is deliberately
    // indistinguishable from a missing page, and a lookup failure fails
    // open so storage trouble cannot take the whole site down.
    match state.bans.is_banned(&ip_address).await {
        Ok(true) => return (StatusCode::NOT_FOUND, "not found").into_response(),
        Ok(false) => {}
        Err(err) => warn!(error = %err, "ban list lookup failed, allowing request"),
    }

    let page = PageRequest {
        session_key: session_key_from(headers),
        ip_address: ip_address.clone(),
        user_agent: header_string(headers, header::USER_AGENT),
        path: request.uri().path().to_string(),
        referrer: optional_header_string(headers, header::REFERER),
        user_id: request
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.0.clone()),
        background: is_background_request(headers),
    };
    let host = header_string(headers, header::HOST);
    let now = chrono::Utc::now().timestamp();

    // Tracking is best-effort: a storage failure must not abort the
    // response, so log and continue without tracking.
    if let Err(err) = state.processor.track(&page, now).await {
        warn!(error = %err, path = %page.path, "visitor tracking failed");
    }

    let response = next.run(request).await;

    match state.forwarder {
        Some(ref forwarder) => {
            let (response, title) = capture_title(response).await;
            forwarder.dispatch(BeaconContext {
                host,
                path: page.path,
                referer: page.referrer.unwrap_or_default(),
                ip_address,
                user_agent: page.user_agent,
                title,
            });
            response
        }
        None => response,
    }
}

/// Programmatic/background requests are never tracked.
fn is_background_request(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
}

fn session_key_from(headers: &HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .filter_map(|cookie| cookie.trim().split_once('='))
                .find(|(name, _)| *name == SESSION_COOKIE)
                .map(|(_, value)| value.to_string())
        })
        .unwrap_or_default()
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn optional_header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
