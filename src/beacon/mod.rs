//! Outbound analytics beacon.
//!
//! Builds a url-encoded collector payload from request metadata and the
//! response's page title, and dispatches it on a detached task with its own
//! timeout. Delivery is strictly best-effort: every failure is swallowed and
//! the response reaches the client unchanged.

use anyhow::Result;
use axum::{
    body::{to_bytes, Body, HttpBody},
    http::header,
    response::Response,
};
use rand::RngExt;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").unwrap());

/// Collector protocol version.
const PROTOCOL_VERSION: &str = "4.3";

/// Largest HTML body buffered for title extraction. The title lives in the
/// document head, so anything bigger (or of unknown size) is delivered
/// unbuffered with an empty title rather than held in memory.
const TITLE_SCAN_LIMIT: usize = 256 * 1024;

/// Request metadata carried into the beacon payload.
#[derive(Debug, Clone, Default)]
pub struct BeaconContext {
    pub host: String,
    pub path: String,
    pub referer: String,
    pub ip_address: String,
    pub user_agent: String,
    pub title: String,
}

/// Best-effort title extraction; empty string when the body has no title tag.
pub fn extract_title(body: &str) -> String {
    TITLE_RE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Pull the page title out of an HTML response, handing the body back
/// intact. Non-HTML responses pass through untouched with an empty title.
pub async fn capture_title(response: Response) -> (Response, String) {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));

    if !is_html {
        return (response, String::new());
    }

    // Only bodies provably within the scan limit get buffered; streaming
    // bodies and oversized pages pass through untouched.
    let within_limit = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= TITLE_SCAN_LIMIT as u64);
    if !within_limit {
        return (response, String::new());
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, TITLE_SCAN_LIMIT).await {
        Ok(bytes) => {
            let title = extract_title(&String::from_utf8_lossy(&bytes));
            (Response::from_parts(parts, Body::from(bytes)), title)
        }
        Err(err) => {
            debug!(error = %err, "failed to buffer response body for title extraction");
            (Response::from_parts(parts, Body::empty()), String::new())
        }
    }
}

/// Dispatches beacon payloads to the external analytics collector.
pub struct AnalyticsForwarder {
    client: reqwest::Client,
    endpoint: String,
    account_id: String,
}

impl AnalyticsForwarder {
    pub fn new(endpoint: &str, account_id: &str, timeout_secs: u64) -> Result<Self> {
        // The beacon client's timeout is independent of any request's
        // lifetime; a slow collector can never hold a response hostage.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            account_id: account_id.to_string(),
        })
    }

    /// Fire-and-forget dispatch on a detached task. Failures are logged at
    /// debug and never surfaced.
    pub fn dispatch(&self, context: BeaconContext) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let account_id = self.account_id.clone();

        tokio::spawn(async move {
            let now = chrono::Utc::now().timestamp();
            let payload = build_payload(&context, &account_id, now);

            if let Err(err) = client.get(&endpoint).query(&payload).send().await {
                debug!(error = %err, "analytics beacon dispatch failed");
            }
        });
    }
}

/// Assemble the url-encoded beacon fields: protocol version, randomized
/// anti-cache tokens, timestamp, title, host, referer, path, account id,
/// and the `"{ip}; {user_agent}"` client fingerprint. Screen and locale
/// fields are unknowable server-side and fixed to `-`.
pub fn build_payload(
    context: &BeaconContext,
    account_id: &str,
    now: i64,
) -> Vec<(&'static str, String)> {
    let mut rng = rand::rng();
    let request_token: u64 = rng.random_range(1_000_000_000..=9_999_999_999);
    let cookie_token: u64 = rng.random_range(10_000_000..=99_999_999);
    let session_token: u64 = rng.random_range(1_000_000_000..=2_147_483_647);

    let fingerprint = format!("{}; {}", context.ip_address, context.user_agent);
    let session_cookie = format!(
        "__utma={cookie}.{session}.{now}.{now}.{now}.2;\
         +__utmb={cookie};+__utmc={cookie};\
         +__utmz={cookie}.{now}.2.2.utmccn=(direct)|utmcsr=(direct)|utmcmd=(none);\
         +__utmv={cookie}.{fingerprint};",
        cookie = cookie_token,
        session = session_token,
        now = now,
        fingerprint = fingerprint,
    );

    vec![
        ("utmwv", PROTOCOL_VERSION.to_string()),
        ("utmn", request_token.to_string()),
        ("utmsr", "-".to_string()),
        ("utmsc", "-".to_string()),
        ("utmul", "-".to_string()),
        ("utmje", "-".to_string()),
        ("utmfl", "-".to_string()),
        ("utmdt", context.title.clone()),
        ("utmhn", context.host.clone()),
        ("utmr", context.referer.clone()),
        ("utmp", context.path.clone()),
        ("utmac", account_id.to_string()),
        ("utmcc", session_cookie),
    ]
}
