//! HTTP plumbing shared by the routing providers.
//!
//! - One pooled `reqwest::Client` per aggregator, shared by every provider
//! - Request/response phases timed and logged
//! - Status, transport and decoding failures mapped to [`RouteError`] with the
//!   provider's name attached
//!
//! Requests are never retried; a failed provider simply contributes no routes.

use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{Result, RouteError};
use crate::providers::ProviderKind;

const REQUEST_TIMEOUT_SECS: u64 = 20;
const MAX_IDLE_PER_HOST: usize = 4;

/// Build the HTTP client shared by all providers.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| RouteError::Client(e.to_string()))
}

/// Send a request and decode a JSON body.
///
/// Non-2xx responses are passed to `error_message` so each provider can pull the
/// human-readable message out of its own error payload.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: ProviderKind,
    request: RequestBuilder,
    error_message: fn(&[u8]) -> Option<String>,
) -> Result<T> {
    let req_start = Instant::now();

    // Phase 1: send request, receive headers
    let response = request.send().await.map_err(|e| RouteError::Request {
        provider,
        message: e.to_string(),
    })?;
    let headers_elapsed = req_start.elapsed();
    let status = response.status();

    // Phase 2: download body
    let bytes = response.bytes().await.map_err(|e| RouteError::Request {
        provider,
        message: format!("body download error: {}", e),
    })?;

    if !status.is_success() {
        let message = error_message(&bytes)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        warn!("[{}] HTTP {} after {:?}: {}", provider, status, headers_elapsed, message);
        return Err(RouteError::Http {
            provider,
            status: status.as_u16(),
            message,
        });
    }

    // Phase 3: JSON deserialization
    let data = serde_json::from_slice(&bytes).map_err(|e| RouteError::MalformedResponse {
        provider,
        message: e.to_string(),
    })?;

    debug!(
        "[{}] headers={:?} total={:?} ({:.1}KB)",
        provider,
        headers_elapsed,
        req_start.elapsed(),
        bytes.len() as f64 / 1024.0
    );

    Ok(data)
}
