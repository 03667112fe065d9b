//! Forwards a data-plane operation to the shard that owns it and relays the
//! response verbatim (spec.md §4.3, step 5: "preserving its success/
//! not-found/error distinction").
//!
//! No retry, no fallback, no caching, no coalescing — each inbound request
//! becomes exactly one outbound request (spec.md §4.3, §5).

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use ringkv_common::RouteError;

/// Sends one request to `shard_addr` and returns the shard's raw response,
/// mapping transport failures onto [`RouteError`].
pub async fn forward(
    client: &reqwest::Client,
    shard_id: &str,
    shard_addr: SocketAddr,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    timeout: Duration,
) -> Result<Response, RouteError> {
    let url = format!("http://{shard_addr}{path}");
    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|err| RouteError::BadRequest(err.to_string()))?;

    let request = client.request(reqwest_method, &url).query(query).timeout(timeout);

    let response = request.send().await.map_err(|err| {
        if err.is_timeout() {
            RouteError::ShardUnreachable(shard_id.to_string(), "timed out".to_string())
        } else {
            RouteError::ShardUnreachable(shard_id.to_string(), err.to_string())
        }
    })?;

    relay(response).await
}

/// Converts a `reqwest::Response` into an axum `Response`, preserving the
/// status code, content-type, and body bytes exactly as the shard sent
/// them — the router must not re-derive success/failure from the body.
async fn relay(response: reqwest::Response) -> Result<Response, RouteError> {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let body = response
        .bytes()
        .await
        .map_err(|err| RouteError::ShardUnreachable("unknown".to_string(), err.to_string()))?;

    Ok(build_response(status, content_type, body))
}

fn build_response(status: StatusCode, content_type: Option<String>, body: Bytes) -> Response {
    let mut response = (status, body).into_response();
    if let Some(content_type) = content_type {
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            response.headers_mut().insert(axum::http::header::CONTENT_TYPE, value);
        }
    }
    response
}
