//! # Async Client API
//!
//! Purpose: Expose a compact async API for issuing `put`/`get`/`del`
//! requests to a ringkv router over its HTTP wire contract (spec.md §6).
//!
//! ## Design Principles
//! 1. **Facade Pattern**: [`KVClient`] hides the router's query-string
//!    wire format and custom `DEL` verb.
//! 2. **Fail Fast**: a non-2xx, non-404 router response surfaces as
//!    [`ClientError::Server`] immediately, carrying the router's own
//!    message body.
//! 3. **One Connection Pool**: a single `reqwest::Client` is shared across
//!    calls, reusing its keep-alive pool rather than dialing per request.

use std::time::Duration;

use serde::Deserialize;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or transport failure reaching the router.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The router responded with an error body.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The router's response body didn't match the expected shape.
    #[error("unexpected response shape")]
    UnexpectedResponse,
}

/// Configuration for the async client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Router base address, e.g. "http://127.0.0.1:5000".
    pub router_addr: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(router_addr: impl Into<String>) -> Self {
        ClientConfig { router_addr: router_addr.into(), timeout: Duration::from_secs(5) }
    }
}

#[derive(Debug, Deserialize)]
struct ValueResponse {
    value: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

/// Router errors come back as either `{"error": "..."}` (relayed verbatim
/// from a shard) or `{"message": "..."}` (raised by the router itself,
/// e.g. a 503 when the ring has no members) — see `RouteError::into_response`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
}

/// Async client with a shared connection pool.
///
/// A facade over `reqwest`, hiding the router's query-string request shape
/// and its custom `DEL` verb behind a plain `get`/`put`/`delete` API.
pub struct KVClient {
    http: reqwest::Client,
    router_addr: String,
}

impl KVClient {
    /// Creates a client with default configuration.
    pub fn connect(router_addr: impl Into<String>) -> ClientResult<Self> {
        Self::with_config(ClientConfig::new(router_addr))
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(KVClient { http, router_addr: config.router_addr })
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing, rather than an error,
    /// mirroring spec.md §6's 404-means-absent contract.
    pub async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let url = format!("{}/get", self.router_addr);
        let response = self.http.get(&url).query(&[("key", key)]).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.server_error(response).await);
        }
        let body: ValueResponse =
            response.json().await.map_err(|_| ClientError::UnexpectedResponse)?;
        Ok(Some(body.value))
    }

    /// Stores a value for a key.
    pub async fn put(&self, key: &str, value: &str) -> ClientResult<()> {
        let url = format!("{}/put", self.router_addr);
        let response = self.http.put(&url).query(&[("key", key), ("value", value)]).send().await?;
        self.expect_message(response).await.map(|_| ())
    }

    /// Deletes a key. A missing key is not an error: the router's own
    /// contract treats `DEL` as idempotent.
    pub async fn delete(&self, key: &str) -> ClientResult<()> {
        let url = format!("{}/del", self.router_addr);
        let response = self
            .http
            .request(reqwest::Method::from_bytes(b"DEL").expect("DEL is a valid token"), &url)
            .query(&[("key", key)])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.expect_message(response).await.map(|_| ())
    }

    /// Requests the cluster grow by one shard. Returns the router's ack
    /// message; the new shard's id is not part of the client-facing
    /// contract (spec.md §6).
    pub async fn add_server(&self) -> ClientResult<String> {
        let url = format!("{}/add_server", self.router_addr);
        let response = self.http.post(&url).send().await?;
        self.expect_message(response).await
    }

    /// Requests that the shard bound to `port` be removed from the
    /// cluster, migrating its keys first.
    pub async fn remove_server(&self, port: &str) -> ClientResult<String> {
        let url = format!("{}/remove_server", self.router_addr);
        let response = self.http.post(&url).query(&[("port", port)]).send().await?;
        self.expect_message(response).await
    }

    /// Shuts the whole cluster down: every shard, then the router.
    pub async fn shutdown(&self) -> ClientResult<()> {
        let url = format!("{}/shutdown", self.router_addr);
        let response = self.http.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.server_error(response).await);
        }
        Ok(())
    }

    async fn expect_message(&self, response: reqwest::Response) -> ClientResult<String> {
        if !response.status().is_success() {
            return Err(self.server_error(response).await);
        }
        let body: MessageResponse =
            response.json().await.map_err(|_| ClientError::UnexpectedResponse)?;
        Ok(body.message)
    }

    async fn server_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.or(body.message).unwrap_or_else(|| "unknown error".to_string()),
            Err(_) => "unknown error".to_string(),
        };
        ClientError::Server { status, message }
    }
}
