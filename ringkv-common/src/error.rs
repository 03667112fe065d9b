//! Error kinds for the ringkv cluster, mapped 1:1 onto the status codes and
//! JSON bodies in the wire contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Result alias for shard-local operations.
pub type RingKvResult<T> = Result<T, RingKvError>;

/// Errors a shard can return from a data-plane operation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RingKvError {
    /// The key is absent on this shard.
    #[error("key not found")]
    NotFound,
    /// The request was structurally invalid (missing key/value, bad param).
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for RingKvError {
    fn into_response(self) -> Response {
        match self {
            RingKvError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"error": "Key not found"}))).into_response()
            }
            RingKvError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
            }
        }
    }
}

/// Errors the router can return, layering transport and membership failures
/// on top of the shard-local [`RingKvError`] kinds.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The shard returned a data-plane error; relayed verbatim.
    #[error(transparent)]
    Shard(#[from] RingKvError),
    /// The ring has no members to route to.
    #[error("no shards available")]
    NoShards,
    /// The ring names a shard id absent from the registry.
    #[error("shard {0} is not in the registry")]
    UnknownShard(String),
    /// The shard did not respond (timeout or connection failure).
    #[error("shard {0} is unreachable: {1}")]
    ShardUnreachable(String, String),
    /// Malformed client request (bad verb, missing param, invalid port).
    #[error("bad request: {0}")]
    BadRequest(String),
    /// A remove-shard migration failed partway through.
    #[error("migration to shard {0} failed: {1}")]
    MigrationFailed(String, String),
    /// The target of a remove-shard request is not a current member.
    #[error("shard {0} doesn't exist")]
    ShardNotFound(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        match &self {
            RouteError::Shard(err) => return err.clone().into_response(),
            RouteError::NoShards => {
                tracing::error!("no shards available to route request");
            }
            RouteError::UnknownShard(id) => {
                tracing::error!(shard = %id, "ring names a shard missing from the registry");
            }
            RouteError::ShardUnreachable(id, reason) => {
                tracing::warn!(shard = %id, %reason, "shard unreachable");
            }
            RouteError::MigrationFailed(id, reason) => {
                tracing::error!(shard = %id, %reason, "migration failed");
            }
            RouteError::BadRequest(_) | RouteError::ShardNotFound(_) => {}
        }

        let (status, message) = match &self {
            RouteError::Shard(_) => unreachable!("handled above"),
            RouteError::NoShards => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            RouteError::UnknownShard(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            RouteError::ShardUnreachable(..) => (StatusCode::BAD_GATEWAY, self.to_string()),
            RouteError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RouteError::MigrationFailed(..) => (StatusCode::BAD_GATEWAY, self.to_string()),
            RouteError::ShardNotFound(id) => {
                (StatusCode::BAD_REQUEST, format!("server at port {id} doesn't exist"))
            }
        };

        (status, Json(json!({"message": message}))).into_response()
    }
}
