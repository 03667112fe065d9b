//! # Router HTTP Surface
//!
//! The client-facing side of the wire contract (spec.md §6). Each data-plane
//! handler does the five steps of spec.md §4.3: parse, locate, resolve,
//! forward, relay.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, put};
use axum::{Json, Router};
use ringkv_common::wire::{DelQuery, GetQuery, MessageResponse, PutQuery, RemoveServerQuery};
use ringkv_common::RouteError;
use tracing::{debug, info};

use crate::{forward, membership, RouterState};

pub fn build_router(state: Arc<RouterState>) -> Router {
    Router::new()
        .route("/put", put(handle_put))
        .route("/get", get(handle_get))
        .route("/del", any(handle_del))
        .route("/add_server", axum::routing::post(handle_add_server))
        .route("/remove_server", axum::routing::post(handle_remove_server))
        .route("/shutdown", axum::routing::post(handle_shutdown))
        .with_state(state)
}

/// Resolves `key` to a reachable shard endpoint, per spec.md §4.3 steps 2-3.
fn resolve(state: &RouterState, key: &str) -> Result<(String, SocketAddr), RouteError> {
    let shard_id = state.ring.locate(key).ok_or(RouteError::NoShards)?;
    let addr = state
        .registry
        .get(shard_id.as_str())
        .ok_or_else(|| RouteError::UnknownShard(shard_id.to_string()))?;
    Ok((shard_id.to_string(), addr))
}

async fn handle_put(State(state): State<Arc<RouterState>>, Query(params): Query<PutQuery>) -> Response {
    debug!(key = %params.key, "routing PUT");
    let (shard_id, addr) = match resolve(&state, &params.key) {
        Ok(resolved) => resolved,
        Err(err) => return err.into_response(),
    };
    let query = [("key", params.key.as_str()), ("value", params.value.as_str())];
    forward_or_error(&state, &shard_id, addr, Method::PUT, "/put", &query).await
}

async fn handle_get(State(state): State<Arc<RouterState>>, Query(params): Query<GetQuery>) -> Response {
    debug!(key = %params.key, "routing GET");
    let (shard_id, addr) = match resolve(&state, &params.key) {
        Ok(resolved) => resolved,
        Err(err) => return err.into_response(),
    };
    let query = [("key", params.key.as_str())];
    forward_or_error(&state, &shard_id, addr, Method::GET, "/get", &query).await
}

async fn handle_del(
    State(state): State<Arc<RouterState>>,
    method: Method,
    Query(params): Query<DelQuery>,
) -> Response {
    if method.as_str() != "DEL" {
        return RouteError::BadRequest(format!("unsupported verb {method} for /del")).into_response();
    }
    debug!(key = %params.key, "routing DEL");
    let (shard_id, addr) = match resolve(&state, &params.key) {
        Ok(resolved) => resolved,
        Err(err) => return err.into_response(),
    };
    let query = [("key", params.key.as_str())];
    forward_or_error(&state, &shard_id, addr, Method::from_bytes(b"DEL").unwrap(), "/del", &query).await
}

async fn forward_or_error(
    state: &RouterState,
    shard_id: &str,
    addr: SocketAddr,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
) -> Response {
    match forward::forward(&state.client, shard_id, addr, method, path, query, state.request_timeout).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_add_server(State(state): State<Arc<RouterState>>) -> Response {
    match membership::add_shard(&state).await {
        Ok(_shard_id) => Json(MessageResponse::new("new server added to port")).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_remove_server(
    State(state): State<Arc<RouterState>>,
    Query(params): Query<RemoveServerQuery>,
) -> Response {
    match membership::remove_shard(&state, &params.port).await {
        Ok(()) => {
            Json(MessageResponse::new(format!("server at port {} has been removed", params.port))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Shuts the whole cluster down: every registered shard, then the router
/// itself. Acks before the listener actually stops, mirroring the per-shard
/// contract in spec.md §4.2.
async fn handle_shutdown(State(state): State<Arc<RouterState>>) -> Response {
    let shard_ids = state.ring.members();
    for shard_id in shard_ids {
        if let Some(addr) = state.registry.get(shard_id.as_str()) {
            let url = format!("http://{addr}/shutdown");
            let _ = state.client.post(&url).send().await;
        }
    }
    info!("router shutting down");

    tokio::spawn({
        let state = state.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            state.shutdown.notify_one();
        }
    });

    "Server shutting down...".into_response()
}
