//! # Shard HTTP Surface
//!
//! One axum router per shard, exposing the data-plane ops from spec.md §4.2
//! plus the internal bulk-import/shutdown ops the membership controller
//! uses during migration. Mirrors `original_source/myKVServer.py`'s
//! `MyKVStore.routes()` (one Flask app per port) but over axum/tokio.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{any, get, put};
use axum::{Json, Router};
use ringkv_common::wire::{BulkImportRequest, DelQuery, GetQuery, MessageResponse, PutQuery, ValueResponse};
use ringkv_common::RingKvError;
use tokio::sync::Notify;
use tracing::info;

use crate::snapshot;
use crate::store::ShardStore;

/// Shared state for one shard's HTTP handlers.
pub struct ShardState {
    pub shard_id: String,
    pub store: Arc<dyn ShardStore>,
    pub snapshot_path: PathBuf,
    shutdown: Notify,
}

impl ShardState {
    pub fn new(shard_id: String, store: Arc<dyn ShardStore>, snapshot_path: PathBuf) -> Self {
        ShardState { shard_id, store, snapshot_path, shutdown: Notify::new() }
    }

    /// Resolves once `/shutdown` has been handled; used to drive axum's
    /// graceful-shutdown future.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.notified().await;
    }
}

pub fn build_router(state: Arc<ShardState>) -> Router {
    Router::new()
        .route("/put", put(handle_put))
        .route("/get", get(handle_get))
        .route("/del", any(handle_del))
        .route("/bulk_import", axum::routing::post(handle_bulk_import))
        .route("/dump", get(handle_dump))
        .route("/shutdown", axum::routing::post(handle_shutdown))
        .with_state(state)
}

async fn handle_put(
    State(state): State<Arc<ShardState>>,
    Query(params): Query<PutQuery>,
) -> impl IntoResponse {
    state.store.put(params.key, params.value);
    Json(MessageResponse::new("Value stored successfully"))
}

async fn handle_get(
    State(state): State<Arc<ShardState>>,
    Query(params): Query<GetQuery>,
) -> impl IntoResponse {
    match state.store.get(&params.key) {
        Ok(value) => Json(ValueResponse { value }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_del(
    State(state): State<Arc<ShardState>>,
    method: Method,
    Query(params): Query<DelQuery>,
) -> impl IntoResponse {
    if method.as_str() != "DEL" {
        return RingKvError::BadRequest(format!("unsupported verb {method} for /del")).into_response();
    }
    match state.store.delete(&params.key) {
        Ok(()) => Json(MessageResponse::new("Key deleted successfully")).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_bulk_import(
    State(state): State<Arc<ShardState>>,
    Json(body): Json<BulkImportRequest>,
) -> impl IntoResponse {
    let imported = body.entries.len();
    state.store.bulk_import(body.entries);
    info!(shard = %state.shard_id, imported, "bulk import applied");
    Json(MessageResponse::new("bulk import applied"))
}

/// Internal RPC used by the membership controller to read a shard's live
/// map during migration. Never backed by the snapshot file (spec.md §4.2).
async fn handle_dump(State(state): State<Arc<ShardState>>) -> impl IntoResponse {
    Json(BulkImportRequest { entries: state.store.snapshot() })
}

/// Shuts the shard down and reports its final live map in the response
/// body, so the caller (the router's membership controller, during a
/// remove-shard migration) can import whatever landed between its last
/// `/dump` and this call without a further round trip (spec.md §9 option
/// (b): the shutdown ack itself carries the last writes).
async fn handle_shutdown(State(state): State<Arc<ShardState>>) -> impl IntoResponse {
    let map = state.store.snapshot();
    if let Err(err) = snapshot::save(&state.snapshot_path, &map).await {
        tracing::error!(shard = %state.shard_id, %err, "final snapshot flush failed during shutdown");
    }
    info!(shard = %state.shard_id, keys = map.len(), "shard shutting down");

    // Respond before tearing down the listener: the caller (the router's
    // membership controller) must observe the ack, per spec.md §4.2.
    tokio::spawn({
        let state = state.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            state.shutdown.notify_one();
        }
    });

    Json(BulkImportRequest { entries: map })
}

/// Runs one shard's HTTP server until `/shutdown` is hit. Used both by the
/// in-process cluster binary and by standalone shard tests.
pub async fn serve(addr: SocketAddr, state: Arc<ShardState>) -> std::io::Result<()> {
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { state.wait_for_shutdown().await })
        .await
}
