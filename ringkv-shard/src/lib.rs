//! The shard: an in-memory key-value map exposed over HTTP, with periodic
//! snapshotting. One `Shard` per cluster member (spec.md §2).

pub mod http;
pub mod snapshot;
pub mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ringkv_common::config::DEFAULT_SNAPSHOT_INTERVAL_SECS;

pub use http::ShardState;
pub use store::{MapStore, ShardStore};

/// Everything needed to bring one shard online.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    pub shard_id: String,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub snapshot_interval_secs: u64,
}

impl ShardConfig {
    pub fn new(shard_id: impl Into<String>, bind_addr: SocketAddr, data_dir: PathBuf) -> Self {
        ShardConfig {
            shard_id: shard_id.into(),
            bind_addr,
            data_dir,
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
        }
    }
}

/// A running shard: its HTTP server task and its background flush task.
pub struct ShardHandle {
    pub shard_id: String,
    pub serve_task: tokio::task::JoinHandle<std::io::Result<()>>,
    pub flush_task: tokio::task::JoinHandle<()>,
}

/// Loads any existing snapshot, starts the flush loop, and serves the
/// shard's HTTP surface until `/shutdown` is hit. Returns immediately with
/// handles to the spawned tasks; the caller decides whether to await them.
pub async fn spawn_shard(config: ShardConfig) -> ShardHandle {
    let path = snapshot::snapshot_path(&config.data_dir, &config.shard_id);
    let initial = snapshot::load(&path).await;
    let store: Arc<dyn ShardStore> = Arc::new(MapStore::from_map(initial));

    let flush_task = snapshot::spawn_flush_loop(store.clone(), path.clone(), config.snapshot_interval_secs);

    let state = Arc::new(ShardState::new(config.shard_id.clone(), store, path));
    let addr = config.bind_addr;
    let serve_task = tokio::spawn(async move { http::serve(addr, state).await });

    ShardHandle { shard_id: config.shard_id, serve_task, flush_task }
}
