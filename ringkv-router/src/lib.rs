//! The router: a stateless front-end that maps each request to its owning
//! shard via the ring, forwards it, and relays the response (spec.md §4.3).
//! Also hosts the membership controller (spec.md §4.4), which is logically
//! part of the router.

pub mod forward;
pub mod http;
pub mod membership;
pub mod registry;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicU16;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ringkv_common::config::ClusterConfig;
use ringkv_ring::Ring;
use ringkv_shard::ShardHandle;

use crate::registry::Registry;

/// Shared router state: the ring, the registry, the HTTP client used to
/// reach shards, and the set of shards this process has spawned directly.
///
/// Router and registry changes are not transactional across the two
/// structures the way spec.md §9's "copy-on-write swap" describes for a
/// single combined table; instead each is independently lock-protected and
/// the membership controller updates them in the order spec.md mandates
/// (ring before registry on add, ring before migration on remove), which is
/// sufficient because the router only ever needs "is this id routable *and*
/// resolvable", never an atomic snapshot of both together.
pub struct RouterState {
    pub ring: Arc<Ring>,
    pub registry: Arc<Registry>,
    pub client: reqwest::Client,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub snapshot_interval_secs: u64,
    pub next_port: AtomicU16,
    pub shards: Mutex<HashMap<String, ShardHandle>>,
    pub shutdown: tokio::sync::Notify,
}

impl RouterState {
    /// Builds router state from a [`ClusterConfig`] and spawns every
    /// initially-configured shard in-process.
    pub async fn bootstrap(config: &ClusterConfig) -> anyhow::Result<Arc<RouterState>> {
        let ring = Arc::new(Ring::new(config.replica_factor));
        let registry = Arc::new(Registry::new());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let mut max_port = 0u16;
        let mut shards = HashMap::new();
        for (shard_id, addr) in &config.shards {
            let bind_addr: SocketAddr = addr.parse()?;
            let shard_config = ringkv_shard::ShardConfig {
                shard_id: shard_id.clone(),
                bind_addr,
                data_dir: config.data_dir.clone(),
                snapshot_interval_secs: config.snapshot_interval_secs,
            };
            let handle = ringkv_shard::spawn_shard(shard_config).await;
            max_port = max_port.max(bind_addr.port());

            ring.add(&ringkv_ring::ShardId::new(shard_id.clone()));
            registry.insert(shard_id.clone(), bind_addr);
            shards.insert(shard_id.clone(), handle);
        }

        Ok(Arc::new(RouterState {
            ring,
            registry,
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            data_dir: config.data_dir.clone(),
            snapshot_interval_secs: config.snapshot_interval_secs,
            next_port: AtomicU16::new(max_port + 1),
            shards: Mutex::new(shards),
            shutdown: tokio::sync::Notify::new(),
        }))
    }
}

/// Serves the router's HTTP surface on `addr` until `/shutdown` is hit.
pub async fn serve(addr: SocketAddr, state: Arc<RouterState>) -> std::io::Result<()> {
    let app = http::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { state.shutdown.notified().await })
        .await
}
