//! Cluster configuration, fixed at process start.
//!
//! Mirrors `original_source/myKVServer.py`'s `__main__` driver (a fixed list
//! of ports, one distributor) but generalized to named shards and an
//! explicit replica factor / snapshot interval / timeout, loaded once from a
//! TOML file or environment variables. No hot reload.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default virtual-node (replica) count per shard.
pub const DEFAULT_REPLICA_FACTOR: usize = 100;
/// Default snapshot flush interval, in seconds.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 10;
/// Default router-to-shard forwarding timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

fn default_replica_factor() -> usize {
    DEFAULT_REPLICA_FACTOR
}

fn default_snapshot_interval() -> u64 {
    DEFAULT_SNAPSHOT_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Startup-time configuration for the whole cluster: the router, the
/// initial shard set, and their reachable endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Address the router binds to.
    pub router_addr: String,
    /// Initial shard id -> bind address. Order is insertion order from the
    /// config file; ring membership derives from this map's keys.
    pub shards: HashMap<String, String>,
    /// Virtual nodes per shard (V in the spec).
    #[serde(default = "default_replica_factor")]
    pub replica_factor: usize,
    /// Snapshot flush interval in seconds (T in the spec).
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    /// Router -> shard forwarding timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Directory holding each shard's snapshot blob.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl ClusterConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Returns a config for local development: `count` shards on consecutive
    /// ports starting at `base_port`, all bound to loopback.
    pub fn local(base_port: u16, count: u16) -> Self {
        let mut shards = HashMap::new();
        for i in 0..count {
            let port = base_port + i;
            shards.insert(port.to_string(), format!("127.0.0.1:{port}"));
        }

        ClusterConfig {
            router_addr: format!("127.0.0.1:{}", base_port - 1),
            shards,
            replica_factor: DEFAULT_REPLICA_FACTOR,
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: default_data_dir(),
        }
    }
}
