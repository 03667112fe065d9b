//! # Snapshot Persistence
//!
//! Whole-file JSON dump of a shard's map, used only for crash recovery.
//! Never consulted during migration — migration moves data shard-to-shard
//! in memory (spec.md §4.2, §9).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::store::ShardStore;

/// Path to the snapshot blob for `shard_id` under `data_dir`.
pub fn snapshot_path(data_dir: &Path, shard_id: &str) -> PathBuf {
    data_dir.join(format!("{shard_id}.json"))
}

/// Loads a snapshot blob if present. Returns an empty map on any failure
/// (missing file or malformed JSON) rather than failing startup, per
/// spec.md §4.2: "on deserialization failure, start empty and log".
pub async fn load(path: &Path) -> HashMap<String, String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(map) => {
                info!(path = %path.display(), "loaded shard snapshot");
                map
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "snapshot corrupt, starting empty");
                HashMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read snapshot, starting empty");
            HashMap::new()
        }
    }
}

/// Flushes `map` to `path` with a whole-file replace: write to a sibling
/// `.tmp` file, then rename over the target so a reader never observes a
/// half-written blob.
pub async fn save(path: &Path, map: &HashMap<String, String>) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(map).expect("map of strings always serializes");
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Spawns the periodic flush loop. Runs until the shard task is dropped;
/// spec.md §5 notes this loop "cannot be cancelled externally" — it
/// terminates only with its shard.
pub fn spawn_flush_loop(
    store: std::sync::Arc<dyn ShardStore>,
    path: PathBuf,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let map = store.snapshot();
            if let Err(err) = save(&path, &map).await {
                error!(path = %path.display(), %err, "snapshot flush failed");
            }
        }
    })
}
