//! # Membership Controller
//!
//! Add-shard and remove-shard, including the migration that keeps a
//! departing shard's data reachable (spec.md §4.4).
//!
//! Ordering is load-bearing for remove-shard: the ring entry is dropped
//! *before* migration starts, so no new write can land on the departing
//! shard once migration begins (spec.md §4.4). Writes already in flight at
//! that instant are handled by the **repeat-migration** strategy spec.md
//! §9 sanctions as option (b): one bulk-import pass before `shutdown`, and
//! a second, final pass built from the live map the shutdown handler itself
//! reports in its response body — no second `/dump` race against the
//! listener tearing down, since the final state rides the shutdown ack.
//! See DESIGN.md for why (b) was chosen over draining.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use ringkv_common::wire::BulkImportRequest;
use ringkv_common::RouteError;
use ringkv_ring::ShardId;
use tracing::{info, warn};

use crate::registry::Registry;
use crate::RouterState;

/// Picks the next unused shard id. Mirrors
/// `original_source/myKVServer.py`'s `500{tracker}` port allocation, and
/// guards against colliding with a manually-configured shard id by skipping
/// any port already present in the registry.
fn allocate_shard_id(next_port: &AtomicU16, registry: &Registry) -> String {
    loop {
        let port = next_port.fetch_add(1, Ordering::SeqCst);
        let id = port.to_string();
        if !registry.contains(&id) {
            return id;
        }
    }
}

/// Adds a freshly-spawned shard to the cluster.
///
/// No rebalancing migration runs on add (spec.md §4.4): some keys that now
/// hash to the new shard will read as absent until rewritten. This is
/// accepted behavior, not a bug.
pub async fn add_shard(state: &RouterState) -> Result<String, RouteError> {
    let shard_id = allocate_shard_id(&state.next_port, &state.registry);
    let port: u16 = shard_id.parse().expect("allocate_shard_id yields a valid port");
    let bind_addr: SocketAddr = format!("127.0.0.1:{port}").parse().expect("valid loopback address");

    let config = ringkv_shard::ShardConfig {
        shard_id: shard_id.clone(),
        bind_addr,
        data_dir: state.data_dir.clone(),
        snapshot_interval_secs: state.snapshot_interval_secs,
    };
    let handle = ringkv_shard::spawn_shard(config).await;

    wait_until_reachable(&state.client, bind_addr, state.request_timeout).await?;

    // Ring and registry flip together, after the shard is confirmed
    // reachable (spec.md §4.4, step 3): readers never see a ring entry
    // whose endpoint isn't registered yet.
    state.ring.add(&ShardId::new(shard_id.clone()));
    state.registry.insert(shard_id.clone(), bind_addr);
    state.shards.lock().insert(shard_id.clone(), handle);

    info!(shard = %shard_id, %bind_addr, "shard added");
    Ok(shard_id)
}

/// Removes `target_id` from the cluster, migrating its keys to whichever
/// shards now own them.
///
/// spec.md §4.4 warns that a single successor is only a safe destination if
/// every departing key happens to land on the same shard post-removal, and
/// requires implementations to either validate that assumption or migrate
/// per-key. With virtual nodes spread across the ring, a departing shard's
/// keys almost always fan out to several distinct successors, so this
/// migrates per-key: each entry is re-located against the ring with
/// `target_id` already removed, grouped by its actual new owner, and
/// imported in one batch per owner.
pub async fn remove_shard(state: &RouterState, target_id: &str) -> Result<(), RouteError> {
    let target_addr = state
        .registry
        .get(target_id)
        .ok_or_else(|| RouteError::ShardNotFound(target_id.to_string()))?;

    // Step 2: drop the ring entry first so no new client request can route
    // to target_id while migration is in flight.
    state.ring.remove(&ShardId::new(target_id.to_string()));

    let first_pass = dump_shard(&state.client, target_id, target_addr, state.request_timeout).await?;
    let first_count = first_pass.entries.len();
    migrate_by_owner(state, first_pass).await?;

    // Repeat the migration after shutdown (spec.md §9 option (b)): the
    // shutdown handler reports the shard's live map at the instant it
    // actually stops, in the same response that acks the shutdown request,
    // so any write accepted by target_id between the first dump and
    // shutdown is still migrated — with no further dump racing the
    // listener's teardown.
    let final_pass = shutdown_shard(&state.client, target_id, target_addr, state.request_timeout).await?;
    let second_count = final_pass.entries.len();
    if second_count > 0 {
        migrate_by_owner(state, final_pass).await?;
    }

    if let Some(handle) = state.shards.lock().remove(target_id) {
        handle.flush_task.abort();
    }
    state.registry.remove(target_id);

    info!(shard = %target_id, migrated = first_count + second_count, "shard removed");
    Ok(())
}

/// Groups a dump's entries by the shard each key now hashes to, then issues
/// one `/bulk_import` per distinct owner.
async fn migrate_by_owner(state: &RouterState, dump: BulkImportRequest) -> Result<(), RouteError> {
    let mut by_owner: HashMap<String, HashMap<String, String>> = HashMap::new();
    for (key, value) in dump.entries {
        let owner = state.ring.locate(&key).ok_or(RouteError::NoShards)?;
        by_owner.entry(owner.0).or_default().insert(key, value);
    }

    for (owner_id, entries) in by_owner {
        let owner_addr = state
            .registry
            .get(&owner_id)
            .ok_or_else(|| RouteError::UnknownShard(owner_id.clone()))?;
        import_into(&state.client, &owner_id, owner_addr, BulkImportRequest { entries }, state.request_timeout)
            .await?;
    }
    Ok(())
}

async fn dump_shard(
    client: &reqwest::Client,
    shard_id: &str,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<BulkImportRequest, RouteError> {
    let url = format!("http://{addr}/dump");
    let response = client.get(&url).timeout(timeout).send().await.map_err(|err| {
        RouteError::MigrationFailed(shard_id.to_string(), format!("dump failed: {err}"))
    })?;
    response
        .json::<BulkImportRequest>()
        .await
        .map_err(|err| RouteError::MigrationFailed(shard_id.to_string(), format!("dump decode failed: {err}")))
}

async fn import_into(
    client: &reqwest::Client,
    shard_id: &str,
    addr: SocketAddr,
    body: BulkImportRequest,
    timeout: Duration,
) -> Result<(), RouteError> {
    let url = format!("http://{addr}/bulk_import");
    let response = client
        .post(&url)
        .json(&body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| RouteError::MigrationFailed(shard_id.to_string(), err.to_string()))?;
    if !response.status().is_success() {
        return Err(RouteError::MigrationFailed(
            shard_id.to_string(),
            format!("recipient returned {}", response.status()),
        ));
    }
    Ok(())
}

/// Tells the shard to shut down and returns the final live map it reports
/// in its shutdown-ack body.
async fn shutdown_shard(
    client: &reqwest::Client,
    shard_id: &str,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<BulkImportRequest, RouteError> {
    let url = format!("http://{addr}/shutdown");
    let response = client
        .post(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| RouteError::ShardUnreachable(shard_id.to_string(), err.to_string()))?;
    response
        .json::<BulkImportRequest>()
        .await
        .map_err(|err| RouteError::MigrationFailed(shard_id.to_string(), format!("shutdown decode failed: {err}")))
}

async fn wait_until_reachable(
    client: &reqwest::Client,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<(), RouteError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let url = format!("http://{addr}/dump");
    loop {
        if client.get(&url).send().await.is_ok() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(%addr, "new shard did not become reachable in time");
            return Err(RouteError::ShardUnreachable(addr.to_string(), "startup timed out".to_string()));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use ringkv_common::ClusterConfig;

    use super::*;

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    async fn bootstrap_with(shard_count: u16) -> (std::sync::Arc<RouterState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut shards = HashMap::new();
        for _ in 0..shard_count {
            let port = free_port();
            shards.insert(port.to_string(), format!("127.0.0.1:{port}"));
        }
        let config = ClusterConfig {
            router_addr: format!("127.0.0.1:{}", free_port()),
            shards,
            replica_factor: 100,
            snapshot_interval_secs: 3600,
            request_timeout_secs: 5,
            data_dir: dir.path().to_path_buf(),
        };
        let state = RouterState::bootstrap(&config).await.unwrap();
        (state, dir)
    }

    async fn put_direct(state: &RouterState, key: &str, value: &str) {
        let owner = state.ring.locate(key).unwrap();
        let addr = state.registry.get(owner.as_str()).unwrap();
        state
            .client
            .put(format!("http://{addr}/put"))
            .query(&[("key", key), ("value", value)])
            .send()
            .await
            .unwrap();
    }

    async fn get_direct(state: &RouterState, shard_id: &str, key: &str) -> reqwest::StatusCode {
        let addr = state.registry.get(shard_id).unwrap();
        state.client.get(format!("http://{addr}/get")).query(&[("key", key)]).send().await.unwrap().status()
    }

    #[tokio::test]
    async fn add_shard_is_immediately_routable() {
        // A non-empty initial set keeps `next_port` seeded from a real free
        // ephemeral port rather than starting at 1.
        let (state, _dir) = bootstrap_with(1).await;
        let shard_id = add_shard(&state).await.unwrap();

        assert!(state.ring.contains(&ShardId::new(shard_id.clone())));
        assert!(state.registry.get(&shard_id).is_some());
    }

    #[tokio::test]
    async fn remove_shard_migrates_its_keys_to_their_new_owners() {
        let (state, _dir) = bootstrap_with(3).await;
        let keys: Vec<String> = (0..200).map(|i| format!("key-{i}")).collect();
        for key in &keys {
            put_direct(&state, key, "v").await;
        }

        let target = state.ring.members().into_iter().next().unwrap();
        let target_keys: Vec<&String> =
            keys.iter().filter(|k| state.ring.locate(k).unwrap() == target).collect();
        assert!(!target_keys.is_empty(), "test setup needs at least one key on the departing shard");

        remove_shard(&state, target.as_str()).await.unwrap();

        assert!(!state.ring.contains(&target));
        assert!(state.registry.get(target.as_str()).is_none());

        for key in target_keys {
            let new_owner = state.ring.locate(key).unwrap();
            let status = get_direct(&state, new_owner.as_str(), key).await;
            assert_eq!(status, reqwest::StatusCode::OK, "key {key} missing from its new owner after migration");
        }
    }

    #[tokio::test]
    async fn remove_shard_rejects_an_unknown_id() {
        let (state, _dir) = bootstrap_with(1).await;
        let err = remove_shard(&state, "not-a-real-shard").await.unwrap_err();
        assert!(matches!(err, RouteError::ShardNotFound(_)));
    }

    #[test]
    fn allocate_shard_id_skips_ports_already_in_the_registry() {
        let registry = Registry::new();
        registry.insert("5001".to_string(), "127.0.0.1:5001".parse().unwrap());
        let next_port = AtomicU16::new(5001);

        let id = allocate_shard_id(&next_port, &registry);
        assert_eq!(id, "5002");
    }
}
