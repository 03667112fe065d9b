//! End-to-end scenarios from spec.md §8 (S1-S5), driving a real in-process
//! cluster over HTTP.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use ringkv_common::config::ClusterConfig;
use ringkv_router::RouterState;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn spin_up_cluster(
    shard_count: u16,
) -> (std::net::SocketAddr, Arc<RouterState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut shards = HashMap::new();
    for _ in 0..shard_count {
        let port = free_port();
        shards.insert(port.to_string(), format!("127.0.0.1:{port}"));
    }

    let router_port = free_port();
    let config = ClusterConfig {
        router_addr: format!("127.0.0.1:{router_port}"),
        shards,
        replica_factor: 100,
        snapshot_interval_secs: 3600,
        request_timeout_secs: 5,
        data_dir: dir.path().to_path_buf(),
    };

    let state = RouterState::bootstrap(&config).await.unwrap();
    let router_addr: std::net::SocketAddr = config.router_addr.parse().unwrap();
    tokio::spawn(ringkv_router::serve(router_addr, state.clone()));

    // Give the router's listener a moment to come up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (router_addr, state, dir)
}

async fn del(client: &reqwest::Client, base: &str, key: &str) -> reqwest::Response {
    client
        .request(reqwest::Method::from_bytes(b"DEL").unwrap(), format!("{base}/del"))
        .query(&[("key", key)])
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn s1_put_get_delete_round_trip() {
    let (addr, _state, _dir) = spin_up_cluster(5).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let resp = client.put(format!("{base}/put")).query(&[("key", "foo"), ("value", "bar")]).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Value stored successfully");

    let resp = client.get(format!("{base}/get")).query(&[("key", "foo")]).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["value"], "bar");

    let resp = del(&client, &base, "foo").await;
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base}/get")).query(&[("key", "foo")]).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Key not found");
}

#[tokio::test]
async fn s2_get_missing_key_is_404() {
    let (addr, _state, _dir) = spin_up_cluster(5).await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/get"))
        .query(&[("key", "missing")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Key not found");
}

#[tokio::test]
async fn s3_empty_ring_rejects_writes() {
    let (addr, _state, _dir) = spin_up_cluster(1).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    // Remove the sole shard to leave the ring empty.
    let members_resp = client.post(format!("{base}/add_server")).send().await.unwrap();
    assert_eq!(members_resp.status(), 200);

    // Find and remove every shard via repeated add/remove is awkward from a
    // black-box test; instead drive membership directly through state.
    // (covered structurally by s5's removal path — here we only assert the
    // no-shards status code contract using a cluster built with zero shards.)
    let dir = tempfile::tempdir().unwrap();
    let router_port = free_port();
    let config = ClusterConfig {
        router_addr: format!("127.0.0.1:{router_port}"),
        shards: HashMap::new(),
        replica_factor: 100,
        snapshot_interval_secs: 3600,
        request_timeout_secs: 5,
        data_dir: dir.path().to_path_buf(),
    };
    let state = RouterState::bootstrap(&config).await.unwrap();
    let router_addr: std::net::SocketAddr = config.router_addr.parse().unwrap();
    tokio::spawn(ringkv_router::serve(router_addr, state));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let resp = client
        .put(format!("http://{router_addr}/put"))
        .query(&[("key", "x"), ("value", "y")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn s4_add_server_grows_membership() {
    let (addr, _state, _dir) = spin_up_cluster(5).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/add_server")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "new server added to port");

    // The new shard must be immediately usable for a write.
    let resp = client
        .put(format!("{base}/put"))
        .query(&[("key", "after-add"), ("value", "v")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn s5_remove_server_migrates_keys() {
    let (addr, state, _dir) = spin_up_cluster(3).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    client.put(format!("{base}/put")).query(&[("key", "a"), ("value", "1")]).send().await.unwrap();
    client.put(format!("{base}/put")).query(&[("key", "b"), ("value", "2")]).send().await.unwrap();

    // Find the shard actually owning "a" through the router's own ring, the
    // same way the membership controller would, and remove it for real.
    let target = state.ring.locate("a").unwrap();
    let remove_resp = client
        .post(format!("{base}/remove_server"))
        .query(&[("port", target.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(remove_resp.status(), 200);

    // The removed shard is gone from routing...
    assert!(!state.ring.contains(&target));
    assert!(state.registry.get(target.as_str()).is_none());

    // ...and both pre-existing keys are still readable from wherever they
    // now live, proving the migration (not just the removal) happened.
    let resp_a = client.get(format!("{base}/get")).query(&[("key", "a")]).send().await.unwrap();
    assert_eq!(resp_a.status(), 200);
    let body_a: serde_json::Value = resp_a.json().await.unwrap();
    assert_eq!(body_a["value"], "1");

    let resp_b = client.get(format!("{base}/get")).query(&[("key", "b")]).send().await.unwrap();
    assert_eq!(resp_b.status(), 200);
    let body_b: serde_json::Value = resp_b.json().await.unwrap();
    assert_eq!(body_b["value"], "2");

    // A second removal of the same (now-gone) id is rejected, not silently
    // accepted.
    let repeat_resp = client
        .post(format!("{base}/remove_server"))
        .query(&[("port", target.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(repeat_resp.status(), 400);
}
