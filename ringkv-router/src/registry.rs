//! Membership registry: shard id -> reachable endpoint.
//!
//! Mutated only by the membership controller (spec.md §3). Kept behind the
//! same read-mostly lock discipline as the ring so a router request never
//! observes a ring entry whose registry entry hasn't landed yet — see
//! [`crate::membership::add_shard`] for the ordering that guarantees this.

use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::RwLock;

#[derive(Default)]
pub struct Registry {
    endpoints: RwLock<HashMap<String, SocketAddr>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { endpoints: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, shard_id: String, addr: SocketAddr) {
        self.endpoints.write().insert(shard_id, addr);
    }

    pub fn remove(&self, shard_id: &str) -> Option<SocketAddr> {
        self.endpoints.write().remove(shard_id)
    }

    pub fn get(&self, shard_id: &str) -> Option<SocketAddr> {
        self.endpoints.read().get(shard_id).copied()
    }

    pub fn contains(&self, shard_id: &str) -> bool {
        self.endpoints.read().contains_key(shard_id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }
}
