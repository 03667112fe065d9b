//! # In-Memory Shard Store
//!
//! A single shard's key-value map: put/get/delete plus the bulk-import used
//! during migration. No TTL, no schema, no eviction — spec.md §3 rules all
//! three out explicitly.
//!
//! ## Design Principles
//!
//! 1. **Strategy Pattern**: callers depend on [`ShardStore`], not the
//!    concrete map, mirroring the teacher engine's `KVEngine` trait.
//! 2. **One Lock, Whole Map**: bulk-import must be all-or-nothing visible to
//!    concurrent readers (spec.md §4.2, §5). A single `RwLock` over the
//!    whole map gives that for free; striping the lock (as the teacher's
//!    `MemoryEngine` does for TTL/LRU contention) would require locking
//!    every stripe for an atomic bulk-import anyway, so the extra
//!    complexity buys nothing here — see DESIGN.md.

use std::collections::HashMap;

use parking_lot::RwLock;
use ringkv_common::RingKvError;

/// Storage backend for one shard's key space.
pub trait ShardStore: Send + Sync {
    /// Unconditional upsert; replaces any prior value.
    fn put(&self, key: String, value: String);
    /// Returns the stored value, or `NotFound` if absent.
    fn get(&self, key: &str) -> Result<String, RingKvError>;
    /// Removes a key; `NotFound` if it was already absent.
    fn delete(&self, key: &str) -> Result<(), RingKvError>;
    /// Merges `entries` into the map, overwriting on collision. Visible to
    /// readers all-at-once, never partially.
    fn bulk_import(&self, entries: HashMap<String, String>);
    /// Returns a full copy of the map, e.g. for snapshotting or migration.
    fn snapshot(&self) -> HashMap<String, String>;
    /// Number of live keys (diagnostics/tests).
    fn len(&self) -> usize;
}

/// The only [`ShardStore`] implementation: one map behind one lock.
#[derive(Debug, Default)]
pub struct MapStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MapStore {
    pub fn new() -> Self {
        MapStore { inner: RwLock::new(HashMap::new()) }
    }

    /// Seeds the store from a previously-loaded snapshot map.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        MapStore { inner: RwLock::new(map) }
    }
}

impl ShardStore for MapStore {
    fn put(&self, key: String, value: String) {
        self.inner.write().insert(key, value);
    }

    fn get(&self, key: &str) -> Result<String, RingKvError> {
        self.inner.read().get(key).cloned().ok_or(RingKvError::NotFound)
    }

    fn delete(&self, key: &str) -> Result<(), RingKvError> {
        match self.inner.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(RingKvError::NotFound),
        }
    }

    fn bulk_import(&self, entries: HashMap<String, String>) {
        let mut map = self.inner.write();
        for (key, value) in entries {
            map.insert(key, value);
        }
    }

    fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().clone()
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }
}
