//! Per-order mutual exclusion for status transitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

const DEFAULT_SHARDS: usize = 64;

/// A fixed set of async mutexes; an order id always maps to the same shard,
/// so two transitions on one order never interleave. Unrelated orders that
/// share a shard simply queue behind each other.
pub struct OrderLocks {
    shards: Vec<Mutex<()>>,
}

impl OrderLocks {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
        }
    }

    fn shard_for(&self, order_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        order_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub async fn lock(&self, order_id: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(order_id)].lock().await
    }
}

impl Default for OrderLocks {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
