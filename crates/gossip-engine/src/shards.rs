//! Per-hash admission serialization.
//!
//! Admissions for the same order hash must not interleave: the second
//! must observe the first's upsert. A fixed pool of async mutexes keyed
//! by the hash's low byte gives at-most-one admission in flight per hash
//! without a lock per order.

use alloy_primitives::B256;
use tokio::sync::{Mutex, MutexGuard};

const SHARD_COUNT: usize = 64;

/// Hash-sharded lock pool.
pub struct ShardLocks {
	locks: Vec<Mutex<()>>,
}

impl ShardLocks {
	pub fn new() -> Self {
		Self {
			locks: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
		}
	}

	/// Acquires the shard guarding this hash.
	pub async fn lock(&self, hash: &B256) -> MutexGuard<'_, ()> {
		let shard = hash.as_slice()[31] as usize % self.locks.len();
		self.locks[shard].lock().await
	}
}

impl Default for ShardLocks {
	fn default() -> Self {
		Self::new()
	}
}
