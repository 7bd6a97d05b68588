//! Criteria sets: Merkle roots over sorted token identifier sets.
//!
//! A criteria-based item commits to "any of these token ids" with a single
//! 32-byte root. The tree hashes the sorted, deduplicated identifiers as
//! leaves and sorts each sibling pair before hashing, matching the
//! settlement contract's proof verification.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A stored criteria set, keyed by its Merkle root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
	pub hash: B256,
	pub token: Address,
	pub token_ids: Vec<U256>,
}

impl Criteria {
	/// Builds a criteria set from token ids, sorting and deduplicating
	/// before deriving the root.
	pub fn new(token: Address, mut token_ids: Vec<U256>) -> Self {
		token_ids.sort_unstable();
		token_ids.dedup();
		let hash = criteria_root(&token_ids);
		Self {
			hash,
			token,
			token_ids,
		}
	}

	pub fn contains(&self, token_id: U256) -> bool {
		self.token_ids.binary_search(&token_id).is_ok()
	}
}

/// Merkle root over ascending-sorted token ids.
///
/// Leaves are `keccak256(id)` over the 32-byte big-endian identifier.
/// Odd nodes are promoted unhashed; sibling pairs are hashed in sorted
/// order. An empty set yields the zero hash.
pub fn criteria_root(sorted_token_ids: &[U256]) -> B256 {
	if sorted_token_ids.is_empty() {
		return B256::ZERO;
	}
	let mut layer: Vec<B256> = sorted_token_ids
		.iter()
		.map(|id| keccak256(id.to_be_bytes::<32>()))
		.collect();
	while layer.len() > 1 {
		let mut next = Vec::with_capacity(layer.len().div_ceil(2));
		for pair in layer.chunks(2) {
			match pair {
				[left, right] => next.push(hash_pair(*left, *right)),
				[single] => next.push(*single),
				_ => unreachable!(),
			}
		}
		layer = next;
	}
	layer[0]
}

fn hash_pair(a: B256, b: B256) -> B256 {
	let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
	let mut buf = [0u8; 64];
	buf[..32].copy_from_slice(lo.as_slice());
	buf[32..].copy_from_slice(hi.as_slice());
	keccak256(buf)
}
