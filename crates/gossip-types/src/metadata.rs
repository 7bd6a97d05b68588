//! Order metadata tracked alongside each stored order.
//!
//! Metadata is the mutable half of an order's lifecycle. It shares the
//! order's lifetime: exactly one row exists per persisted order, keyed by
//! the order hash.

use crate::order::AuctionType;
use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

/// Mutable per-order state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
	/// Whether the last validation pass found no errors.
	pub is_valid: bool,
	/// Locally submitted orders are pinned: exempt from the per-offerer
	/// limit and protected from policy-based deletion.
	pub is_pinned: bool,
	pub is_fully_fulfilled: bool,
	/// Block height of the last validation. Acts as a logical clock:
	/// updates with a smaller height are ignored at write time.
	pub last_validated_block_number: u64,
	pub last_validated_block_hash: B256,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_fulfilled_at: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_fulfilled_price: Option<U256>,
	pub auction_type: AuctionType,
	/// Unix seconds at first admission.
	pub created_at: u64,
}

impl OrderMetadata {
	pub fn new(auction_type: AuctionType, is_pinned: bool, created_at: u64) -> Self {
		Self {
			is_valid: false,
			is_pinned,
			is_fully_fulfilled: false,
			last_validated_block_number: 0,
			last_validated_block_hash: B256::ZERO,
			last_fulfilled_at: None,
			last_fulfilled_price: None,
			auction_type,
			created_at,
		}
	}

	/// Applies a patch, enforcing block-number monotonicity: a patch whose
	/// validation height is below the stored one is dropped entirely.
	///
	/// Returns whether the patch was applied.
	pub fn apply(&mut self, patch: &MetadataPatch) -> bool {
		if let Some(block_number) = patch.last_validated_block_number {
			if block_number < self.last_validated_block_number {
				return false;
			}
			self.last_validated_block_number = block_number;
		}
		if let Some(is_valid) = patch.is_valid {
			self.is_valid = is_valid;
		}
		if let Some(is_pinned) = patch.is_pinned {
			self.is_pinned = is_pinned;
		}
		if let Some(fulfilled) = patch.is_fully_fulfilled {
			self.is_fully_fulfilled = fulfilled;
		}
		if let Some(block_hash) = patch.last_validated_block_hash {
			self.last_validated_block_hash = block_hash;
		}
		if let Some(at) = patch.last_fulfilled_at {
			self.last_fulfilled_at = Some(at);
		}
		if let Some(price) = patch.last_fulfilled_price {
			self.last_fulfilled_price = Some(price);
		}
		true
	}
}

/// Partial metadata update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
	pub is_valid: Option<bool>,
	pub is_pinned: Option<bool>,
	pub is_fully_fulfilled: Option<bool>,
	pub last_validated_block_number: Option<u64>,
	pub last_validated_block_hash: Option<B256>,
	pub last_fulfilled_at: Option<u64>,
	pub last_fulfilled_price: Option<U256>,
}

impl MetadataPatch {
	/// Patch recording a validation result at a given block.
	pub fn validated(is_valid: bool, block_number: u64, block_hash: B256) -> Self {
		Self {
			is_valid: Some(is_valid),
			last_validated_block_number: Some(block_number),
			last_validated_block_hash: Some(block_hash),
			..Self::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stale_patch_is_dropped() {
		let mut metadata = OrderMetadata::new(AuctionType::Basic, false, 0);
		assert!(metadata.apply(&MetadataPatch::validated(true, 50, B256::repeat_byte(1))));
		assert!(metadata.is_valid);

		// A patch anchored at an older block must not overwrite.
		let stale = MetadataPatch::validated(false, 49, B256::repeat_byte(2));
		assert!(!metadata.apply(&stale));
		assert!(metadata.is_valid);
		assert_eq!(metadata.last_validated_block_number, 50);
	}

	#[test]
	fn equal_height_patch_applies() {
		let mut metadata = OrderMetadata::new(AuctionType::Basic, false, 0);
		metadata.apply(&MetadataPatch::validated(true, 50, B256::repeat_byte(1)));
		assert!(metadata.apply(&MetadataPatch::validated(false, 50, B256::repeat_byte(1))));
		assert!(!metadata.is_valid);
	}
}
