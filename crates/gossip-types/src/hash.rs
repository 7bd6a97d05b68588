//! Canonical Seaport order-hash derivation.
//!
//! The order hash is the EIP-712 struct hash of the order components and is
//! the order's identity on the network. The derivation must match the
//! settlement contract bit-exactly: every scalar is ABI-encoded as a 32-byte
//! big-endian word, and each item list is hashed as
//! `keccak256(concat(keccak256(item_words)))`.

use crate::order::{ConsiderationItem, OfferItem, Order};
use alloy_primitives::{keccak256, Address, B256, U256};
use once_cell::sync::Lazy;

/// ABI type string of an offer item.
pub const OFFER_ITEM_TYPE: &str = "OfferItem(uint8 itemType,address token,uint256 identifierOrCriteria,uint256 startAmount,uint256 endAmount)";

/// ABI type string of a consideration item.
pub const CONSIDERATION_ITEM_TYPE: &str = "ConsiderationItem(uint8 itemType,address token,uint256 identifierOrCriteria,uint256 startAmount,uint256 endAmount,address recipient)";

/// ABI type string of the order components, without referenced types.
pub const ORDER_COMPONENTS_TYPE: &str = "OrderComponents(address offerer,address zone,OfferItem[] offer,ConsiderationItem[] consideration,uint8 orderType,uint256 startTime,uint256 endTime,bytes32 zoneHash,uint256 salt,bytes32 conduitKey,uint256 counter)";

static OFFER_ITEM_TYPE_HASH: Lazy<B256> = Lazy::new(|| keccak256(OFFER_ITEM_TYPE.as_bytes()));

static CONSIDERATION_ITEM_TYPE_HASH: Lazy<B256> =
	Lazy::new(|| keccak256(CONSIDERATION_ITEM_TYPE.as_bytes()));

// Referenced types are appended alphabetically: ConsiderationItem before
// OfferItem.
static ORDER_TYPE_HASH: Lazy<B256> = Lazy::new(|| {
	let mut type_string = String::from(ORDER_COMPONENTS_TYPE);
	type_string.push_str(CONSIDERATION_ITEM_TYPE);
	type_string.push_str(OFFER_ITEM_TYPE);
	keccak256(type_string.as_bytes())
});

/// Minimal ABI encoder for the static words of an EIP-712 struct hash.
struct StructEncoder {
	buf: Vec<u8>,
}

impl StructEncoder {
	fn with_capacity(words: usize) -> Self {
		Self {
			buf: Vec::with_capacity(words * 32),
		}
	}

	fn push_b256(&mut self, value: &B256) {
		self.buf.extend_from_slice(value.as_slice());
	}

	fn push_address(&mut self, address: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(address.as_slice());
		self.buf.extend_from_slice(&word);
	}

	fn push_u256(&mut self, value: U256) {
		self.buf.extend_from_slice(&value.to_be_bytes::<32>());
	}

	fn push_u64(&mut self, value: u64) {
		self.push_u256(U256::from(value));
	}

	fn push_u8(&mut self, value: u8) {
		self.push_u256(U256::from(value));
	}

	fn hash(self) -> B256 {
		keccak256(self.buf)
	}
}

fn offer_item_hash(item: &OfferItem) -> B256 {
	let mut enc = StructEncoder::with_capacity(6);
	enc.push_b256(&OFFER_ITEM_TYPE_HASH);
	enc.push_u8(item.item_type as u8);
	enc.push_address(&item.token);
	enc.push_u256(item.identifier_or_criteria);
	enc.push_u256(item.start_amount);
	enc.push_u256(item.end_amount);
	enc.hash()
}

fn consideration_item_hash(item: &ConsiderationItem) -> B256 {
	let mut enc = StructEncoder::with_capacity(7);
	enc.push_b256(&CONSIDERATION_ITEM_TYPE_HASH);
	enc.push_u8(item.item_type as u8);
	enc.push_address(&item.token);
	enc.push_u256(item.identifier_or_criteria);
	enc.push_u256(item.start_amount);
	enc.push_u256(item.end_amount);
	enc.push_address(&item.recipient);
	enc.hash()
}

fn hash_concat(hashes: impl Iterator<Item = B256>) -> B256 {
	let mut buf = Vec::new();
	for hash in hashes {
		buf.extend_from_slice(hash.as_slice());
	}
	keccak256(buf)
}

/// Derives the canonical order hash.
pub fn order_hash(order: &Order) -> B256 {
	let offer_root = hash_concat(order.offer.iter().map(offer_item_hash));
	let consideration_root = hash_concat(order.consideration.iter().map(consideration_item_hash));

	let mut enc = StructEncoder::with_capacity(12);
	enc.push_b256(&ORDER_TYPE_HASH);
	enc.push_address(&order.offerer);
	enc.push_address(&order.zone);
	enc.push_b256(&offer_root);
	enc.push_b256(&consideration_root);
	enc.push_u8(order.order_type as u8);
	enc.push_u64(order.start_time);
	enc.push_u64(order.end_time);
	enc.push_b256(&order.zone_hash);
	enc.push_u256(order.salt);
	enc.push_b256(&order.conduit_key);
	enc.push_u256(order.counter);
	enc.hash()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::order::{ItemType, OrderType};
	use alloy_primitives::Bytes;

	fn sample_order() -> Order {
		Order {
			offer: vec![OfferItem {
				item_type: ItemType::Erc721,
				token: Address::repeat_byte(0x11),
				identifier_or_criteria: U256::from(1),
				start_amount: U256::from(1),
				end_amount: U256::from(1),
			}],
			consideration: vec![ConsiderationItem {
				item_type: ItemType::Native,
				token: Address::ZERO,
				identifier_or_criteria: U256::ZERO,
				start_amount: U256::from(1_000_000u64),
				end_amount: U256::from(1_000_000u64),
				recipient: Address::repeat_byte(0x22),
			}],
			offerer: Address::repeat_byte(0x22),
			signature: Bytes::from(vec![0u8; 65]),
			order_type: OrderType::FullOpen,
			start_time: 1,
			end_time: 2,
			counter: U256::ZERO,
			salt: U256::from(99),
			conduit_key: B256::ZERO,
			zone: Address::ZERO,
			zone_hash: B256::ZERO,
			chain_id: 1,
			numerator: None,
			denominator: None,
			extra_data: None,
			additional_recipients: None,
		}
	}

	#[test]
	fn hash_is_deterministic() {
		let order = sample_order();
		assert_eq!(order_hash(&order), order_hash(&order.clone()));
	}

	#[test]
	fn hash_ignores_signature() {
		// The signature is not part of the order components.
		let order = sample_order();
		let mut resigned = order.clone();
		resigned.signature = Bytes::from(vec![0xffu8; 65]);
		assert_eq!(order_hash(&order), order_hash(&resigned));
	}

	#[test]
	fn hash_is_sensitive_to_components() {
		let order = sample_order();
		let base = order_hash(&order);

		let mut salted = order.clone();
		salted.salt = U256::from(100);
		assert_ne!(order_hash(&salted), base);

		let mut countered = order.clone();
		countered.counter = U256::from(1);
		assert_ne!(order_hash(&countered), base);

		let mut reordered = order.clone();
		reordered.offer.push(reordered.offer[0].clone());
		assert_ne!(order_hash(&reordered), base);
	}

	#[test]
	fn type_hashes_use_verbatim_strings() {
		// Guard the constants against accidental edits: the item type hash
		// feeds every order hash on the network.
		assert_eq!(
			*OFFER_ITEM_TYPE_HASH,
			keccak256(OFFER_ITEM_TYPE.as_bytes())
		);
		assert!(ORDER_COMPONENTS_TYPE.ends_with("uint256 counter)"));
	}
}
