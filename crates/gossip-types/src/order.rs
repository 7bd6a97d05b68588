//! The Seaport order model.
//!
//! An order's identity is immutable: every field here participates in the
//! canonical order hash or the wire encoding. Mutable state lives in
//! [`crate::metadata::OrderMetadata`], keyed by the order hash.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of items on either side of an order.
pub const MAX_ITEMS_PER_SIDE: usize = 100;
/// Maximum number of additional recipients on an advanced order.
pub const MAX_ADDITIONAL_RECIPIENTS: usize = 50;

/// Errors describing a structurally malformed order.
///
/// These reject an order before hashing or persistence; they are input
/// rejections, not operational failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderDataError {
	#[error("order has an empty {0} side")]
	EmptySide(&'static str),
	#[error("order has more than {MAX_ITEMS_PER_SIDE} {0} items")]
	TooManyItems(&'static str),
	#[error("order has more than {MAX_ADDITIONAL_RECIPIENTS} additional recipients")]
	TooManyRecipients,
	#[error("signature must be 64 or 65 bytes, got {0}")]
	InvalidSignatureLength(usize),
	#[error("end time {end} is not after start time {start}")]
	InvalidTimes { start: u64, end: u64 },
}

/// Kind of asset an item transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
	Native,
	Erc20,
	Erc721,
	Erc1155,
	Erc721WithCriteria,
	Erc1155WithCriteria,
}

impl ItemType {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::Native),
			1 => Some(Self::Erc20),
			2 => Some(Self::Erc721),
			3 => Some(Self::Erc1155),
			4 => Some(Self::Erc721WithCriteria),
			5 => Some(Self::Erc1155WithCriteria),
			_ => None,
		}
	}

	/// Whether amounts of this item type are interchangeable units.
	pub fn is_fungible(self) -> bool {
		matches!(self, Self::Native | Self::Erc20)
	}

	/// Whether the item identifier is a criteria Merkle root.
	pub fn is_criteria(self) -> bool {
		matches!(self, Self::Erc721WithCriteria | Self::Erc1155WithCriteria)
	}
}

/// How an order may be fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
	FullOpen,
	PartialOpen,
	FullRestricted,
	PartialRestricted,
}

impl OrderType {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::FullOpen),
			1 => Some(Self::PartialOpen),
			2 => Some(Self::FullRestricted),
			3 => Some(Self::PartialRestricted),
			_ => None,
		}
	}

	/// Whether fulfillment must be mediated by the order's zone.
	pub fn is_restricted(self) -> bool {
		matches!(self, Self::FullRestricted | Self::PartialRestricted)
	}
}

/// Auction classification derived at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionType {
	/// Fixed price: every item has `start_amount == end_amount`.
	Basic,
	/// Restricted order whose zone is an externally owned account.
	English,
	/// Amounts interpolate linearly between start and end time.
	Dutch,
}

impl AuctionType {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::Basic),
			1 => Some(Self::English),
			2 => Some(Self::Dutch),
			_ => None,
		}
	}
}

/// An item offered by the offerer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferItem {
	pub item_type: ItemType,
	pub token: Address,
	pub identifier_or_criteria: U256,
	pub start_amount: U256,
	pub end_amount: U256,
}

/// An item the offerer expects to receive, with its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsiderationItem {
	pub item_type: ItemType,
	pub token: Address,
	pub identifier_or_criteria: U256,
	pub start_amount: U256,
	pub end_amount: U256,
	pub recipient: Address,
}

/// Extra recipient on a basic advanced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalRecipient {
	pub amount: U256,
	pub recipient: Address,
}

/// A signed Seaport order.
///
/// The signature is kept in its original 64- or 65-byte form; the wire codec
/// pads it to 65 bytes (see [`crate::codec`]). The advanced-order fields are
/// optional and fold back to `None` when they carry their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	pub offer: Vec<OfferItem>,
	pub consideration: Vec<ConsiderationItem>,
	pub offerer: Address,
	pub signature: Bytes,
	pub order_type: OrderType,
	pub start_time: u64,
	pub end_time: u64,
	pub counter: U256,
	pub salt: U256,
	pub conduit_key: B256,
	pub zone: Address,
	pub zone_hash: B256,
	pub chain_id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub numerator: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub denominator: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extra_data: Option<Bytes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub additional_recipients: Option<Vec<AdditionalRecipient>>,
}

impl Order {
	/// Checks the structural invariants that must hold before an order is
	/// hashed or persisted.
	pub fn check_structure(&self) -> Result<(), OrderDataError> {
		if self.offer.is_empty() {
			return Err(OrderDataError::EmptySide("offer"));
		}
		if self.consideration.is_empty() {
			return Err(OrderDataError::EmptySide("consideration"));
		}
		if self.offer.len() > MAX_ITEMS_PER_SIDE {
			return Err(OrderDataError::TooManyItems("offer"));
		}
		if self.consideration.len() > MAX_ITEMS_PER_SIDE {
			return Err(OrderDataError::TooManyItems("consideration"));
		}
		if let Some(recipients) = &self.additional_recipients {
			if recipients.len() > MAX_ADDITIONAL_RECIPIENTS {
				return Err(OrderDataError::TooManyRecipients);
			}
		}
		match self.signature.len() {
			64 | 65 => {},
			len => return Err(OrderDataError::InvalidSignatureLength(len)),
		}
		if self.end_time <= self.start_time {
			return Err(OrderDataError::InvalidTimes {
				start: self.start_time,
				end: self.end_time,
			});
		}
		Ok(())
	}

	/// Unique non-zero token addresses across both sides, in first-seen
	/// order. These are the collection topics the order is gossiped on.
	pub fn collection_addresses(&self) -> Vec<Address> {
		let mut seen = Vec::new();
		let offer_tokens = self.offer.iter().map(|item| item.token);
		let consideration_tokens = self.consideration.iter().map(|item| item.token);
		for token in offer_tokens.chain(consideration_tokens) {
			if token != Address::ZERO && !seen.contains(&token) {
				seen.push(token);
			}
		}
		seen
	}

	/// Whether every item on both sides has a flat amount.
	pub fn has_flat_amounts(&self) -> bool {
		self.offer
			.iter()
			.all(|item| item.start_amount == item.end_amount)
			&& self
				.consideration
				.iter()
				.all(|item| item.start_amount == item.end_amount)
	}

	/// Whether the advanced numerator/denominator pair is present.
	pub fn is_advanced(&self) -> bool {
		self.numerator.is_some() || self.denominator.is_some()
	}

	pub fn is_expired(&self, now: u64) -> bool {
		self.end_time <= now
	}

	/// Sum of fungible amounts on the side that contains fungibles, used as
	/// the order's price. Prefers the offer side.
	pub fn fungible_amount(&self) -> U256 {
		let offer_sum: U256 = self
			.offer
			.iter()
			.filter(|item| item.item_type.is_fungible())
			.map(|item| item.start_amount)
			.sum();
		if offer_sum > U256::ZERO {
			return offer_sum;
		}
		self.consideration
			.iter()
			.filter(|item| item.item_type.is_fungible())
			.map(|item| item.start_amount)
			.sum()
	}

	/// Current interpolated price at `now`, matching the settlement
	/// contract's flooring formula
	/// `start + elapsed * (end - start) / duration`.
	pub fn current_price(&self, now: u64) -> U256 {
		let start = self.fungible_start_amount();
		let end = self.fungible_end_amount();
		if start == end || now <= self.start_time {
			return start;
		}
		if now >= self.end_time {
			return end;
		}
		let elapsed = U256::from(now - self.start_time);
		let duration = U256::from(self.end_time - self.start_time);
		if end > start {
			start + elapsed * (end - start) / duration
		} else {
			start - elapsed * (start - end) / duration
		}
	}

	fn fungible_start_amount(&self) -> U256 {
		let offer_sum: U256 = self
			.offer
			.iter()
			.filter(|item| item.item_type.is_fungible())
			.map(|item| item.start_amount)
			.sum();
		if offer_sum > U256::ZERO {
			return offer_sum;
		}
		self.consideration
			.iter()
			.filter(|item| item.item_type.is_fungible())
			.map(|item| item.start_amount)
			.sum()
	}

	fn fungible_end_amount(&self) -> U256 {
		let offer_sum: U256 = self
			.offer
			.iter()
			.filter(|item| item.item_type.is_fungible())
			.map(|item| item.end_amount)
			.sum();
		if offer_sum > U256::ZERO {
			return offer_sum;
		}
		self.consideration
			.iter()
			.filter(|item| item.item_type.is_fungible())
			.map(|item| item.end_amount)
			.sum()
	}

	/// Whether the offer side holds the non-fungible leg, i.e. the offerer
	/// is selling. Criteria items count as non-fungible.
	pub fn is_sell(&self) -> bool {
		self.offer
			.iter()
			.any(|item| !item.item_type.is_fungible())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_order() -> Order {
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
				start_amount: U256::from(1000),
				end_amount: U256::from(1000),
				recipient: Address::repeat_byte(0x22),
			}],
			offerer: Address::repeat_byte(0x22),
			signature: Bytes::from(vec![7u8; 65]),
			order_type: OrderType::FullOpen,
			start_time: 100,
			end_time: 200,
			counter: U256::ZERO,
			salt: U256::from(42),
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
	fn structure_rejects_bad_times() {
		let mut order = base_order();
		order.end_time = order.start_time;
		assert_eq!(
			order.check_structure(),
			Err(OrderDataError::InvalidTimes { start: 100, end: 100 })
		);
	}

	#[test]
	fn structure_rejects_empty_offer() {
		let mut order = base_order();
		order.offer.clear();
		assert_eq!(order.check_structure(), Err(OrderDataError::EmptySide("offer")));
	}

	#[test]
	fn structure_rejects_bad_signature_length() {
		let mut order = base_order();
		order.signature = Bytes::from(vec![1u8; 63]);
		assert_eq!(
			order.check_structure(),
			Err(OrderDataError::InvalidSignatureLength(63))
		);
	}

	#[test]
	fn collections_exclude_zero_address_and_dedup() {
		let mut order = base_order();
		order.offer.push(OfferItem {
			item_type: ItemType::Erc721,
			token: Address::repeat_byte(0x11),
			identifier_or_criteria: U256::from(2),
			start_amount: U256::from(1),
			end_amount: U256::from(1),
		});
		let collections = order.collection_addresses();
		assert_eq!(collections, vec![Address::repeat_byte(0x11)]);
	}

	#[test]
	fn dutch_price_interpolates_with_floor() {
		let mut order = base_order();
		order.consideration[0].start_amount = U256::from(1000);
		order.consideration[0].end_amount = U256::from(500);
		// Halfway through the window.
		assert_eq!(order.current_price(150), U256::from(750));
		// Before start and after end clamp to the endpoints.
		assert_eq!(order.current_price(50), U256::from(1000));
		assert_eq!(order.current_price(500), U256::from(500));
	}

	#[test]
	fn sell_side_detection() {
		let order = base_order();
		assert!(order.is_sell());
		let mut buy = base_order();
		buy.offer[0].item_type = ItemType::Erc20;
		buy.consideration[0].item_type = ItemType::Erc721;
		assert!(!buy.is_sell());
	}
}
