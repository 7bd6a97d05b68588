//! Gossip event taxonomy published on collection topics.
//!
//! Every event is anchored to the block where its cause was observed, so
//! that independently derived message ids agree across nodes and the
//! pub-sub layer can deduplicate.

use crate::codec::{read_order, write_order, CodecError, Decoder, Encoder};
use crate::order::Order;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Discriminant of a gossip event on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
	New = 0,
	Validated = 1,
	Invalidated = 2,
	Cancelled = 3,
	Fulfilled = 4,
	CounterIncremented = 5,
}

impl EventKind {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::New),
			1 => Some(Self::Validated),
			2 => Some(Self::Invalidated),
			3 => Some(Self::Cancelled),
			4 => Some(Self::Fulfilled),
			5 => Some(Self::CounterIncremented),
			_ => None,
		}
	}
}

/// An event propagated on a collection topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GossipEvent {
	/// A newly admitted order.
	New {
		order: Order,
		block_number: u64,
		block_hash: B256,
	},
	/// An order flipped to valid on revalidation or on-chain validation.
	Validated {
		order_hash: B256,
		order: Option<Order>,
		block_number: u64,
		block_hash: B256,
	},
	/// An order flipped to invalid on revalidation.
	Invalidated {
		order_hash: B256,
		order: Option<Order>,
		block_number: u64,
		block_hash: B256,
	},
	/// The settlement contract observed a cancellation.
	Cancelled {
		order_hash: B256,
		block_number: u64,
		block_hash: B256,
	},
	/// The settlement contract observed a fulfillment.
	Fulfilled {
		order_hash: B256,
		block_number: u64,
		block_hash: B256,
	},
	/// An offerer bumped their counter, invalidating prior-counter orders.
	/// The order hash of this event is the zero hash.
	CounterIncremented {
		offerer: Address,
		new_counter: U256,
		block_number: u64,
		block_hash: B256,
	},
}

impl GossipEvent {
	pub fn kind(&self) -> EventKind {
		match self {
			Self::New { .. } => EventKind::New,
			Self::Validated { .. } => EventKind::Validated,
			Self::Invalidated { .. } => EventKind::Invalidated,
			Self::Cancelled { .. } => EventKind::Cancelled,
			Self::Fulfilled { .. } => EventKind::Fulfilled,
			Self::CounterIncremented { .. } => EventKind::CounterIncremented,
		}
	}

	/// The order hash this event is about; zero for counter events.
	pub fn order_hash(&self) -> B256 {
		match self {
			Self::New { order, .. } => crate::hash::order_hash(order),
			Self::Validated { order_hash, .. }
			| Self::Invalidated { order_hash, .. }
			| Self::Cancelled { order_hash, .. }
			| Self::Fulfilled { order_hash, .. } => *order_hash,
			Self::CounterIncremented { .. } => B256::ZERO,
		}
	}

	pub fn block_number(&self) -> u64 {
		match self {
			Self::New { block_number, .. }
			| Self::Validated { block_number, .. }
			| Self::Invalidated { block_number, .. }
			| Self::Cancelled { block_number, .. }
			| Self::Fulfilled { block_number, .. }
			| Self::CounterIncremented { block_number, .. } => *block_number,
		}
	}

	pub fn block_hash(&self) -> B256 {
		match self {
			Self::New { block_hash, .. }
			| Self::Validated { block_hash, .. }
			| Self::Invalidated { block_hash, .. }
			| Self::Cancelled { block_hash, .. }
			| Self::Fulfilled { block_hash, .. }
			| Self::CounterIncremented { block_hash, .. } => *block_hash,
		}
	}

	/// The order carried by this event, if any.
	pub fn order(&self) -> Option<&Order> {
		match self {
			Self::New { order, .. } => Some(order),
			Self::Validated { order, .. } | Self::Invalidated { order, .. } => order.as_ref(),
			_ => None,
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut enc = Encoder::new();
		enc.write_u8(self.kind() as u8);
		enc.write_b256(&self.order_hash());
		enc.write_u64(self.block_number());
		enc.write_b256(&self.block_hash());
		match self {
			Self::New { order, .. } => write_order(&mut enc, order),
			Self::Validated { order, .. } | Self::Invalidated { order, .. } => {
				enc.write_bool(order.is_some());
				if let Some(order) = order {
					write_order(&mut enc, order);
				}
			},
			Self::Cancelled { .. } | Self::Fulfilled { .. } => {},
			Self::CounterIncremented {
				offerer,
				new_counter,
				..
			} => {
				enc.write_address(offerer);
				enc.write_u256(*new_counter);
			},
		}
		enc.into_bytes()
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
		let mut dec = Decoder::new(bytes);
		let kind_raw = dec.read_u8()?;
		let kind = EventKind::from_u8(kind_raw).ok_or(CodecError::InvalidEnum {
			field: "event",
			value: kind_raw,
		})?;
		let order_hash = dec.read_b256()?;
		let block_number = dec.read_u64()?;
		let block_hash = dec.read_b256()?;
		let event = match kind {
			EventKind::New => Self::New {
				order: read_order(&mut dec)?,
				block_number,
				block_hash,
			},
			EventKind::Validated | EventKind::Invalidated => {
				let order = if dec.read_bool()? {
					Some(read_order(&mut dec)?)
				} else {
					None
				};
				if kind == EventKind::Validated {
					Self::Validated {
						order_hash,
						order,
						block_number,
						block_hash,
					}
				} else {
					Self::Invalidated {
						order_hash,
						order,
						block_number,
						block_hash,
					}
				}
			},
			EventKind::Cancelled => Self::Cancelled {
				order_hash,
				block_number,
				block_hash,
			},
			EventKind::Fulfilled => Self::Fulfilled {
				order_hash,
				block_number,
				block_hash,
			},
			EventKind::CounterIncremented => Self::CounterIncremented {
				offerer: dec.read_address()?,
				new_counter: dec.read_u256()?,
				block_number,
				block_hash,
			},
		};
		dec.finish()?;
		Ok(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::order::{ConsiderationItem, ItemType, OfferItem, OrderType};
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
				start_amount: U256::from(1000),
				end_amount: U256::from(1000),
				recipient: Address::repeat_byte(0x22),
			}],
			offerer: Address::repeat_byte(0x22),
			signature: Bytes::from(vec![1u8; 65]),
			order_type: OrderType::FullOpen,
			start_time: 1,
			end_time: 2,
			counter: U256::ZERO,
			salt: U256::from(5),
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
	fn new_event_round_trips() {
		let event = GossipEvent::New {
			order: sample_order(),
			block_number: 10,
			block_hash: B256::repeat_byte(0xaa),
		};
		let decoded = GossipEvent::decode(&event.encode()).unwrap();
		assert_eq!(decoded, event);
	}

	#[test]
	fn counter_event_round_trips_with_zero_hash() {
		let event = GossipEvent::CounterIncremented {
			offerer: Address::repeat_byte(0x22),
			new_counter: U256::from(2),
			block_number: 11,
			block_hash: B256::repeat_byte(0xbb),
		};
		assert_eq!(event.order_hash(), B256::ZERO);
		let decoded = GossipEvent::decode(&event.encode()).unwrap();
		assert_eq!(decoded, event);
	}

	#[test]
	fn validated_without_order_round_trips() {
		let event = GossipEvent::Validated {
			order_hash: B256::repeat_byte(0x01),
			order: None,
			block_number: 12,
			block_hash: B256::repeat_byte(0xcc),
		};
		let decoded = GossipEvent::decode(&event.encode()).unwrap();
		assert_eq!(decoded, event);
	}

	#[test]
	fn unknown_kind_is_rejected() {
		let mut enc = Encoder::new();
		enc.write_u8(9);
		enc.write_b256(&B256::ZERO);
		enc.write_u64(0);
		enc.write_b256(&B256::ZERO);
		assert_eq!(
			GossipEvent::decode(&enc.into_bytes()),
			Err(CodecError::InvalidEnum { field: "event", value: 9 })
		);
	}
}
