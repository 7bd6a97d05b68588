//! Request/response messages exchanged over peer streams.
//!
//! Each message body is preceded on the stream by a 5-byte header: a
//! reserved little-endian `u32` (currently zero) followed by the opcode
//! byte. Requests carry a `reqId` drawn from a per-connection counter;
//! responses echo it.

use crate::codec::{read_order, write_order, CodecError, Decoder, Encoder};
use crate::order::Order;
use crate::query::{OrderSort, Side};
use alloy_primitives::{Address, B256, U256};

/// Maximum orders in an `Orders` response.
pub const MAX_ORDERS_PER_RESPONSE: usize = 1_000;
/// Maximum hashes in a `GetOrders` request or `OrderHashes` response.
pub const MAX_HASHES_PER_MESSAGE: usize = 1_000_000;
/// Maximum token ids in a `CriteriaItems` response.
pub const MAX_CRITERIA_ITEMS: usize = 10_000_000;

/// Stream opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
	GetOrders = 0x01,
	Orders = 0x02,
	GetOrderHashes = 0x03,
	OrderHashes = 0x04,
	GetOrderCount = 0x05,
	OrderCount = 0x06,
	GetCriteria = 0x07,
	CriteriaItems = 0x08,
}

impl Opcode {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0x01 => Some(Self::GetOrders),
			0x02 => Some(Self::Orders),
			0x03 => Some(Self::GetOrderHashes),
			0x04 => Some(Self::OrderHashes),
			0x05 => Some(Self::GetOrderCount),
			0x06 => Some(Self::OrderCount),
			0x07 => Some(Self::GetCriteria),
			0x08 => Some(Self::CriteriaItems),
			_ => None,
		}
	}

	/// Whether this opcode initiates a request.
	pub fn is_request(self) -> bool {
		matches!(
			self,
			Self::GetOrders | Self::GetOrderHashes | Self::GetOrderCount | Self::GetCriteria
		)
	}
}

/// Side/sort/pagination options carried by hash and count requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashQuery {
	pub side: Side,
	pub sort: OrderSort,
	pub count: u32,
	pub offset: u32,
}

impl Default for HashQuery {
	fn default() -> Self {
		Self {
			side: Side::Sell,
			sort: OrderSort::Newest,
			count: 50,
			offset: 0,
		}
	}
}

impl HashQuery {
	fn write(&self, enc: &mut Encoder) {
		enc.write_u8(self.side as u8);
		enc.write_u8(self.sort as u8);
		enc.write_u32(self.count);
		enc.write_u32(self.offset);
	}

	fn read(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
		let side_raw = dec.read_u8()?;
		let side = Side::from_u8(side_raw).ok_or(CodecError::InvalidEnum {
			field: "side",
			value: side_raw,
		})?;
		let sort_raw = dec.read_u8()?;
		let sort = OrderSort::from_u8(sort_raw).ok_or(CodecError::InvalidEnum {
			field: "sort",
			value: sort_raw,
		})?;
		Ok(Self {
			side,
			sort,
			count: dec.read_u32()?,
			offset: dec.read_u32()?,
		})
	}
}

/// A decoded stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
	GetOrders { req_id: u64, hashes: Vec<B256> },
	Orders { req_id: u64, orders: Vec<Order> },
	GetOrderHashes { req_id: u64, address: Address, query: HashQuery },
	OrderHashes { req_id: u64, hashes: Vec<B256> },
	GetOrderCount { req_id: u64, address: Address, query: HashQuery },
	OrderCount { req_id: u64, count: u64 },
	GetCriteria { req_id: u64, hash: B256 },
	CriteriaItems { req_id: u64, hash: B256, items: Vec<U256> },
}

impl WireMessage {
	pub fn opcode(&self) -> Opcode {
		match self {
			Self::GetOrders { .. } => Opcode::GetOrders,
			Self::Orders { .. } => Opcode::Orders,
			Self::GetOrderHashes { .. } => Opcode::GetOrderHashes,
			Self::OrderHashes { .. } => Opcode::OrderHashes,
			Self::GetOrderCount { .. } => Opcode::GetOrderCount,
			Self::OrderCount { .. } => Opcode::OrderCount,
			Self::GetCriteria { .. } => Opcode::GetCriteria,
			Self::CriteriaItems { .. } => Opcode::CriteriaItems,
		}
	}

	pub fn req_id(&self) -> u64 {
		match self {
			Self::GetOrders { req_id, .. }
			| Self::Orders { req_id, .. }
			| Self::GetOrderHashes { req_id, .. }
			| Self::OrderHashes { req_id, .. }
			| Self::GetOrderCount { req_id, .. }
			| Self::OrderCount { req_id, .. }
			| Self::GetCriteria { req_id, .. }
			| Self::CriteriaItems { req_id, .. } => *req_id,
		}
	}

	/// Encodes the message body (without the stream header).
	pub fn encode_body(&self) -> Vec<u8> {
		let mut enc = Encoder::new();
		enc.write_u64(self.req_id());
		match self {
			Self::GetOrders { hashes, .. } | Self::OrderHashes { hashes, .. } => {
				enc.write_u32(hashes.len() as u32);
				for hash in hashes {
					enc.write_b256(hash);
				}
			},
			Self::Orders { orders, .. } => {
				enc.write_u32(orders.len() as u32);
				for order in orders {
					write_order(&mut enc, order);
				}
			},
			Self::GetOrderHashes { address, query, .. }
			| Self::GetOrderCount { address, query, .. } => {
				enc.write_address(address);
				query.write(&mut enc);
			},
			Self::OrderCount { count, .. } => enc.write_u64(*count),
			Self::GetCriteria { hash, .. } => enc.write_b256(hash),
			Self::CriteriaItems { hash, items, .. } => {
				enc.write_b256(hash);
				enc.write_u32(items.len() as u32);
				for item in items {
					enc.write_u256(*item);
				}
			},
		}
		enc.into_bytes()
	}

	/// Decodes a message body for a known opcode.
	pub fn decode_body(opcode: Opcode, body: &[u8]) -> Result<Self, CodecError> {
		let mut dec = Decoder::new(body);
		let req_id = dec.read_u64()?;
		let message = match opcode {
			Opcode::GetOrders | Opcode::OrderHashes => {
				let len = dec.read_list_len("hashes", MAX_HASHES_PER_MESSAGE)?;
				let mut hashes = Vec::with_capacity(len.min(4096));
				for _ in 0..len {
					hashes.push(dec.read_b256()?);
				}
				if opcode == Opcode::GetOrders {
					Self::GetOrders { req_id, hashes }
				} else {
					Self::OrderHashes { req_id, hashes }
				}
			},
			Opcode::Orders => {
				let len = dec.read_list_len("orders", MAX_ORDERS_PER_RESPONSE)?;
				let mut orders = Vec::with_capacity(len);
				for _ in 0..len {
					orders.push(read_order(&mut dec)?);
				}
				Self::Orders { req_id, orders }
			},
			Opcode::GetOrderHashes => Self::GetOrderHashes {
				req_id,
				address: dec.read_address()?,
				query: HashQuery::read(&mut dec)?,
			},
			Opcode::GetOrderCount => Self::GetOrderCount {
				req_id,
				address: dec.read_address()?,
				query: HashQuery::read(&mut dec)?,
			},
			Opcode::OrderCount => Self::OrderCount {
				req_id,
				count: dec.read_u64()?,
			},
			Opcode::GetCriteria => Self::GetCriteria {
				req_id,
				hash: dec.read_b256()?,
			},
			Opcode::CriteriaItems => {
				let hash = dec.read_b256()?;
				let len = dec.read_list_len("criteriaItems", MAX_CRITERIA_ITEMS)?;
				let mut items = Vec::with_capacity(len.min(4096));
				for _ in 0..len {
					items.push(dec.read_u256()?);
				}
				Self::CriteriaItems { req_id, hash, items }
			},
		};
		dec.finish()?;
		Ok(message)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn get_orders_round_trips() {
		let message = WireMessage::GetOrders {
			req_id: 7,
			hashes: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
		};
		let body = message.encode_body();
		let decoded = WireMessage::decode_body(Opcode::GetOrders, &body).unwrap();
		assert_eq!(decoded, message);
	}

	#[test]
	fn count_round_trips_and_echoes_req_id() {
		let message = WireMessage::OrderCount { req_id: 42, count: 1 };
		let body = message.encode_body();
		let decoded = WireMessage::decode_body(Opcode::OrderCount, &body).unwrap();
		assert_eq!(decoded.req_id(), 42);
		assert_eq!(decoded, message);
	}

	#[test]
	fn hash_query_round_trips() {
		let message = WireMessage::GetOrderHashes {
			req_id: 1,
			address: Address::repeat_byte(0x11),
			query: HashQuery {
				side: Side::Buy,
				sort: OrderSort::Oldest,
				count: 50,
				offset: 100,
			},
		};
		let body = message.encode_body();
		let decoded = WireMessage::decode_body(Opcode::GetOrderHashes, &body).unwrap();
		assert_eq!(decoded, message);
	}

	#[test]
	fn criteria_items_round_trip() {
		let message = WireMessage::CriteriaItems {
			req_id: 3,
			hash: B256::repeat_byte(9),
			items: vec![U256::from(1), U256::from(2)],
		};
		let body = message.encode_body();
		let decoded = WireMessage::decode_body(Opcode::CriteriaItems, &body).unwrap();
		assert_eq!(decoded, message);
	}

	#[test]
	fn request_opcodes_are_odd() {
		assert!(Opcode::GetOrders.is_request());
		assert!(!Opcode::Orders.is_request());
		assert_eq!(Opcode::from_u8(0x08), Some(Opcode::CriteriaItems));
		assert_eq!(Opcode::from_u8(0x09), None);
	}
}
