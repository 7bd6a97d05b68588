//! Deterministic binary encoding primitives and the order codec.
//!
//! Every value that crosses the network (orders, gossip events, and
//! request/response messages) is encoded with these primitives so that all
//! nodes produce identical bytes for identical values. Integers are
//! little-endian and fixed width; composite lists carry a `u32` element
//! count and are capped on both encode and decode.

use crate::order::{
	AdditionalRecipient, ConsiderationItem, ItemType, OfferItem, Order, OrderType,
	MAX_ADDITIONAL_RECIPIENTS, MAX_ITEMS_PER_SIDE,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use thiserror::Error;

/// Wire width of an encoded signature.
pub const SIGNATURE_WIDTH: usize = 65;

/// Errors raised while decoding wire bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
	#[error("unexpected end of input")]
	UnexpectedEof,
	#[error("{0} trailing bytes after message")]
	TrailingBytes(usize),
	#[error("invalid {field} discriminant {value}")]
	InvalidEnum { field: &'static str, value: u8 },
	#[error("{what} list of {len} exceeds cap of {max}")]
	ListTooLong {
		what: &'static str,
		len: usize,
		max: usize,
	},
}

/// Append-only encoder over a byte buffer.
#[derive(Debug, Default)]
pub struct Encoder {
	buf: Vec<u8>,
}

impl Encoder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.buf
	}

	pub fn write_bool(&mut self, value: bool) {
		self.buf.push(value as u8);
	}

	pub fn write_u8(&mut self, value: u8) {
		self.buf.push(value);
	}

	pub fn write_u16(&mut self, value: u16) {
		self.buf.extend_from_slice(&value.to_le_bytes());
	}

	pub fn write_u32(&mut self, value: u32) {
		self.buf.extend_from_slice(&value.to_le_bytes());
	}

	pub fn write_u64(&mut self, value: u64) {
		self.buf.extend_from_slice(&value.to_le_bytes());
	}

	pub fn write_u256(&mut self, value: U256) {
		self.buf.extend_from_slice(&value.to_le_bytes::<32>());
	}

	pub fn write_address(&mut self, value: &Address) {
		self.buf.extend_from_slice(value.as_slice());
	}

	pub fn write_b256(&mut self, value: &B256) {
		self.buf.extend_from_slice(value.as_slice());
	}

	/// Length-prefixed byte vector.
	pub fn write_bytes(&mut self, value: &[u8]) {
		self.write_u32(value.len() as u32);
		self.buf.extend_from_slice(value);
	}

	/// Signatures are encoded at a fixed 65 bytes; shorter signatures are
	/// left-padded with zero.
	pub fn write_signature(&mut self, signature: &[u8]) {
		if signature.len() < SIGNATURE_WIDTH {
			self.buf
				.extend(std::iter::repeat(0u8).take(SIGNATURE_WIDTH - signature.len()));
		}
		self.buf.extend_from_slice(signature);
	}
}

/// Cursor-based decoder over wire bytes.
#[derive(Debug)]
pub struct Decoder<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Decoder<'a> {
	pub fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
		if self.pos + len > self.buf.len() {
			return Err(CodecError::UnexpectedEof);
		}
		let slice = &self.buf[self.pos..self.pos + len];
		self.pos += len;
		Ok(slice)
	}

	/// Fails if any input remains unconsumed.
	pub fn finish(&self) -> Result<(), CodecError> {
		let remaining = self.buf.len() - self.pos;
		if remaining > 0 {
			return Err(CodecError::TrailingBytes(remaining));
		}
		Ok(())
	}

	pub fn read_bool(&mut self) -> Result<bool, CodecError> {
		Ok(self.take(1)?[0] != 0)
	}

	pub fn read_u8(&mut self) -> Result<u8, CodecError> {
		Ok(self.take(1)?[0])
	}

	pub fn read_u16(&mut self) -> Result<u16, CodecError> {
		let bytes = self.take(2)?;
		Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
	}

	pub fn read_u32(&mut self) -> Result<u32, CodecError> {
		let bytes = self.take(4)?;
		Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
	}

	pub fn read_u64(&mut self) -> Result<u64, CodecError> {
		let bytes = self.take(8)?;
		Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
	}

	pub fn read_u256(&mut self) -> Result<U256, CodecError> {
		Ok(U256::from_le_slice(self.take(32)?))
	}

	pub fn read_address(&mut self) -> Result<Address, CodecError> {
		Ok(Address::from_slice(self.take(20)?))
	}

	pub fn read_b256(&mut self) -> Result<B256, CodecError> {
		Ok(B256::from_slice(self.take(32)?))
	}

	pub fn read_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
		let len = self.read_u32()? as usize;
		Ok(self.take(len)?.to_vec())
	}

	/// Reads a fixed 65-byte signature, stripping one leading zero byte to
	/// recover a 64-byte compact signature.
	pub fn read_signature(&mut self) -> Result<Bytes, CodecError> {
		let raw = self.take(SIGNATURE_WIDTH)?;
		if raw[0] == 0 {
			Ok(Bytes::copy_from_slice(&raw[1..]))
		} else {
			Ok(Bytes::copy_from_slice(raw))
		}
	}

	/// Reads a list length and enforces its cap before any element is read.
	pub fn read_list_len(
		&mut self,
		what: &'static str,
		max: usize,
	) -> Result<usize, CodecError> {
		let len = self.read_u32()? as usize;
		if len > max {
			return Err(CodecError::ListTooLong { what, len, max });
		}
		Ok(len)
	}
}

fn write_offer_item(enc: &mut Encoder, item: &OfferItem) {
	enc.write_u8(item.item_type as u8);
	enc.write_address(&item.token);
	enc.write_u256(item.identifier_or_criteria);
	enc.write_u256(item.start_amount);
	enc.write_u256(item.end_amount);
}

fn read_item_type(dec: &mut Decoder<'_>) -> Result<ItemType, CodecError> {
	let value = dec.read_u8()?;
	ItemType::from_u8(value).ok_or(CodecError::InvalidEnum {
		field: "itemType",
		value,
	})
}

fn read_offer_item(dec: &mut Decoder<'_>) -> Result<OfferItem, CodecError> {
	Ok(OfferItem {
		item_type: read_item_type(dec)?,
		token: dec.read_address()?,
		identifier_or_criteria: dec.read_u256()?,
		start_amount: dec.read_u256()?,
		end_amount: dec.read_u256()?,
	})
}

fn write_consideration_item(enc: &mut Encoder, item: &ConsiderationItem) {
	enc.write_u8(item.item_type as u8);
	enc.write_address(&item.token);
	enc.write_u256(item.identifier_or_criteria);
	enc.write_u256(item.start_amount);
	enc.write_u256(item.end_amount);
	enc.write_address(&item.recipient);
}

fn read_consideration_item(dec: &mut Decoder<'_>) -> Result<ConsiderationItem, CodecError> {
	Ok(ConsiderationItem {
		item_type: read_item_type(dec)?,
		token: dec.read_address()?,
		identifier_or_criteria: dec.read_u256()?,
		start_amount: dec.read_u256()?,
		end_amount: dec.read_u256()?,
		recipient: dec.read_address()?,
	})
}

/// Encodes an order into an existing encoder.
pub fn write_order(enc: &mut Encoder, order: &Order) {
	enc.write_address(&order.offerer);
	enc.write_address(&order.zone);
	enc.write_b256(&order.zone_hash);
	enc.write_u8(order.order_type as u8);
	enc.write_u64(order.start_time);
	enc.write_u64(order.end_time);
	enc.write_u256(order.counter);
	enc.write_u256(order.salt);
	enc.write_b256(&order.conduit_key);
	enc.write_u64(order.chain_id);
	enc.write_signature(&order.signature);

	enc.write_u32(order.offer.len() as u32);
	for item in &order.offer {
		write_offer_item(enc, item);
	}
	enc.write_u32(order.consideration.len() as u32);
	for item in &order.consideration {
		write_consideration_item(enc, item);
	}

	// Advanced-order fields always travel; absent values encode as their
	// defaults and fold back to absent on decode.
	enc.write_u256(order.numerator.unwrap_or(U256::ZERO));
	enc.write_u256(order.denominator.unwrap_or(U256::ZERO));
	match &order.extra_data {
		Some(data) => enc.write_bytes(data),
		None => enc.write_bytes(&[0u8; 32]),
	}
	let recipients = order.additional_recipients.as_deref().unwrap_or(&[]);
	enc.write_u32(recipients.len() as u32);
	for recipient in recipients {
		enc.write_u256(recipient.amount);
		enc.write_address(&recipient.recipient);
	}
}

/// Decodes an order from an existing decoder.
pub fn read_order(dec: &mut Decoder<'_>) -> Result<Order, CodecError> {
	let offerer = dec.read_address()?;
	let zone = dec.read_address()?;
	let zone_hash = dec.read_b256()?;
	let order_type_raw = dec.read_u8()?;
	let order_type = OrderType::from_u8(order_type_raw).ok_or(CodecError::InvalidEnum {
		field: "orderType",
		value: order_type_raw,
	})?;
	let start_time = dec.read_u64()?;
	let end_time = dec.read_u64()?;
	let counter = dec.read_u256()?;
	let salt = dec.read_u256()?;
	let conduit_key = dec.read_b256()?;
	let chain_id = dec.read_u64()?;
	let signature = dec.read_signature()?;

	let offer_len = dec.read_list_len("offer", MAX_ITEMS_PER_SIDE)?;
	let mut offer = Vec::with_capacity(offer_len);
	for _ in 0..offer_len {
		offer.push(read_offer_item(dec)?);
	}
	let consideration_len = dec.read_list_len("consideration", MAX_ITEMS_PER_SIDE)?;
	let mut consideration = Vec::with_capacity(consideration_len);
	for _ in 0..consideration_len {
		consideration.push(read_consideration_item(dec)?);
	}

	let numerator = dec.read_u256()?;
	let denominator = dec.read_u256()?;
	let extra_data = dec.read_bytes()?;
	let recipients_len =
		dec.read_list_len("additionalRecipients", MAX_ADDITIONAL_RECIPIENTS)?;
	let mut additional_recipients = Vec::with_capacity(recipients_len);
	for _ in 0..recipients_len {
		additional_recipients.push(AdditionalRecipient {
			amount: dec.read_u256()?,
			recipient: dec.read_address()?,
		});
	}

	Ok(Order {
		offer,
		consideration,
		offerer,
		signature,
		order_type,
		start_time,
		end_time,
		counter,
		salt,
		conduit_key,
		zone,
		zone_hash,
		chain_id,
		numerator: (numerator != U256::ZERO).then_some(numerator),
		denominator: (denominator != U256::ZERO).then_some(denominator),
		extra_data: (extra_data != [0u8; 32]).then(|| Bytes::from(extra_data)),
		additional_recipients: (!additional_recipients.is_empty())
			.then_some(additional_recipients),
	})
}

/// Encodes a standalone order.
pub fn encode_order(order: &Order) -> Vec<u8> {
	let mut enc = Encoder::new();
	write_order(&mut enc, order);
	enc.into_bytes()
}

/// Decodes a standalone order, rejecting trailing bytes.
pub fn decode_order(bytes: &[u8]) -> Result<Order, CodecError> {
	let mut dec = Decoder::new(bytes);
	let order = read_order(&mut dec)?;
	dec.finish()?;
	Ok(order)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_order(signature_len: usize) -> Order {
		Order {
			offer: vec![OfferItem {
				item_type: ItemType::Erc1155,
				token: Address::repeat_byte(0x11),
				identifier_or_criteria: U256::from(5),
				start_amount: U256::from(10),
				end_amount: U256::from(10),
			}],
			consideration: vec![ConsiderationItem {
				item_type: ItemType::Erc20,
				token: Address::repeat_byte(0x33),
				identifier_or_criteria: U256::ZERO,
				start_amount: U256::from(500),
				end_amount: U256::from(400),
				recipient: Address::repeat_byte(0x22),
			}],
			offerer: Address::repeat_byte(0x22),
			signature: Bytes::from(vec![9u8; signature_len]),
			order_type: OrderType::PartialRestricted,
			start_time: 1_700_000_000,
			end_time: 1_700_086_400,
			counter: U256::from(3),
			salt: U256::MAX,
			conduit_key: B256::repeat_byte(0x44),
			zone: Address::repeat_byte(0x55),
			zone_hash: B256::repeat_byte(0x66),
			chain_id: 1,
			numerator: None,
			denominator: None,
			extra_data: None,
			additional_recipients: None,
		}
	}

	#[test]
	fn order_round_trips() {
		let order = sample_order(65);
		let decoded = decode_order(&encode_order(&order)).unwrap();
		assert_eq!(decoded, order);
	}

	#[test]
	fn compact_signature_round_trips_via_padding() {
		let order = sample_order(64);
		let encoded = encode_order(&order);
		let decoded = decode_order(&encoded).unwrap();
		assert_eq!(decoded.signature.len(), 64);
		assert_eq!(decoded, order);
	}

	#[test]
	fn advanced_fields_round_trip() {
		let mut order = sample_order(65);
		order.numerator = Some(U256::from(1));
		order.denominator = Some(U256::from(4));
		order.extra_data = Some(Bytes::from(vec![1, 2, 3]));
		order.additional_recipients = Some(vec![AdditionalRecipient {
			amount: U256::from(7),
			recipient: Address::repeat_byte(0x77),
		}]);
		let decoded = decode_order(&encode_order(&order)).unwrap();
		assert_eq!(decoded, order);
	}

	#[test]
	fn advanced_defaults_fold_to_absent() {
		let order = sample_order(65);
		let decoded = decode_order(&encode_order(&order)).unwrap();
		assert_eq!(decoded.numerator, None);
		assert_eq!(decoded.denominator, None);
		assert_eq!(decoded.extra_data, None);
		assert_eq!(decoded.additional_recipients, None);
	}

	#[test]
	fn oversized_list_is_rejected_before_elements() {
		let mut enc = Encoder::new();
		enc.write_u32(MAX_ITEMS_PER_SIDE as u32 + 1);
		let bytes = enc.into_bytes();
		let mut dec = Decoder::new(&bytes);
		assert_eq!(
			dec.read_list_len("offer", MAX_ITEMS_PER_SIDE),
			Err(CodecError::ListTooLong {
				what: "offer",
				len: MAX_ITEMS_PER_SIDE + 1,
				max: MAX_ITEMS_PER_SIDE,
			})
		);
	}

	#[test]
	fn trailing_bytes_are_rejected() {
		let order = sample_order(65);
		let mut encoded = encode_order(&order);
		encoded.push(0);
		assert_eq!(decode_order(&encoded), Err(CodecError::TrailingBytes(1)));
	}
}
