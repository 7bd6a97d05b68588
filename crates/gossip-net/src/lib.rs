//! Networking layer for the Seaport gossip node.
//!
//! The transport itself (peer identity, discovery, connection management,
//! encryption, multiplexing, pub-sub routing) is a black box behind
//! [`NetworkInterface`]. This crate owns what rides on top of it: the
//! per-collection gossip pipeline with its deterministic message ids and
//! accept/reject scoring input, and the reqId-correlated request/response
//! wire protocol.

use async_trait::async_trait;
use alloy_primitives::Address;
use gossip_types::{Decoder, Encoder};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod gossip;
pub mod wire;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

pub use gossip::GossipLayer;
pub use wire::WireProtocol;

/// Opaque peer identity assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl std::fmt::Display for PeerId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for PeerId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Validation outcome reported back to the pub-sub router. Accept lets a
/// message propagate further; Reject lowers the sender's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
	Accept,
	Reject,
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone)]
pub struct GossipMessage {
	pub source: PeerId,
	pub msg_id: Vec<u8>,
	pub topic: String,
	pub data: Vec<u8>,
}

/// A stream frame delivered by a peer.
#[derive(Debug, Clone)]
pub struct InboundFrame {
	pub peer: PeerId,
	pub data: Vec<u8>,
}

/// Errors surfaced by the transport or the protocols above it.
#[derive(Debug, Error)]
pub enum NetworkError {
	/// The router has already seen this message from us.
	#[error("duplicate publish")]
	Duplicate,
	#[error("not connected to {0}")]
	NotConnected(PeerId),
	#[error("transport error: {0}")]
	Transport(String),
	#[error("request timed out")]
	Timeout,
	#[error("unexpected response opcode")]
	UnexpectedResponse,
	#[error("codec error: {0}")]
	Codec(#[from] gossip_types::CodecError),
}

/// The black-box transport seam.
#[async_trait]
pub trait NetworkInterface: Send + Sync {
	fn local_peer(&self) -> PeerId;

	/// Subscribes to a topic, returning its message stream.
	async fn subscribe(
		&self,
		topic: &str,
	) -> Result<mpsc::UnboundedReceiver<GossipMessage>, NetworkError>;

	async fn unsubscribe(&self, topic: &str) -> Result<(), NetworkError>;

	/// Publishes to a topic. Publishing a message the router already saw
	/// from this node yields [`NetworkError::Duplicate`].
	async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), NetworkError>;

	/// Feeds a validation outcome into the router's scoring.
	async fn report_validation(
		&self,
		msg_id: &[u8],
		source: &PeerId,
		acceptance: Acceptance,
	) -> Result<(), NetworkError>;

	/// Sends a stream frame to a connected peer.
	async fn send(&self, peer: &PeerId, data: Vec<u8>) -> Result<(), NetworkError>;

	/// The stream of frames sent to this node. Subsequent calls replace
	/// the previous receiver.
	async fn incoming(&self) -> Result<mpsc::UnboundedReceiver<InboundFrame>, NetworkError>;

	async fn peers(&self) -> Result<Vec<PeerId>, NetworkError>;

	/// Current score of a peer, as accumulated from validation reports.
	async fn score(&self, peer: &PeerId) -> Result<i64, NetworkError>;
}

/// Canonical topic name of a collection: its lowercase `0x` hex address.
/// The same string feeds message-id derivation on every node.
pub fn collection_topic(collection: &Address) -> String {
	format!("0x{}", hex::encode(collection))
}

/// Deterministic message id: `topic ‖ event code ‖ orderHash ‖ blockHash`.
///
/// Identical on every node for the same logical event so the pub-sub layer
/// can deduplicate. Undecodable payloads fall back to the raw bytes, which
/// still deduplicates exact copies.
pub fn message_id(topic: &str, data: &[u8]) -> Vec<u8> {
	let mut id = Vec::with_capacity(topic.len() + 1 + 32 + 32);
	id.extend_from_slice(topic.as_bytes());
	match gossip_types::GossipEvent::decode(data) {
		Ok(event) => {
			let mut enc = Encoder::new();
			enc.write_u8(event.kind() as u8);
			enc.write_b256(&event.order_hash());
			enc.write_b256(&event.block_hash());
			id.extend_from_slice(&enc.into_bytes());
		},
		Err(_) => id.extend_from_slice(data),
	}
	id
}

/// Splits a stream frame into its opcode and body.
///
/// Frame layout: `u32` little-endian body length, a reserved little-endian
/// `u32` header word (currently zero), the opcode byte, then the body.
pub fn decode_frame(data: &[u8]) -> Result<(gossip_types::Opcode, &[u8]), NetworkError> {
	let mut dec = Decoder::new(data);
	let body_len = dec.read_u32()? as usize;
	let _reserved = dec.read_u32()?;
	let opcode_raw = dec.read_u8()?;
	let opcode = gossip_types::Opcode::from_u8(opcode_raw).ok_or(
		gossip_types::CodecError::InvalidEnum {
			field: "opcode",
			value: opcode_raw,
		},
	)?;
	let body = &data[9..];
	if body.len() != body_len {
		return Err(gossip_types::CodecError::UnexpectedEof.into());
	}
	Ok((opcode, body))
}

/// Assembles a stream frame around an encoded message body.
pub fn encode_frame(opcode: gossip_types::Opcode, body: &[u8]) -> Vec<u8> {
	let mut enc = Encoder::new();
	enc.write_u32(body.len() as u32);
	enc.write_u32(0);
	enc.write_u8(opcode as u8);
	let mut frame = enc.into_bytes();
	frame.extend_from_slice(body);
	frame
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{B256, U256};
	use gossip_types::{GossipEvent, Opcode};

	#[test]
	fn topics_are_lowercase_prefixed_hex() {
		let collection = Address::repeat_byte(0xAB);
		assert_eq!(
			collection_topic(&collection),
			"0xabababababababababababababababababababab"
		);
	}

	#[test]
	fn message_ids_agree_across_nodes() {
		let event = GossipEvent::CounterIncremented {
			offerer: Address::repeat_byte(0x22),
			new_counter: U256::from(2),
			block_number: 7,
			block_hash: B256::repeat_byte(0x44),
		};
		let topic = collection_topic(&Address::repeat_byte(0x11));
		// Two independent encodings of the same logical event yield the
		// same id.
		let id_a = message_id(&topic, &event.encode());
		let id_b = message_id(&topic, &event.clone().encode());
		assert_eq!(id_a, id_b);

		// A different block hash yields a different id.
		let other = GossipEvent::CounterIncremented {
			offerer: Address::repeat_byte(0x22),
			new_counter: U256::from(2),
			block_number: 7,
			block_hash: B256::repeat_byte(0x45),
		};
		assert_ne!(id_a, message_id(&topic, &other.encode()));
	}

	#[test]
	fn frames_round_trip() {
		let body = vec![1u8, 2, 3];
		let frame = encode_frame(Opcode::GetOrders, &body);
		let (opcode, decoded) = decode_frame(&frame).unwrap();
		assert_eq!(opcode, Opcode::GetOrders);
		assert_eq!(decoded, &body[..]);
	}

	#[test]
	fn truncated_frame_is_rejected() {
		let frame = encode_frame(Opcode::GetOrders, &[1, 2, 3]);
		assert!(decode_frame(&frame[..frame.len() - 1]).is_err());
	}

	#[test]
	fn unknown_opcode_is_rejected() {
		let mut frame = encode_frame(Opcode::GetOrders, &[]);
		frame[8] = 0x99;
		assert!(decode_frame(&frame).is_err());
	}
}
