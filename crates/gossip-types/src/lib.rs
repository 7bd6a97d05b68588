//! Common types module for the Seaport gossip node.
//!
//! This module defines the core data types shared by every component of the
//! node: the order model, order metadata, criteria sets, the canonical order
//! hash, the deterministic wire codec, the gossip event taxonomy, and the
//! request/response message set.

/// Deterministic binary encoding primitives and the order codec.
pub mod codec;
/// Criteria sets (Merkle roots over token identifier sets).
pub mod criteria;
/// Gossip event taxonomy published on collection topics.
pub mod events;
/// Canonical Seaport order-hash derivation.
pub mod hash;
/// Request/response messages exchanged over peer streams.
pub mod messages;
/// Order metadata tracked alongside each stored order.
pub mod metadata;
/// The Seaport order model.
pub mod order;
/// Read-side query options (side, sort, filters).
pub mod query;
/// Configuration schema validation framework.
pub mod schema;
/// Small shared helpers.
pub mod utils;

// Re-export all types for convenient access
pub use codec::{CodecError, Decoder, Encoder};
pub use criteria::Criteria;
pub use events::{EventKind, GossipEvent};
pub use hash::order_hash;
pub use messages::{
	HashQuery, Opcode, WireMessage, MAX_CRITERIA_ITEMS, MAX_HASHES_PER_MESSAGE,
	MAX_ORDERS_PER_RESPONSE,
};
pub use metadata::{MetadataPatch, OrderMetadata};
pub use order::{
	AdditionalRecipient, AuctionType, ConsiderationItem, ItemType, OfferItem, Order,
	OrderDataError, OrderType,
};
pub use query::{OrderFilter, OrderQuery, OrderSort, Side};
pub use schema::{ConfigSchema, Constraint, Key, Schema, SchemaError};
pub use utils::{current_timestamp, short_hex, with_0x_prefix, without_0x_prefix};
