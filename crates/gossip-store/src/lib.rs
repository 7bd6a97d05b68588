//! Order store for the Seaport gossip node.
//!
//! This module provides the typed persistence seam for orders, their
//! metadata, and criteria sets, with in-memory and file-backed
//! implementations. All multi-row mutations are atomic: observers never
//! see an order without its metadata or a partially deleted order.

use async_trait::async_trait;
use alloy_primitives::{Address, B256, U256};
use gossip_types::{
	ConfigSchema, Criteria, MetadataPatch, Order, OrderMetadata, OrderQuery,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

mod projection;

pub use projection::{matches_query, sort_orders};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// A lookup that must succeed returned nothing.
	#[error("order not found")]
	NotFound,
	#[error("serialization error: {0}")]
	Serialization(String),
	#[error("backend error: {0}")]
	Backend(String),
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// The typed persistence interface.
///
/// Orders are immutable once stored; metadata is the mutable half and is
/// patched through [`StoreInterface::update_metadata`], which enforces the
/// validated-block monotonicity rule. Deletion removes the order, its
/// items, and its metadata together.
#[async_trait]
pub trait StoreInterface: Send + Sync {
	/// Inserts an order with its metadata, or refreshes the metadata of an
	/// existing order. Returns whether the order was new along with the
	/// stored metadata.
	///
	/// On re-insert the original `created_at` is preserved and a pin is
	/// never silently dropped.
	async fn upsert_order(
		&self,
		order: Order,
		metadata: OrderMetadata,
	) -> Result<(bool, OrderMetadata), StoreError>;

	/// Fetches an order with all its items.
	async fn get_order(&self, hash: B256) -> Result<Option<Order>, StoreError>;

	async fn get_metadata(&self, hash: B256) -> Result<Option<OrderMetadata>, StoreError>;

	/// Collection-scoped listing. `collection = None` matches all orders.
	async fn find_orders(
		&self,
		collection: Option<Address>,
		query: &OrderQuery,
	) -> Result<Vec<(B256, Order)>, StoreError>;

	/// Count of orders matching the query, ignoring pagination.
	async fn count_orders(
		&self,
		collection: Option<Address>,
		query: &OrderQuery,
	) -> Result<u64, StoreError>;

	async fn total_orders(&self) -> Result<u64, StoreError>;

	async fn count_by_offerer(&self, offerer: Address) -> Result<u64, StoreError>;

	/// All orders placed by an offerer, in no particular order.
	async fn orders_by_offerer(
		&self,
		offerer: Address,
	) -> Result<Vec<(B256, Order)>, StoreError>;

	/// Applies a metadata patch. Returns `false` when the patch was dropped
	/// by the block-number monotonicity rule.
	async fn update_metadata(
		&self,
		hash: B256,
		patch: &MetadataPatch,
	) -> Result<bool, StoreError>;

	/// Deletes the order, its offer and consideration items, and its
	/// metadata in one transaction. Returns whether anything was removed.
	async fn delete_order(&self, hash: B256) -> Result<bool, StoreError>;

	/// Metadata rows whose `last_validated_block_number` is at or below the
	/// threshold, ascending, truncated to `max`.
	async fn list_stale_metadata(
		&self,
		threshold_block: u64,
		max: usize,
	) -> Result<Vec<(B256, OrderMetadata)>, StoreError>;

	async fn upsert_criteria(&self, criteria: Criteria) -> Result<(), StoreError>;

	async fn get_criteria(&self, hash: B256) -> Result<Option<Criteria>, StoreError>;

	async fn find_criteria_by_token_id(
		&self,
		token: Address,
		token_id: U256,
	) -> Result<Vec<Criteria>, StoreError>;

	/// Flushes and releases the backend. Idempotent.
	async fn close(&self) -> Result<(), StoreError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for store factory functions.
pub type StoreFactory = fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>;

/// High-level store wrapper with lookup conveniences.
pub struct StoreService {
	backend: Box<dyn StoreInterface>,
}

impl StoreService {
	pub fn new(backend: Box<dyn StoreInterface>) -> Self {
		Self { backend }
	}

	pub fn backend(&self) -> &dyn StoreInterface {
		self.backend.as_ref()
	}

	/// Fetches an order, mapping absence to [`StoreError::NotFound`].
	pub async fn require_order(&self, hash: B256) -> Result<Order, StoreError> {
		self.backend
			.get_order(hash)
			.await?
			.ok_or(StoreError::NotFound)
	}

	pub async fn require_metadata(&self, hash: B256) -> Result<OrderMetadata, StoreError> {
		self.backend
			.get_metadata(hash)
			.await?
			.ok_or(StoreError::NotFound)
	}

	/// Known orders among `hashes`, preserving request order and silently
	/// omitting misses.
	pub async fn orders_by_hashes(
		&self,
		hashes: &[B256],
		max: usize,
	) -> Result<Vec<Order>, StoreError> {
		let mut orders = Vec::new();
		for hash in hashes {
			if orders.len() >= max {
				break;
			}
			if let Some(order) = self.backend.get_order(*hash).await? {
				orders.push(order);
			}
		}
		Ok(orders)
	}
}

impl std::ops::Deref for StoreService {
	type Target = dyn StoreInterface;

	fn deref(&self) -> &Self::Target {
		self.backend.as_ref()
	}
}
