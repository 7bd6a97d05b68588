//! In-memory store implementation.
//!
//! Keeps every row in maps behind one read-write lock, which also gives
//! the transactional-delete guarantee for free: a single write guard
//! removes the order, its items, and its metadata together.

use crate::{projection, StoreError, StoreFactory, StoreInterface};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use gossip_types::{
	ConfigSchema, Criteria, MetadataPatch, Order, OrderMetadata, OrderQuery, Schema,
	SchemaError,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
	orders: HashMap<B256, Order>,
	metadata: HashMap<B256, OrderMetadata>,
	by_offerer: HashMap<Address, HashSet<B256>>,
	by_collection: HashMap<Address, HashSet<B256>>,
	criteria: HashMap<B256, Criteria>,
}

/// Memory-backed store, primarily for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StoreInterface for MemoryStore {
	async fn upsert_order(
		&self,
		order: Order,
		mut metadata: OrderMetadata,
	) -> Result<(bool, OrderMetadata), StoreError> {
		let hash = gossip_types::order_hash(&order);
		let mut inner = self.inner.write().await;
		let is_new = !inner.orders.contains_key(&hash);
		if let Some(existing) = inner.metadata.get(&hash) {
			metadata.created_at = existing.created_at;
			metadata.is_pinned = metadata.is_pinned || existing.is_pinned;
		}
		if is_new {
			inner.by_offerer.entry(order.offerer).or_default().insert(hash);
			for collection in order.collection_addresses() {
				inner.by_collection.entry(collection).or_default().insert(hash);
			}
			inner.orders.insert(hash, order);
		}
		inner.metadata.insert(hash, metadata.clone());
		Ok((is_new, metadata))
	}

	async fn get_order(&self, hash: B256) -> Result<Option<Order>, StoreError> {
		Ok(self.inner.read().await.orders.get(&hash).cloned())
	}

	async fn get_metadata(&self, hash: B256) -> Result<Option<OrderMetadata>, StoreError> {
		Ok(self.inner.read().await.metadata.get(&hash).cloned())
	}

	async fn find_orders(
		&self,
		collection: Option<Address>,
		query: &OrderQuery,
	) -> Result<Vec<(B256, Order)>, StoreError> {
		let inner = self.inner.read().await;
		let mut rows: Vec<(B256, Order, OrderMetadata)> = candidate_hashes(&inner, collection)
			.filter_map(|hash| {
				let order = inner.orders.get(&hash)?;
				let metadata = inner.metadata.get(&hash)?;
				projection::matches_query(order, metadata, collection, query)
					.then(|| (hash, order.clone(), metadata.clone()))
			})
			.collect();
		projection::sort_orders(&mut rows, query.sort);
		Ok(rows
			.into_iter()
			.skip(query.offset)
			.take(query.limit)
			.map(|(hash, order, _)| (hash, order))
			.collect())
	}

	async fn count_orders(
		&self,
		collection: Option<Address>,
		query: &OrderQuery,
	) -> Result<u64, StoreError> {
		let inner = self.inner.read().await;
		let count = candidate_hashes(&inner, collection)
			.filter(|hash| {
				match (inner.orders.get(hash), inner.metadata.get(hash)) {
					(Some(order), Some(metadata)) => {
						projection::matches_query(order, metadata, collection, query)
					},
					_ => false,
				}
			})
			.count();
		Ok(count as u64)
	}

	async fn total_orders(&self) -> Result<u64, StoreError> {
		Ok(self.inner.read().await.orders.len() as u64)
	}

	async fn count_by_offerer(&self, offerer: Address) -> Result<u64, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner
			.by_offerer
			.get(&offerer)
			.map(|hashes| hashes.len() as u64)
			.unwrap_or(0))
	}

	async fn orders_by_offerer(
		&self,
		offerer: Address,
	) -> Result<Vec<(B256, Order)>, StoreError> {
		let inner = self.inner.read().await;
		let Some(hashes) = inner.by_offerer.get(&offerer) else {
			return Ok(Vec::new());
		};
		Ok(hashes
			.iter()
			.filter_map(|hash| inner.orders.get(hash).map(|order| (*hash, order.clone())))
			.collect())
	}

	async fn update_metadata(
		&self,
		hash: B256,
		patch: &MetadataPatch,
	) -> Result<bool, StoreError> {
		let mut inner = self.inner.write().await;
		let metadata = inner.metadata.get_mut(&hash).ok_or(StoreError::NotFound)?;
		Ok(metadata.apply(patch))
	}

	async fn delete_order(&self, hash: B256) -> Result<bool, StoreError> {
		let mut inner = self.inner.write().await;
		let Some(order) = inner.orders.remove(&hash) else {
			return Ok(false);
		};
		inner.metadata.remove(&hash);
		if let Some(hashes) = inner.by_offerer.get_mut(&order.offerer) {
			hashes.remove(&hash);
		}
		for collection in order.collection_addresses() {
			if let Some(hashes) = inner.by_collection.get_mut(&collection) {
				hashes.remove(&hash);
			}
		}
		Ok(true)
	}

	async fn list_stale_metadata(
		&self,
		threshold_block: u64,
		max: usize,
	) -> Result<Vec<(B256, OrderMetadata)>, StoreError> {
		let inner = self.inner.read().await;
		let mut stale: Vec<(B256, OrderMetadata)> = inner
			.metadata
			.iter()
			.filter(|(_, metadata)| metadata.last_validated_block_number <= threshold_block)
			.map(|(hash, metadata)| (*hash, metadata.clone()))
			.collect();
		stale.sort_by_key(|(_, metadata)| metadata.last_validated_block_number);
		stale.truncate(max);
		Ok(stale)
	}

	async fn upsert_criteria(&self, criteria: Criteria) -> Result<(), StoreError> {
		self.inner
			.write()
			.await
			.criteria
			.insert(criteria.hash, criteria);
		Ok(())
	}

	async fn get_criteria(&self, hash: B256) -> Result<Option<Criteria>, StoreError> {
		Ok(self.inner.read().await.criteria.get(&hash).cloned())
	}

	async fn find_criteria_by_token_id(
		&self,
		token: Address,
		token_id: U256,
	) -> Result<Vec<Criteria>, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner
			.criteria
			.values()
			.filter(|criteria| criteria.token == token && criteria.contains(token_id))
			.cloned()
			.collect())
	}

	async fn close(&self) -> Result<(), StoreError> {
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStoreSchema)
	}
}

fn candidate_hashes<'a>(
	inner: &'a Inner,
	collection: Option<Address>,
) -> Box<dyn Iterator<Item = B256> + 'a> {
	match collection {
		Some(collection) => match inner.by_collection.get(&collection) {
			Some(hashes) => Box::new(hashes.iter().copied()),
			None => Box::new(std::iter::empty()),
		},
		None => Box::new(inner.orders.keys().copied()),
	}
}

/// Configuration schema for the memory store.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		// No recognized configuration.
		Schema::new(vec![]).check(config)
	}
}

/// Factory function to create a memory store from configuration.
pub fn create_store(config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	MemoryStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStore::new()))
}

/// Registry name for this implementation.
pub const NAME: &str = "memory";

pub fn factory() -> StoreFactory {
	create_store
}
