//! File-backed store implementation.
//!
//! Each order lives in one JSON envelope (order plus metadata) under the
//! datadir, written atomically via a temp file and rename, so the
//! transactional-delete guarantee reduces to removing one file. A
//! process-wide `fs2` lock on the datadir prevents two nodes from sharing
//! it. A small index (offerer, collections, validation height per hash) is
//! rebuilt from disk at open and kept in memory.

use crate::{projection, StoreError, StoreFactory, StoreInterface};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use fs2::FileExt;
use gossip_types::{
	ConfigSchema, Constraint, Criteria, Key, MetadataPatch, Order, OrderMetadata, OrderQuery,
	Schema, SchemaError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// One order row on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
	order: Order,
	metadata: OrderMetadata,
}

#[derive(Debug, Clone)]
struct IndexEntry {
	offerer: Address,
	collections: Vec<Address>,
	last_validated: u64,
}

/// Store persisting orders and criteria as JSON files under a datadir.
pub struct FileStore {
	orders_dir: PathBuf,
	criteria_dir: PathBuf,
	index: RwLock<HashMap<B256, IndexEntry>>,
	// Held for the store's lifetime; releases on drop.
	_lock: std::fs::File,
}

impl FileStore {
	/// Opens (or initializes) a datadir and rebuilds the index from disk.
	pub fn open(root: &Path) -> Result<Self, StoreError> {
		let orders_dir = root.join("orders");
		let criteria_dir = root.join("criteria");
		std::fs::create_dir_all(&orders_dir)
			.and_then(|_| std::fs::create_dir_all(&criteria_dir))
			.map_err(|e| StoreError::Backend(format!("failed to create datadir: {}", e)))?;

		let lock_file = std::fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(root.join("datadir.lock"))
			.map_err(|e| StoreError::Backend(format!("failed to open lock file: {}", e)))?;
		lock_file
			.try_lock_exclusive()
			.map_err(|_| StoreError::Configuration("datadir is already in use".into()))?;

		let mut index = HashMap::new();
		let entries = std::fs::read_dir(&orders_dir)
			.map_err(|e| StoreError::Backend(e.to_string()))?;
		for entry in entries.flatten() {
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("json")) {
				continue;
			}
			let data = match std::fs::read(&path) {
				Ok(data) => data,
				Err(e) => {
					tracing::warn!(path = %path.display(), "skipping unreadable order file: {}", e);
					continue;
				},
			};
			match serde_json::from_slice::<Envelope>(&data) {
				Ok(envelope) => {
					let hash = gossip_types::order_hash(&envelope.order);
					index.insert(hash, index_entry(&envelope));
				},
				Err(e) => {
					tracing::warn!(path = %path.display(), "skipping corrupt order file: {}", e);
				},
			}
		}
		tracing::debug!(orders = index.len(), root = %root.display(), "opened file store");

		Ok(Self {
			orders_dir,
			criteria_dir,
			index: RwLock::new(index),
			_lock: lock_file,
		})
	}

	fn order_path(&self, hash: B256) -> PathBuf {
		self.orders_dir.join(format!("{}.json", hex::encode(hash)))
	}

	fn criteria_path(&self, hash: B256) -> PathBuf {
		self.criteria_dir.join(format!("{}.json", hex::encode(hash)))
	}

	async fn read_envelope(&self, hash: B256) -> Result<Option<Envelope>, StoreError> {
		match fs::read(self.order_path(hash)).await {
			Ok(data) => serde_json::from_slice(&data)
				.map(Some)
				.map_err(|e| StoreError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StoreError::Backend(e.to_string())),
		}
	}

	async fn write_envelope(&self, hash: B256, envelope: &Envelope) -> Result<(), StoreError> {
		let path = self.order_path(hash);
		let data = serde_json::to_vec(envelope)
			.map_err(|e| StoreError::Serialization(e.to_string()))?;
		write_atomic(&path, &data).await
	}
}

fn index_entry(envelope: &Envelope) -> IndexEntry {
	IndexEntry {
		offerer: envelope.order.offerer,
		collections: envelope.order.collection_addresses(),
		last_validated: envelope.metadata.last_validated_block_number,
	}
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
	let temp = path.with_extension("tmp");
	fs::write(&temp, data)
		.await
		.map_err(|e| StoreError::Backend(e.to_string()))?;
	fs::rename(&temp, path)
		.await
		.map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl StoreInterface for FileStore {
	async fn upsert_order(
		&self,
		order: Order,
		mut metadata: OrderMetadata,
	) -> Result<(bool, OrderMetadata), StoreError> {
		let hash = gossip_types::order_hash(&order);
		let mut index = self.index.write().await;
		let existing = self.read_envelope(hash).await?;
		let is_new = existing.is_none();
		if let Some(existing) = existing {
			metadata.created_at = existing.metadata.created_at;
			metadata.is_pinned = metadata.is_pinned || existing.metadata.is_pinned;
		}
		let envelope = Envelope {
			order,
			metadata: metadata.clone(),
		};
		self.write_envelope(hash, &envelope).await?;
		index.insert(hash, index_entry(&envelope));
		Ok((is_new, metadata))
	}

	async fn get_order(&self, hash: B256) -> Result<Option<Order>, StoreError> {
		Ok(self.read_envelope(hash).await?.map(|envelope| envelope.order))
	}

	async fn get_metadata(&self, hash: B256) -> Result<Option<OrderMetadata>, StoreError> {
		Ok(self
			.read_envelope(hash)
			.await?
			.map(|envelope| envelope.metadata))
	}

	async fn find_orders(
		&self,
		collection: Option<Address>,
		query: &OrderQuery,
	) -> Result<Vec<(B256, Order)>, StoreError> {
		let candidates = {
			let index = self.index.read().await;
			candidate_hashes(&index, collection)
		};
		let mut rows = Vec::new();
		for hash in candidates {
			if let Some(envelope) = self.read_envelope(hash).await? {
				if projection::matches_query(&envelope.order, &envelope.metadata, collection, query)
				{
					rows.push((hash, envelope.order, envelope.metadata));
				}
			}
		}
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
		let candidates = {
			let index = self.index.read().await;
			candidate_hashes(&index, collection)
		};
		let mut count = 0u64;
		for hash in candidates {
			if let Some(envelope) = self.read_envelope(hash).await? {
				if projection::matches_query(&envelope.order, &envelope.metadata, collection, query)
				{
					count += 1;
				}
			}
		}
		Ok(count)
	}

	async fn total_orders(&self) -> Result<u64, StoreError> {
		Ok(self.index.read().await.len() as u64)
	}

	async fn count_by_offerer(&self, offerer: Address) -> Result<u64, StoreError> {
		let index = self.index.read().await;
		Ok(index
			.values()
			.filter(|entry| entry.offerer == offerer)
			.count() as u64)
	}

	async fn orders_by_offerer(
		&self,
		offerer: Address,
	) -> Result<Vec<(B256, Order)>, StoreError> {
		let hashes: Vec<B256> = {
			let index = self.index.read().await;
			index
				.iter()
				.filter(|(_, entry)| entry.offerer == offerer)
				.map(|(hash, _)| *hash)
				.collect()
		};
		let mut orders = Vec::with_capacity(hashes.len());
		for hash in hashes {
			if let Some(envelope) = self.read_envelope(hash).await? {
				orders.push((hash, envelope.order));
			}
		}
		Ok(orders)
	}

	async fn update_metadata(
		&self,
		hash: B256,
		patch: &MetadataPatch,
	) -> Result<bool, StoreError> {
		let mut index = self.index.write().await;
		let mut envelope = self.read_envelope(hash).await?.ok_or(StoreError::NotFound)?;
		if !envelope.metadata.apply(patch) {
			return Ok(false);
		}
		self.write_envelope(hash, &envelope).await?;
		index.insert(hash, index_entry(&envelope));
		Ok(true)
	}

	async fn delete_order(&self, hash: B256) -> Result<bool, StoreError> {
		let mut index = self.index.write().await;
		match fs::remove_file(self.order_path(hash)).await {
			Ok(()) => {
				index.remove(&hash);
				Ok(true)
			},
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(StoreError::Backend(e.to_string())),
		}
	}

	async fn list_stale_metadata(
		&self,
		threshold_block: u64,
		max: usize,
	) -> Result<Vec<(B256, OrderMetadata)>, StoreError> {
		let mut stale: Vec<(B256, u64)> = {
			let index = self.index.read().await;
			index
				.iter()
				.filter(|(_, entry)| entry.last_validated <= threshold_block)
				.map(|(hash, entry)| (*hash, entry.last_validated))
				.collect()
		};
		stale.sort_by_key(|(_, last_validated)| *last_validated);
		stale.truncate(max);

		let mut rows = Vec::with_capacity(stale.len());
		for (hash, _) in stale {
			if let Some(envelope) = self.read_envelope(hash).await? {
				rows.push((hash, envelope.metadata));
			}
		}
		Ok(rows)
	}

	async fn upsert_criteria(&self, criteria: Criteria) -> Result<(), StoreError> {
		let data = serde_json::to_vec(&criteria)
			.map_err(|e| StoreError::Serialization(e.to_string()))?;
		write_atomic(&self.criteria_path(criteria.hash), &data).await
	}

	async fn get_criteria(&self, hash: B256) -> Result<Option<Criteria>, StoreError> {
		match fs::read(self.criteria_path(hash)).await {
			Ok(data) => serde_json::from_slice(&data)
				.map(Some)
				.map_err(|e| StoreError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StoreError::Backend(e.to_string())),
		}
	}

	async fn find_criteria_by_token_id(
		&self,
		token: Address,
		token_id: U256,
	) -> Result<Vec<Criteria>, StoreError> {
		let mut found = Vec::new();
		let mut entries = fs::read_dir(&self.criteria_dir)
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?;
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?
		{
			let Ok(data) = fs::read(entry.path()).await else {
				continue;
			};
			if let Ok(criteria) = serde_json::from_slice::<Criteria>(&data) {
				if criteria.token == token && criteria.contains(token_id) {
					found.push(criteria);
				}
			}
		}
		Ok(found)
	}

	async fn close(&self) -> Result<(), StoreError> {
		// Writes are already durable; the datadir lock releases on drop.
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStoreSchema)
	}
}

fn candidate_hashes(
	index: &HashMap<B256, IndexEntry>,
	collection: Option<Address>,
) -> Vec<B256> {
	match collection {
		Some(collection) => index
			.iter()
			.filter(|(_, entry)| entry.collections.contains(&collection))
			.map(|(hash, _)| *hash)
			.collect(),
		None => index.keys().copied().collect(),
	}
}

/// Configuration schema for the file store.
pub struct FileStoreSchema;

impl ConfigSchema for FileStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		Schema::new(vec![Key::optional("datadir", Constraint::Text)]).check(config)
	}
}

/// Factory function to create a file store from configuration.
///
/// Configuration parameters:
/// - `datadir`: base directory (default: "./datadir")
pub fn create_store(config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	FileStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;
	let datadir = config
		.get("datadir")
		.and_then(|value| value.as_str())
		.unwrap_or("./datadir");
	Ok(Box::new(FileStore::open(Path::new(datadir))?))
}

/// Registry name for this implementation.
pub const NAME: &str = "file";

pub fn factory() -> StoreFactory {
	create_store
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Bytes;
	use gossip_types::{AuctionType, ConsiderationItem, ItemType, OfferItem, OrderType};

	fn order(salt: u64) -> Order {
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
				start_amount: U256::from(100),
				end_amount: U256::from(100),
				recipient: Address::repeat_byte(0x22),
			}],
			offerer: Address::repeat_byte(0x22),
			signature: Bytes::from(vec![0u8; 65]),
			order_type: OrderType::FullOpen,
			start_time: 0,
			end_time: u64::MAX,
			counter: U256::ZERO,
			salt: U256::from(salt),
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

	#[tokio::test]
	async fn orders_survive_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let order = order(1);
		let hash = gossip_types::order_hash(&order);
		{
			let store = FileStore::open(dir.path()).unwrap();
			store
				.upsert_order(order.clone(), OrderMetadata::new(AuctionType::Basic, false, 1))
				.await
				.unwrap();
		}
		let store = FileStore::open(dir.path()).unwrap();
		assert_eq!(store.get_order(hash).await.unwrap(), Some(order));
		assert_eq!(store.total_orders().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn delete_removes_row_and_index() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		let order = order(2);
		let hash = gossip_types::order_hash(&order);
		store
			.upsert_order(order, OrderMetadata::new(AuctionType::Basic, false, 1))
			.await
			.unwrap();
		assert!(store.delete_order(hash).await.unwrap());
		assert!(store.get_order(hash).await.unwrap().is_none());
		assert_eq!(store.total_orders().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn second_open_of_same_datadir_fails() {
		let dir = tempfile::tempdir().unwrap();
		let _store = FileStore::open(dir.path()).unwrap();
		assert!(matches!(
			FileStore::open(dir.path()),
			Err(StoreError::Configuration(_))
		));
	}

	#[tokio::test]
	async fn criteria_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		let criteria = Criteria::new(Address::repeat_byte(0x11), vec![U256::from(4)]);
		let hash = criteria.hash;
		store.upsert_criteria(criteria.clone()).await.unwrap();
		assert_eq!(store.get_criteria(hash).await.unwrap(), Some(criteria));
	}
}
