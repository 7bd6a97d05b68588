//! Order lifecycle engine for the Seaport gossip node.
//!
//! The engine is the central arbiter: every candidate order, whether from
//! a local submission, peer gossip, a direct peer query, or the external
//! feed, passes through its admission pipeline, and every chain-observed state
//! transition lands here as a metadata mutation. Admissions are serialized
//! per order hash; outbound gossip events leave on a broadcast bus.

use alloy_primitives::{B256, U256};
use gossip_chain::contract::{ContractEvent, FulfilledItem};
use gossip_chain::{ChainError, ChainService};
use gossip_store::{StoreError, StoreService};
use gossip_types::{
	current_timestamp, short_hex, AuctionType, GossipEvent, MetadataPatch, Order, OrderDataError,
	OrderMetadata,
};
use gossip_validation::{Validation, ValidationService, ValidatorError};
use std::sync::Arc;
use thiserror::Error;

pub mod event_bus;
pub mod listener;
pub mod revalidation;
mod shards;

pub use event_bus::EventBus;
pub use listener::ChainListener;
pub use revalidation::RevalidationTicker;

use shards::ShardLocks;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Structurally malformed input; rejected without escalation.
	#[error("invalid order data: {0}")]
	InvalidOrderData(#[from] OrderDataError),
	/// Global or per-offerer admission cap hit.
	#[error("order limit reached: {0}")]
	OrderLimitReached(&'static str),
	#[error("store error: {0}")]
	Store(#[from] StoreError),
	#[error("chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("validator error: {0}")]
	Validator(#[from] ValidatorError),
}

/// Admission caps.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
	pub max_orders: u64,
	pub max_orders_per_offerer: u64,
}

/// How an order enters the admission pipeline.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionOptions {
	/// Run the rule checker. Trusted feeds skip it.
	pub validate: bool,
	/// Pin the order: exempt from the per-offerer cap, protected from
	/// policy deletion.
	pub pin: bool,
	/// Emit a NEW gossip event on successful first admission. Gossip-
	/// sourced admissions republish the original message instead.
	pub broadcast: bool,
	/// Pre-computed auction class, to skip the zone probe.
	pub auction_type: Option<AuctionType>,
}

impl Default for AdmissionOptions {
	fn default() -> Self {
		Self {
			validate: true,
			pin: false,
			broadcast: true,
			auction_type: None,
		}
	}
}

/// Outcome of one admission.
#[derive(Debug, Clone)]
pub struct AdmissionResult {
	pub hash: B256,
	pub is_new: bool,
	pub is_valid: bool,
	/// Whether the order is in the store after this admission.
	pub persisted: bool,
	pub metadata: Option<OrderMetadata>,
	pub validation: Option<Validation>,
}

/// The order lifecycle arbiter.
pub struct OrderEngine {
	store: Arc<StoreService>,
	chain: Arc<ChainService>,
	validator: Arc<ValidationService>,
	event_bus: EventBus,
	limits: Limits,
	shards: ShardLocks,
}

impl OrderEngine {
	pub fn new(
		store: Arc<StoreService>,
		chain: Arc<ChainService>,
		validator: Arc<ValidationService>,
		event_bus: EventBus,
		limits: Limits,
	) -> Self {
		Self {
			store,
			chain,
			validator,
			event_bus,
			limits,
			shards: ShardLocks::new(),
		}
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn store(&self) -> &Arc<StoreService> {
		&self.store
	}

	pub fn chain(&self) -> &Arc<ChainService> {
		&self.chain
	}

	/// Runs the admission pipeline for one order.
	pub async fn add_order(
		&self,
		order: Order,
		opts: AdmissionOptions,
	) -> Result<AdmissionResult, EngineError> {
		order.check_structure()?;
		let hash = gossip_types::order_hash(&order);
		let _guard = self.shards.lock(&hash).await;

		let already_exists = self.store.get_metadata(hash).await?.is_some();
		if !already_exists {
			if self.store.total_orders().await? >= self.limits.max_orders {
				return Err(EngineError::OrderLimitReached("global"));
			}
			if !opts.pin
				&& self.store.count_by_offerer(order.offerer).await?
					>= self.limits.max_orders_per_offerer
			{
				return Err(EngineError::OrderLimitReached("offerer"));
			}
		}

		let (validation, is_valid) = if opts.validate {
			let validation = self.validator.validate(&order).await?;
			let is_valid = validation.is_valid();
			(Some(validation), is_valid)
		} else {
			(None, true)
		};

		let auction_type = match opts.auction_type {
			Some(auction_type) => auction_type,
			None => self.classify_auction(&order).await?,
		};

		let persist = is_valid || already_exists || opts.pin;
		if !persist {
			tracing::debug!(
				order = %short_hex(&hash),
				errors = ?validation.as_ref().map(|v| v.errors.clone()),
				"rejected order"
			);
			return Ok(AdmissionResult {
				hash,
				is_new: false,
				is_valid,
				persisted: false,
				metadata: None,
				validation,
			});
		}

		let (block_number, block_hash) = if opts.validate || opts.broadcast {
			let number = self.chain.block_number().await?;
			(number, self.chain.block_hash(number).await?)
		} else {
			(0, B256::ZERO)
		};

		let mut metadata = OrderMetadata::new(auction_type, opts.pin, current_timestamp());
		metadata.is_valid = is_valid;
		if opts.validate {
			metadata.last_validated_block_number = block_number;
			metadata.last_validated_block_hash = block_hash;
		}

		let (is_new, stored) = self.store.upsert_order(order.clone(), metadata).await?;
		tracing::debug!(
			order = %short_hex(&hash),
			is_new,
			is_valid,
			auction = ?auction_type,
			"admitted order"
		);

		if is_new && is_valid && opts.broadcast {
			self.event_bus.publish(GossipEvent::New {
				order,
				block_number,
				block_hash,
			});
		}

		Ok(AdmissionResult {
			hash,
			is_new,
			is_valid,
			persisted: true,
			metadata: Some(stored),
			validation,
		})
	}

	/// Admits a batch, logging and continuing past per-order failures.
	pub async fn add_orders(
		&self,
		orders: Vec<Order>,
		opts: AdmissionOptions,
	) -> Vec<Result<AdmissionResult, EngineError>> {
		let mut results = Vec::with_capacity(orders.len());
		for order in orders {
			let result = self.add_order(order, opts).await;
			if let Err(error) = &result {
				tracing::warn!(%error, "order admission failed");
			}
			results.push(result);
		}
		results
	}

	/// Classifies the auction type: restricted orders with an externally
	/// owned zone are English, flat-amount orders are basic, everything
	/// else is Dutch.
	pub async fn classify_auction(&self, order: &Order) -> Result<AuctionType, EngineError> {
		if order.order_type.is_restricted() && self.chain.is_eoa(order.zone).await? {
			return Ok(AuctionType::English);
		}
		if order.has_flat_amounts() {
			Ok(AuctionType::Basic)
		} else {
			Ok(AuctionType::Dutch)
		}
	}

	/// Deletes an order and its rows. With `keep_pinned`, pinned orders
	/// are left untouched.
	pub async fn delete_order(&self, hash: B256, keep_pinned: bool) -> Result<bool, EngineError> {
		if keep_pinned {
			match self.store.get_metadata(hash).await? {
				Some(metadata) if metadata.is_pinned => return Ok(false),
				Some(_) => {},
				None => return Ok(false),
			}
		}
		Ok(self.store.delete_order(hash).await?)
	}

	/// Re-runs local validation for a stored order. Returns `None` when
	/// the order is unknown.
	pub async fn revalidate_order(
		&self,
		order_hash: B256,
	) -> Result<Option<Validation>, EngineError> {
		let Some(order) = self.store.get_order(order_hash).await? else {
			return Ok(None);
		};
		Ok(Some(self.validator.validate(&order).await?))
	}

	/// Records a fulfillment observed on-chain (or relayed by a peer).
	/// Advanced orders consult `getOrderStatus` for the strong
	/// fully-fulfilled condition; basic orders are fully fulfilled by
	/// definition. Returns `false` when the order is unknown.
	pub async fn apply_fulfillment(
		&self,
		order_hash: B256,
		offer: &[FulfilledItem],
		consideration: &[FulfilledItem],
		block_number: u64,
	) -> Result<bool, EngineError> {
		let Some(order) = self.store.get_order(order_hash).await? else {
			return Ok(false);
		};
		let fully_fulfilled = if order.is_advanced() {
			self.chain
				.get_order_status(order_hash)
				.await?
				.is_fully_fulfilled()
		} else {
			true
		};
		let price = ContractEvent::fulfillment_price(offer, consideration);
		let patch = MetadataPatch {
			is_fully_fulfilled: Some(fully_fulfilled),
			last_fulfilled_at: Some(block_number),
			last_fulfilled_price: Some(price),
			..MetadataPatch::default()
		};
		self.patch_metadata(order_hash, &patch).await
	}

	/// Records a fulfillment relayed by a peer. Peer events carry no item
	/// data, so no price is recorded. Returns `false` when the order is
	/// unknown.
	pub async fn apply_remote_fulfillment(
		&self,
		order_hash: B256,
		block_number: u64,
	) -> Result<bool, EngineError> {
		let Some(order) = self.store.get_order(order_hash).await? else {
			return Ok(false);
		};
		let fully_fulfilled = if order.is_advanced() {
			self.chain
				.get_order_status(order_hash)
				.await?
				.is_fully_fulfilled()
		} else {
			true
		};
		let patch = MetadataPatch {
			is_fully_fulfilled: Some(fully_fulfilled),
			last_fulfilled_at: Some(block_number),
			..MetadataPatch::default()
		};
		self.patch_metadata(order_hash, &patch).await
	}

	/// Marks an order invalid after an on-chain cancellation.
	pub async fn apply_cancellation(
		&self,
		order_hash: B256,
		block_number: u64,
		block_hash: B256,
	) -> Result<bool, EngineError> {
		self.patch_metadata(
			order_hash,
			&MetadataPatch::validated(false, block_number, block_hash),
		)
		.await
	}

	/// Handles an on-chain `OrderValidated` by re-running local
	/// validation. Returns the new validity, or `None` for unknown orders.
	pub async fn apply_validated(
		&self,
		order_hash: B256,
		block_number: u64,
		block_hash: B256,
	) -> Result<Option<bool>, EngineError> {
		let Some(validation) = self.revalidate_order(order_hash).await? else {
			return Ok(None);
		};
		let is_valid = validation.is_valid();
		self.patch_metadata(
			order_hash,
			&MetadataPatch::validated(is_valid, block_number, block_hash),
		)
		.await?;
		Ok(Some(is_valid))
	}

	/// Records a validity observation relayed by a peer.
	pub async fn apply_remote_validation(
		&self,
		order_hash: B256,
		is_valid: bool,
		block_number: u64,
		block_hash: B256,
	) -> Result<bool, EngineError> {
		self.patch_metadata(
			order_hash,
			&MetadataPatch::validated(is_valid, block_number, block_hash),
		)
		.await
	}

	/// Invalidates every stored order of an offerer whose counter is below
	/// the new one. Returns how many orders flipped.
	pub async fn apply_counter_increment(
		&self,
		offerer: alloy_primitives::Address,
		new_counter: U256,
		block_number: u64,
		block_hash: B256,
	) -> Result<usize, EngineError> {
		let orders = self.store.orders_by_offerer(offerer).await?;
		let mut flipped = 0;
		for (hash, order) in orders {
			if order.counter >= new_counter {
				continue;
			}
			match self
				.patch_metadata(hash, &MetadataPatch::validated(false, block_number, block_hash))
				.await
			{
				Ok(true) => flipped += 1,
				Ok(false) => {},
				Err(error) => {
					tracing::warn!(order = %short_hex(&hash), %error, "counter invalidation failed");
				},
			}
		}
		tracing::debug!(%offerer, %new_counter, flipped, "applied counter increment");
		Ok(flipped)
	}

	async fn patch_metadata(
		&self,
		hash: B256,
		patch: &MetadataPatch,
	) -> Result<bool, EngineError> {
		match self.store.update_metadata(hash, patch).await {
			Ok(applied) => Ok(applied),
			Err(StoreError::NotFound) => Ok(false),
			Err(error) => Err(error.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes};
	use gossip_chain::implementations::mock::MockChain;
	use gossip_chain::OrderStatus;
	use gossip_store::implementations::memory::MemoryStore;
	use gossip_types::{ConsiderationItem, ItemType, OfferItem, OrderType};
	use gossip_validation::implementations::scripted::ScriptedValidator;
	use gossip_validation::{codes, ValidationOptions};

	fn test_order(offerer: u8, salt: u64) -> Order {
		Order {
			offer: vec![OfferItem {
				item_type: ItemType::Erc721,
				token: Address::repeat_byte(0x11),
				identifier_or_criteria: U256::from(salt),
				start_amount: U256::from(1),
				end_amount: U256::from(1),
			}],
			consideration: vec![ConsiderationItem {
				item_type: ItemType::Native,
				token: Address::ZERO,
				identifier_or_criteria: U256::ZERO,
				start_amount: U256::from(1000),
				end_amount: U256::from(1000),
				recipient: Address::repeat_byte(offerer),
			}],
			offerer: Address::repeat_byte(offerer),
			signature: Bytes::from(vec![7u8; 65]),
			order_type: OrderType::FullOpen,
			start_time: 1,
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

	struct Fixture {
		engine: OrderEngine,
		validator: Arc<ScriptedValidator>,
	}

	fn fixture(limits: Limits) -> Fixture {
		fixture_with_chain(limits, MockChain::with_block(100))
	}

	fn fixture_with_chain(limits: Limits, mock: MockChain) -> Fixture {
		let chain = Arc::new(ChainService::new(Box::new(mock)));
		let validator = Arc::new(ScriptedValidator::new());
		let service = ValidationService::new(
			Box::new(validator.clone()),
			ValidationOptions::default(),
		);
		let engine = OrderEngine::new(
			Arc::new(StoreService::new(Box::new(MemoryStore::new()))),
			chain,
			Arc::new(service),
			EventBus::new(64),
			limits,
		);
		Fixture { engine, validator }
	}

	fn default_limits() -> Limits {
		Limits {
			max_orders: 100_000,
			max_orders_per_offerer: 100,
		}
	}

	#[tokio::test]
	async fn readmission_is_not_new() {
		let fixture = fixture(default_limits());
		let order = test_order(0x22, 1);
		let first = fixture
			.engine
			.add_order(order.clone(), AdmissionOptions::default())
			.await
			.unwrap();
		assert!(first.is_new);
		let second = fixture
			.engine
			.add_order(order, AdmissionOptions::default())
			.await
			.unwrap();
		assert!(!second.is_new);
		assert!(second.metadata.is_some());
	}

	#[tokio::test]
	async fn global_limit_rejects_overflow() {
		let fixture = fixture(Limits {
			max_orders: 2,
			max_orders_per_offerer: 100,
		});
		for salt in 0..2 {
			fixture
				.engine
				.add_order(test_order(0x22, salt), AdmissionOptions::default())
				.await
				.unwrap();
		}
		// Pinned orders still count toward the global cap.
		let overflow = fixture
			.engine
			.add_order(
				test_order(0x23, 99),
				AdmissionOptions {
					pin: true,
					..AdmissionOptions::default()
				},
			)
			.await;
		assert!(matches!(
			overflow,
			Err(EngineError::OrderLimitReached("global"))
		));
	}

	#[tokio::test]
	async fn offerer_limit_exempts_pinned() {
		let fixture = fixture(Limits {
			max_orders: 100,
			max_orders_per_offerer: 1,
		});
		fixture
			.engine
			.add_order(test_order(0x22, 1), AdmissionOptions::default())
			.await
			.unwrap();
		let overflow = fixture
			.engine
			.add_order(test_order(0x22, 2), AdmissionOptions::default())
			.await;
		assert!(matches!(
			overflow,
			Err(EngineError::OrderLimitReached("offerer"))
		));
		// A pinned order from the same offerer passes.
		let pinned = fixture
			.engine
			.add_order(
				test_order(0x22, 3),
				AdmissionOptions {
					pin: true,
					..AdmissionOptions::default()
				},
			)
			.await
			.unwrap();
		assert!(pinned.is_new);
	}

	#[tokio::test]
	async fn invalid_order_is_not_persisted() {
		let fixture = fixture(default_limits());
		let order = test_order(0x22, 1);
		let hash = gossip_types::order_hash(&order);
		fixture.validator.set_result(
			hash,
			Validation::with_errors(vec![codes::SIGNATURE_INVALID]),
		);
		let result = fixture
			.engine
			.add_order(order, AdmissionOptions::default())
			.await
			.unwrap();
		assert!(!result.is_valid);
		assert!(!result.persisted);
		assert!(fixture.engine.store().get_order(hash).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn restricted_order_with_eoa_zone_is_english() {
		let fixture = fixture(default_limits());
		let mut order = test_order(0x22, 1);
		order.order_type = OrderType::FullRestricted;
		order.zone = Address::repeat_byte(0x99);
		let auction = fixture.engine.classify_auction(&order).await.unwrap();
		assert_eq!(auction, AuctionType::English);
	}

	#[tokio::test]
	async fn restricted_order_with_contract_zone_is_not_english() {
		let mock = MockChain::with_block(100);
		mock.set_code(Address::repeat_byte(0x99), vec![0x60, 0x80]);
		let fixture = fixture_with_chain(default_limits(), mock);
		let mut order = test_order(0x22, 1);
		order.order_type = OrderType::FullRestricted;
		order.zone = Address::repeat_byte(0x99);
		assert_eq!(
			fixture.engine.classify_auction(&order).await.unwrap(),
			AuctionType::Basic
		);
		order.consideration[0].end_amount = U256::from(1);
		assert_eq!(
			fixture.engine.classify_auction(&order).await.unwrap(),
			AuctionType::Dutch
		);
	}

	#[tokio::test]
	async fn new_valid_admission_broadcasts() {
		let fixture = fixture(default_limits());
		let mut events = fixture.engine.event_bus().subscribe();
		let order = test_order(0x22, 1);
		fixture
			.engine
			.add_order(order.clone(), AdmissionOptions::default())
			.await
			.unwrap();
		let event = events.try_recv().unwrap();
		assert_eq!(event.kind(), gossip_types::EventKind::New);
		assert_eq!(event.order(), Some(&order));
	}

	#[tokio::test]
	async fn counter_increment_invalidates_prior_orders() {
		let fixture = fixture(default_limits());
		let order = test_order(0x22, 1);
		let hash = gossip_types::order_hash(&order);
		fixture
			.engine
			.add_order(order, AdmissionOptions::default())
			.await
			.unwrap();

		let flipped = fixture
			.engine
			.apply_counter_increment(
				Address::repeat_byte(0x22),
				U256::from(1),
				101,
				B256::repeat_byte(0xaa),
			)
			.await
			.unwrap();
		assert_eq!(flipped, 1);
		let metadata = fixture
			.engine
			.store()
			.get_metadata(hash)
			.await
			.unwrap()
			.unwrap();
		assert!(!metadata.is_valid);
	}

	#[tokio::test]
	async fn fulfillment_records_price_and_flag() {
		let fixture = fixture(default_limits());
		let order = test_order(0x22, 1);
		let hash = gossip_types::order_hash(&order);
		fixture
			.engine
			.add_order(order, AdmissionOptions::default())
			.await
			.unwrap();

		let offer = vec![FulfilledItem {
			item_type: 0,
			token: Address::ZERO,
			identifier: U256::ZERO,
			amount: U256::from(1_000_000_000_000_000u64),
		}];
		let applied = fixture
			.engine
			.apply_fulfillment(hash, &offer, &[], 120)
			.await
			.unwrap();
		assert!(applied);

		let metadata = fixture
			.engine
			.store()
			.get_metadata(hash)
			.await
			.unwrap()
			.unwrap();
		assert!(metadata.is_fully_fulfilled);
		assert_eq!(metadata.last_fulfilled_at, Some(120));
		assert_eq!(
			metadata.last_fulfilled_price,
			Some(U256::from(1_000_000_000_000_000u64))
		);
	}

	#[tokio::test]
	async fn advanced_fulfillment_consults_order_status() {
		let mock = MockChain::with_block(100);
		let mut order = test_order(0x22, 1);
		order.numerator = Some(U256::from(1));
		order.denominator = Some(U256::from(2));
		let hash = gossip_types::order_hash(&order);
		// Half filled: not fully fulfilled.
		mock.set_order_status(
			hash,
			OrderStatus {
				total_filled: U256::from(1),
				total_size: U256::from(2),
				..OrderStatus::default()
			},
		);
		let fixture = fixture_with_chain(default_limits(), mock);
		fixture
			.engine
			.add_order(order, AdmissionOptions::default())
			.await
			.unwrap();

		fixture
			.engine
			.apply_fulfillment(hash, &[], &[], 120)
			.await
			.unwrap();
		let metadata = fixture
			.engine
			.store()
			.get_metadata(hash)
			.await
			.unwrap()
			.unwrap();
		assert!(!metadata.is_fully_fulfilled);
	}

	#[tokio::test]
	async fn fulfillment_of_unknown_order_is_dropped() {
		let fixture = fixture(default_limits());
		let applied = fixture
			.engine
			.apply_fulfillment(B256::repeat_byte(0x01), &[], &[], 120)
			.await
			.unwrap();
		assert!(!applied);
	}

	#[tokio::test]
	async fn delete_respects_pin() {
		let fixture = fixture(default_limits());
		let order = test_order(0x22, 1);
		let hash = gossip_types::order_hash(&order);
		fixture
			.engine
			.add_order(
				order,
				AdmissionOptions {
					pin: true,
					..AdmissionOptions::default()
				},
			)
			.await
			.unwrap();

		assert!(!fixture.engine.delete_order(hash, true).await.unwrap());
		assert!(fixture.engine.store().get_order(hash).await.unwrap().is_some());
		assert!(fixture.engine.delete_order(hash, false).await.unwrap());
		assert!(fixture.engine.store().get_order(hash).await.unwrap().is_none());
	}
}
