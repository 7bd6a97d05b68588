//! External order ingestion for the Seaport gossip node.
//!
//! An optional feed of orders from an external marketplace API. Foreign
//! JSON (camelCase fields, decimal-string amounts) is normalized into the
//! canonical order model and admitted with validation skipped: the feed is
//! trusted, and the revalidation loop re-checks everything it delivers.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use gossip_engine::{AdmissionOptions, OrderEngine};
use gossip_types::{
	AdditionalRecipient, AuctionType, ConsiderationItem, ItemType, OfferItem, Order, OrderType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

pub mod rate_limit;

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

pub use rate_limit::RateLimiter;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
	#[error("fetch error: {0}")]
	Fetch(String),
	#[error("malformed order field {field}: {value}")]
	Malformed { field: &'static str, value: String },
	#[error("feed closed")]
	Closed,
}

/// An order as the external API serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignOrder {
	pub offerer: String,
	pub zone: String,
	pub offer: Vec<ForeignItem>,
	pub consideration: Vec<ForeignItem>,
	pub order_type: u8,
	pub start_time: String,
	pub end_time: String,
	pub zone_hash: String,
	pub salt: String,
	pub conduit_key: String,
	pub counter: String,
	pub signature: String,
	#[serde(default)]
	pub chain_id: Option<u64>,
	#[serde(default)]
	pub additional_recipients: Vec<ForeignRecipient>,
}

/// One side item in the external API's serialization. Consideration items
/// carry a recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignItem {
	pub item_type: u8,
	pub token: String,
	pub identifier_or_criteria: String,
	pub start_amount: String,
	pub end_amount: String,
	#[serde(default)]
	pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignRecipient {
	pub amount: String,
	pub recipient: String,
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, IngestError> {
	value.parse().map_err(|_| IngestError::Malformed {
		field,
		value: value.to_string(),
	})
}

fn parse_b256(field: &'static str, value: &str) -> Result<B256, IngestError> {
	value.parse().map_err(|_| IngestError::Malformed {
		field,
		value: value.to_string(),
	})
}

fn parse_u256(field: &'static str, value: &str) -> Result<U256, IngestError> {
	value.parse().map_err(|_| IngestError::Malformed {
		field,
		value: value.to_string(),
	})
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, IngestError> {
	value.parse().map_err(|_| IngestError::Malformed {
		field,
		value: value.to_string(),
	})
}

fn parse_item_type(value: u8) -> Result<ItemType, IngestError> {
	ItemType::from_u8(value).ok_or(IngestError::Malformed {
		field: "itemType",
		value: value.to_string(),
	})
}

impl ForeignOrder {
	/// Converts into the canonical order model.
	pub fn normalize(&self) -> Result<Order, IngestError> {
		let mut offer = Vec::with_capacity(self.offer.len());
		for item in &self.offer {
			offer.push(OfferItem {
				item_type: parse_item_type(item.item_type)?,
				token: parse_address("offer.token", &item.token)?,
				identifier_or_criteria: parse_u256(
					"offer.identifierOrCriteria",
					&item.identifier_or_criteria,
				)?,
				start_amount: parse_u256("offer.startAmount", &item.start_amount)?,
				end_amount: parse_u256("offer.endAmount", &item.end_amount)?,
			});
		}
		let mut consideration = Vec::with_capacity(self.consideration.len());
		for item in &self.consideration {
			let recipient = item.recipient.as_deref().ok_or(IngestError::Malformed {
				field: "consideration.recipient",
				value: "missing".to_string(),
			})?;
			consideration.push(ConsiderationItem {
				item_type: parse_item_type(item.item_type)?,
				token: parse_address("consideration.token", &item.token)?,
				identifier_or_criteria: parse_u256(
					"consideration.identifierOrCriteria",
					&item.identifier_or_criteria,
				)?,
				start_amount: parse_u256("consideration.startAmount", &item.start_amount)?,
				end_amount: parse_u256("consideration.endAmount", &item.end_amount)?,
				recipient: parse_address("consideration.recipient", recipient)?,
			});
		}

		let signature_hex = self.signature.trim_start_matches("0x");
		let signature = hex::decode(signature_hex).map_err(|_| IngestError::Malformed {
			field: "signature",
			value: self.signature.clone(),
		})?;

		let mut additional_recipients = Vec::with_capacity(self.additional_recipients.len());
		for recipient in &self.additional_recipients {
			additional_recipients.push(AdditionalRecipient {
				amount: parse_u256("additionalRecipients.amount", &recipient.amount)?,
				recipient: parse_address(
					"additionalRecipients.recipient",
					&recipient.recipient,
				)?,
			});
		}

		Ok(Order {
			offer,
			consideration,
			offerer: parse_address("offerer", &self.offerer)?,
			signature: Bytes::from(signature),
			order_type: OrderType::from_u8(self.order_type).ok_or(IngestError::Malformed {
				field: "orderType",
				value: self.order_type.to_string(),
			})?,
			start_time: parse_u64("startTime", &self.start_time)?,
			end_time: parse_u64("endTime", &self.end_time)?,
			counter: parse_u256("counter", &self.counter)?,
			salt: parse_u256("salt", &self.salt)?,
			conduit_key: parse_b256("conduitKey", &self.conduit_key)?,
			zone: parse_address("zone", &self.zone)?,
			zone_hash: parse_b256("zoneHash", &self.zone_hash)?,
			chain_id: self.chain_id.unwrap_or(1),
			numerator: None,
			denominator: None,
			extra_data: None,
			additional_recipients: (!additional_recipients.is_empty())
				.then_some(additional_recipients),
		})
	}
}

/// The external feed seam.
#[async_trait]
pub trait OrderFeed: Send + Sync {
	/// Next batch of foreign orders; `None` when the feed is exhausted.
	async fn next_orders(&mut self) -> Result<Option<Vec<ForeignOrder>>, IngestError>;
}

/// The ingestion task: drains the feed into the engine.
pub struct Ingestor {
	engine: Arc<OrderEngine>,
	feed: Box<dyn OrderFeed>,
}

impl Ingestor {
	pub fn new(engine: Arc<OrderEngine>, feed: Box<dyn OrderFeed>) -> Self {
		Self { engine, feed }
	}

	/// Runs until the feed closes or the stop signal fires.
	pub async fn run(mut self, mut stop: broadcast::Receiver<()>) {
		loop {
			tokio::select! {
				batch = self.feed.next_orders() => {
					match batch {
						Ok(Some(orders)) => self.ingest_batch(orders).await,
						Ok(None) => {
							tracing::info!("external feed closed");
							break;
						},
						Err(error) => {
							// The stream re-delivers; skip and move on.
							tracing::warn!(%error, "feed fetch failed");
						},
					}
				}
				_ = stop.recv() => {
					tracing::debug!("stopping ingestor");
					break;
				}
			}
		}
	}

	async fn ingest_batch(&self, orders: Vec<ForeignOrder>) {
		for foreign in orders {
			let order = match foreign.normalize() {
				Ok(order) => order,
				Err(error) => {
					tracing::warn!(%error, "skipping malformed external order");
					continue;
				},
			};
			// The feed is trusted: skip the rule checker and classify
			// without the zone probe. The revalidation loop catches up.
			let auction_type = if order.has_flat_amounts() {
				AuctionType::Basic
			} else {
				AuctionType::Dutch
			};
			let opts = AdmissionOptions {
				validate: false,
				pin: false,
				broadcast: true,
				auction_type: Some(auction_type),
			};
			if let Err(error) = self.engine.add_order(order, opts).await {
				tracing::warn!(%error, "external order admission failed");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn foreign_order() -> ForeignOrder {
		ForeignOrder {
			offerer: "0x2222222222222222222222222222222222222222".into(),
			zone: "0x0000000000000000000000000000000000000000".into(),
			offer: vec![ForeignItem {
				item_type: 2,
				token: "0x1111111111111111111111111111111111111111".into(),
				identifier_or_criteria: "1".into(),
				start_amount: "1".into(),
				end_amount: "1".into(),
				recipient: None,
			}],
			consideration: vec![ForeignItem {
				item_type: 0,
				token: "0x0000000000000000000000000000000000000000".into(),
				identifier_or_criteria: "0".into(),
				start_amount: "1000000000000000".into(),
				end_amount: "1000000000000000".into(),
				recipient: Some("0x2222222222222222222222222222222222222222".into()),
			}],
			order_type: 0,
			start_time: "1700000000".into(),
			end_time: "1700086400".into(),
			zone_hash: "0x0000000000000000000000000000000000000000000000000000000000000000"
				.into(),
			salt: "123456789".into(),
			conduit_key: "0x0000000000000000000000000000000000000000000000000000000000000000"
				.into(),
			counter: "0".into(),
			signature: format!("0x{}", "ab".repeat(65)),
			chain_id: None,
			additional_recipients: Vec::new(),
		}
	}

	#[test]
	fn normalization_parses_decimal_strings() {
		let order = foreign_order().normalize().unwrap();
		assert_eq!(order.offer[0].item_type, ItemType::Erc721);
		assert_eq!(
			order.consideration[0].start_amount,
			U256::from(1_000_000_000_000_000u64)
		);
		assert_eq!(order.start_time, 1_700_000_000);
		assert_eq!(order.chain_id, 1);
		assert_eq!(order.signature.len(), 65);
		assert!(order.check_structure().is_ok());
	}

	#[test]
	fn normalization_rejects_bad_address() {
		let mut foreign = foreign_order();
		foreign.offerer = "not-an-address".into();
		assert!(matches!(
			foreign.normalize(),
			Err(IngestError::Malformed { field: "offerer", .. })
		));
	}

	#[test]
	fn normalization_rejects_unknown_item_type() {
		let mut foreign = foreign_order();
		foreign.offer[0].item_type = 9;
		assert!(matches!(
			foreign.normalize(),
			Err(IngestError::Malformed { field: "itemType", .. })
		));
	}

	#[test]
	fn missing_consideration_recipient_is_rejected() {
		let mut foreign = foreign_order();
		foreign.consideration[0].recipient = None;
		assert!(foreign.normalize().is_err());
	}

	struct OneBatchFeed {
		batch: Option<Vec<ForeignOrder>>,
	}

	#[async_trait]
	impl OrderFeed for OneBatchFeed {
		async fn next_orders(&mut self) -> Result<Option<Vec<ForeignOrder>>, IngestError> {
			Ok(self.batch.take())
		}
	}

	#[tokio::test]
	async fn ingested_orders_skip_validation_and_land_in_store() {
		use gossip_chain::implementations::mock::MockChain;
		use gossip_chain::ChainService;
		use gossip_engine::{EventBus, Limits};
		use gossip_store::implementations::memory::MemoryStore;
		use gossip_store::StoreService;
		use gossip_validation::implementations::scripted::ScriptedValidator;
		use gossip_validation::{codes, Validation, ValidationOptions, ValidationService};

		// The validator would reject everything, but the feed skips it.
		let validator = ScriptedValidator::new();
		validator.set_default(Validation::with_errors(vec![codes::SIGNATURE_INVALID]));
		let engine = Arc::new(OrderEngine::new(
			Arc::new(StoreService::new(Box::new(MemoryStore::new()))),
			Arc::new(ChainService::new(Box::new(MockChain::with_block(10)))),
			Arc::new(ValidationService::new(
				Box::new(validator),
				ValidationOptions::default(),
			)),
			EventBus::new(16),
			Limits {
				max_orders: 100,
				max_orders_per_offerer: 100,
			},
		));

		let foreign = foreign_order();
		let hash = gossip_types::order_hash(&foreign.normalize().unwrap());
		let ingestor = Ingestor::new(
			engine.clone(),
			Box::new(OneBatchFeed {
				batch: Some(vec![foreign]),
			}),
		);
		let (_stop_tx, stop_rx) = broadcast::channel(1);
		ingestor.run(stop_rx).await;

		let metadata = engine.store().get_metadata(hash).await.unwrap().unwrap();
		assert!(metadata.is_valid);
		assert_eq!(metadata.auction_type, AuctionType::Basic);
	}

	#[test]
	fn foreign_json_round_trips() {
		let json = serde_json::json!({
			"offerer": "0x2222222222222222222222222222222222222222",
			"zone": "0x0000000000000000000000000000000000000000",
			"offer": [{
				"itemType": 2,
				"token": "0x1111111111111111111111111111111111111111",
				"identifierOrCriteria": "1",
				"startAmount": "1",
				"endAmount": "1"
			}],
			"consideration": [],
			"orderType": 0,
			"startTime": "1",
			"endTime": "2",
			"zoneHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
			"salt": "0",
			"conduitKey": "0x0000000000000000000000000000000000000000000000000000000000000000",
			"counter": "0",
			"signature": "0x00"
		});
		let foreign: ForeignOrder = serde_json::from_value(json).unwrap();
		assert_eq!(foreign.offer.len(), 1);
		assert_eq!(foreign.offer[0].identifier_or_criteria, "1");
	}
}
