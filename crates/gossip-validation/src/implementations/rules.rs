//! Rule checker backed by the settlement contract.
//!
//! Checks what the chain can answer directly: structure, the admission
//! time windows, the offerer's counter, the optional fee recipient, and
//! the on-chain order status. Approval and balance probes belong to the
//! token contracts and surface through peers' validation results instead.

use crate::{codes, Validation, ValidatorError, ValidatorInterface};
use alloy_primitives::Address;
use async_trait::async_trait;
use gossip_chain::ChainService;
use gossip_types::{current_timestamp, Order, OrderDataError};
use std::sync::Arc;

/// Contract-anchored rule checker.
pub struct ContractRules {
	chain: Arc<ChainService>,
	/// Reject orders starting further than this many seconds in the future.
	max_order_start_time: u64,
	/// Reject orders ending further than this many seconds in the future.
	max_order_end_time: u64,
	/// When set, some consideration item must pay this recipient.
	required_fee_recipient: Option<Address>,
}

impl ContractRules {
	pub fn new(
		chain: Arc<ChainService>,
		max_order_start_time: u64,
		max_order_end_time: u64,
		required_fee_recipient: Option<Address>,
	) -> Self {
		Self {
			chain,
			max_order_start_time,
			max_order_end_time,
			required_fee_recipient,
		}
	}

	fn check_times(&self, order: &Order, errors: &mut Vec<u16>) {
		let now = current_timestamp();
		if order.end_time <= order.start_time {
			errors.push(codes::TIME_END_BEFORE_START);
			return;
		}
		if order.is_expired(now) {
			errors.push(codes::TIME_EXPIRED);
		}
		if order.start_time > now.saturating_add(self.max_order_start_time) {
			errors.push(codes::TIME_DISTANT_START);
		}
		if order.end_time > now.saturating_add(self.max_order_end_time) {
			errors.push(codes::TIME_DISTANT_END);
		}
	}

	fn check_fee_recipient(&self, order: &Order, errors: &mut Vec<u16>) {
		let Some(required) = self.required_fee_recipient else {
			return;
		};
		let paid = order
			.consideration
			.iter()
			.any(|item| item.recipient == required);
		if !paid {
			errors.push(codes::FEE_RECIPIENT_MISMATCH);
		}
	}
}

#[async_trait]
impl ValidatorInterface for ContractRules {
	async fn validate(&self, order: &Order) -> Result<Validation, ValidatorError> {
		let mut errors = Vec::new();

		match order.check_structure() {
			Ok(()) => {},
			Err(OrderDataError::InvalidTimes { .. }) => {
				errors.push(codes::TIME_END_BEFORE_START);
			},
			Err(OrderDataError::InvalidSignatureLength(_)) => {
				errors.push(codes::SIGNATURE_INVALID);
			},
			Err(_) => errors.push(codes::INVALID_STRUCTURE),
		}
		self.check_times(order, &mut errors);
		self.check_fee_recipient(order, &mut errors);

		let current_counter = self.chain.get_counter(order.offerer).await?;
		if order.counter < current_counter {
			errors.push(codes::SIGNATURE_COUNTER_BELOW_CURRENT);
		}

		let hash = gossip_types::order_hash(order);
		let status = self.chain.get_order_status(hash).await?;
		if status.is_cancelled {
			errors.push(codes::STATUS_CANCELLED);
		}
		if status.is_fully_fulfilled() {
			errors.push(codes::STATUS_FULLY_FILLED);
		}

		errors.sort_unstable();
		errors.dedup();
		Ok(Validation {
			errors,
			warnings: Vec::new(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Bytes, B256, U256};
	use gossip_chain::implementations::mock::MockChain;
	use gossip_chain::OrderStatus;
	use gossip_types::{ConsiderationItem, ItemType, OfferItem, OrderType};

	fn active_order() -> Order {
		let now = current_timestamp();
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
			start_time: now.saturating_sub(10),
			end_time: now + 3600,
			counter: U256::ZERO,
			salt: U256::ZERO,
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

	fn rules(chain: Arc<ChainService>) -> ContractRules {
		ContractRules::new(chain, 14 * 86_400, 180 * 86_400, None)
	}

	#[tokio::test]
	async fn active_order_is_valid() {
		let chain = Arc::new(ChainService::new(Box::new(MockChain::new())));
		let validation = rules(chain).validate(&active_order()).await.unwrap();
		assert!(validation.is_valid(), "errors: {:?}", validation.errors);
	}

	#[tokio::test]
	async fn expired_order_reports_time_code() {
		let mut order = active_order();
		order.start_time = 1;
		order.end_time = 2;
		let chain = Arc::new(ChainService::new(Box::new(MockChain::new())));
		let validation = rules(chain).validate(&order).await.unwrap();
		assert!(validation.errors.contains(&codes::TIME_EXPIRED));
	}

	#[tokio::test]
	async fn distant_end_time_rejected() {
		let mut order = active_order();
		order.end_time = current_timestamp() + 365 * 86_400;
		let chain = Arc::new(ChainService::new(Box::new(MockChain::new())));
		let validation = rules(chain).validate(&order).await.unwrap();
		assert!(validation.errors.contains(&codes::TIME_DISTANT_END));
	}

	#[tokio::test]
	async fn stale_counter_rejected() {
		let order = active_order();
		let mock = MockChain::new();
		mock.set_counter(order.offerer, U256::from(1));
		let chain = Arc::new(ChainService::new(Box::new(mock)));
		let validation = rules(chain).validate(&order).await.unwrap();
		assert!(validation
			.errors
			.contains(&codes::SIGNATURE_COUNTER_BELOW_CURRENT));
	}

	#[tokio::test]
	async fn cancelled_order_reports_status_code() {
		let order = active_order();
		let hash = gossip_types::order_hash(&order);
		let mock = MockChain::new();
		mock.set_order_status(
			hash,
			OrderStatus {
				is_cancelled: true,
				..OrderStatus::default()
			},
		);
		let chain = Arc::new(ChainService::new(Box::new(mock)));
		let validation = rules(chain).validate(&order).await.unwrap();
		assert_eq!(validation.errors, vec![codes::STATUS_CANCELLED]);
	}

	#[tokio::test]
	async fn missing_fee_recipient_rejected() {
		let order = active_order();
		let chain = Arc::new(ChainService::new(Box::new(MockChain::new())));
		let rules = ContractRules::new(
			chain,
			14 * 86_400,
			180 * 86_400,
			Some(Address::repeat_byte(0xfe)),
		);
		let validation = rules.validate(&order).await.unwrap();
		assert_eq!(validation.errors, vec![codes::FEE_RECIPIENT_MISMATCH]);
	}
}
