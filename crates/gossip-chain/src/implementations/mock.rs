//! Deterministic mock chain for tests.
//!
//! Every view is scripted: tests set the head block, per-address code,
//! per-order statuses, and per-offerer counters, and queue contract
//! events to be "observed" in a block range.

use crate::contract::ContractEvent;
use crate::{ChainError, ChainInterface, OrderStatus};
use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use gossip_types::{ConfigSchema, Schema, SchemaError};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
	block_number: u64,
	code: HashMap<Address, Vec<u8>>,
	statuses: HashMap<B256, OrderStatus>,
	counters: HashMap<Address, U256>,
	pending_events: Vec<ContractEvent>,
}

/// Scriptable in-memory chain.
#[derive(Default)]
pub struct MockChain {
	state: Mutex<State>,
}

impl MockChain {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_block(block_number: u64) -> Self {
		let chain = Self::new();
		chain.set_block_number(block_number);
		chain
	}

	pub fn set_block_number(&self, block_number: u64) {
		self.state.lock().unwrap().block_number = block_number;
	}

	pub fn advance_blocks(&self, count: u64) {
		self.state.lock().unwrap().block_number += count;
	}

	pub fn set_code(&self, address: Address, code: Vec<u8>) {
		self.state.lock().unwrap().code.insert(address, code);
	}

	pub fn set_order_status(&self, order_hash: B256, status: OrderStatus) {
		self.state.lock().unwrap().statuses.insert(order_hash, status);
	}

	pub fn set_counter(&self, offerer: Address, counter: U256) {
		self.state.lock().unwrap().counters.insert(offerer, counter);
	}

	/// Queues an event to be returned by the next covering `get_events`.
	pub fn push_event(&self, event: ContractEvent) {
		self.state.lock().unwrap().pending_events.push(event);
	}

	/// Deterministic block hash for a height.
	pub fn block_hash_for(number: u64) -> B256 {
		keccak256(number.to_be_bytes())
	}
}

#[async_trait]
impl ChainInterface for MockChain {
	async fn block_number(&self) -> Result<u64, ChainError> {
		Ok(self.state.lock().unwrap().block_number)
	}

	async fn block_hash(&self, number: u64) -> Result<B256, ChainError> {
		Ok(Self::block_hash_for(number))
	}

	async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
		Ok(self
			.state
			.lock()
			.unwrap()
			.code
			.get(&address)
			.cloned()
			.unwrap_or_default())
	}

	async fn get_order_status(&self, order_hash: B256) -> Result<OrderStatus, ChainError> {
		Ok(self
			.state
			.lock()
			.unwrap()
			.statuses
			.get(&order_hash)
			.copied()
			.unwrap_or_default())
	}

	async fn get_counter(&self, offerer: Address) -> Result<U256, ChainError> {
		Ok(self
			.state
			.lock()
			.unwrap()
			.counters
			.get(&offerer)
			.copied()
			.unwrap_or_default())
	}

	async fn get_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ContractEvent>, ChainError> {
		let mut state = self.state.lock().unwrap();
		let (matched, remaining): (Vec<_>, Vec<_>) = state
			.pending_events
			.drain(..)
			.partition(|event| (from_block..=to_block).contains(&event.block_number()));
		state.pending_events = remaining;
		Ok(matched)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockChainSchema)
	}
}

// Tests usually keep an `Arc<MockChain>` to script state after handing
// the chain to a service.
#[async_trait]
impl ChainInterface for std::sync::Arc<MockChain> {
	async fn block_number(&self) -> Result<u64, ChainError> {
		self.as_ref().block_number().await
	}

	async fn block_hash(&self, number: u64) -> Result<B256, ChainError> {
		self.as_ref().block_hash(number).await
	}

	async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
		self.as_ref().get_code(address).await
	}

	async fn get_order_status(&self, order_hash: B256) -> Result<OrderStatus, ChainError> {
		self.as_ref().get_order_status(order_hash).await
	}

	async fn get_counter(&self, offerer: Address) -> Result<U256, ChainError> {
		self.as_ref().get_counter(offerer).await
	}

	async fn get_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ContractEvent>, ChainError> {
		self.as_ref().get_events(from_block, to_block).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.as_ref().config_schema()
	}
}

/// Configuration schema for the mock chain.
pub struct MockChainSchema;

impl ConfigSchema for MockChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		Schema::new(vec![]).check(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn events_are_delivered_once() {
		let chain = MockChain::with_block(10);
		chain.push_event(ContractEvent::Cancelled {
			order_hash: B256::repeat_byte(1),
			offerer: Address::ZERO,
			zone: Address::ZERO,
			block_number: 10,
			block_hash: MockChain::block_hash_for(10),
		});
		let events = chain.get_events(1, 10).await.unwrap();
		assert_eq!(events.len(), 1);
		assert!(chain.get_events(1, 10).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn unknown_status_defaults_to_untouched() {
		let chain = MockChain::new();
		let status = chain.get_order_status(B256::repeat_byte(2)).await.unwrap();
		assert_eq!(status, OrderStatus::default());
	}
}
