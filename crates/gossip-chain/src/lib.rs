//! Chain client for the Seaport gossip node.
//!
//! This module provides the JSON-RPC seam to the chain hosting the
//! settlement contract: latest block, account code, the contract's
//! `getOrderStatus` and `getCounter` views, and the four contract events
//! the listener consumes.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use gossip_types::ConfigSchema;
use std::time::Instant;
use thiserror::Error;

pub mod contract;

/// Re-export implementations
pub mod implementations {
	pub mod mock;
	pub mod rpc;
}

pub use contract::ContractEvent;

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
	#[error("connection error: {0}")]
	Connection(String),
	#[error("rpc error: {0}")]
	Rpc(String),
	#[error("decode error: {0}")]
	Decode(String),
	#[error("block {0} not found")]
	BlockNotFound(u64),
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// Result of the settlement contract's `getOrderStatus` view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStatus {
	pub is_validated: bool,
	pub is_cancelled: bool,
	pub total_filled: U256,
	pub total_size: U256,
}

impl OrderStatus {
	/// The strong fulfillment condition: something was filled and the
	/// whole size is used up.
	pub fn is_fully_fulfilled(&self) -> bool {
		self.total_filled > U256::ZERO && self.total_filled == self.total_size
	}
}

/// Low-level chain access.
#[async_trait]
pub trait ChainInterface: Send + Sync {
	async fn block_number(&self) -> Result<u64, ChainError>;

	async fn block_hash(&self, number: u64) -> Result<B256, ChainError>;

	/// Deployed code at an address; empty for externally owned accounts.
	async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError>;

	async fn get_order_status(&self, order_hash: B256) -> Result<OrderStatus, ChainError>;

	async fn get_counter(&self, offerer: Address) -> Result<U256, ChainError>;

	/// Decoded settlement-contract events in a block range, inclusive.
	async fn get_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ContractEvent>, ChainError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for chain client factory functions.
pub type ChainFactory = fn(&toml::Value) -> Result<Box<dyn ChainInterface>, ChainError>;

/// High-level chain wrapper that meters call latency.
///
/// Safe for concurrent use; clones share the backend.
pub struct ChainService {
	backend: Box<dyn ChainInterface>,
}

impl ChainService {
	pub fn new(backend: Box<dyn ChainInterface>) -> Self {
		Self { backend }
	}

	pub async fn block_number(&self) -> Result<u64, ChainError> {
		self.metered("block_number", self.backend.block_number()).await
	}

	pub async fn block_hash(&self, number: u64) -> Result<B256, ChainError> {
		self.metered("block_hash", self.backend.block_hash(number)).await
	}

	pub async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
		self.metered("get_code", self.backend.get_code(address)).await
	}

	/// Whether an address has no deployed code.
	pub async fn is_eoa(&self, address: Address) -> Result<bool, ChainError> {
		Ok(self.get_code(address).await?.is_empty())
	}

	pub async fn get_order_status(&self, order_hash: B256) -> Result<OrderStatus, ChainError> {
		self.metered("get_order_status", self.backend.get_order_status(order_hash))
			.await
	}

	pub async fn get_counter(&self, offerer: Address) -> Result<U256, ChainError> {
		self.metered("get_counter", self.backend.get_counter(offerer)).await
	}

	pub async fn get_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ContractEvent>, ChainError> {
		self.metered("get_events", self.backend.get_events(from_block, to_block))
			.await
	}

	async fn metered<T>(
		&self,
		method: &'static str,
		call: impl std::future::Future<Output = Result<T, ChainError>>,
	) -> Result<T, ChainError> {
		let started = Instant::now();
		let result = call.await;
		tracing::trace!(
			method,
			elapsed_ms = started.elapsed().as_millis() as u64,
			ok = result.is_ok(),
			"chain call"
		);
		result
	}
}
