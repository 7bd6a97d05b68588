//! JSON-RPC chain client implementation over HTTP using Alloy.

use crate::contract::{
	getCounterCall, getOrderStatusCall, ContractEvent, CounterIncremented, FulfilledItem,
	OrderCancelled, OrderFulfilled, OrderValidated,
};
use crate::{ChainError, ChainFactory, ChainInterface, OrderStatus};
use alloy_primitives::{Address, Log as PrimLog, LogData, B256, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{BlockNumberOrTag, Filter, Log, TransactionInput, TransactionRequest};
use alloy_sol_types::{SolCall, SolEvent};
use alloy_transport_http::Http;
use async_trait::async_trait;
use gossip_types::{ConfigSchema, Constraint, Key, Schema, SchemaError};

/// HTTP JSON-RPC implementation of [`ChainInterface`].
pub struct RpcChain {
	provider: RootProvider<Http<reqwest::Client>>,
	/// Settlement contract address all views and filters target.
	contract: Address,
}

impl RpcChain {
	pub fn new(rpc_url: &str, contract: Address) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::Connection(format!("invalid RPC URL: {}", e)))?;
		Ok(Self {
			provider: RootProvider::new_http(url),
			contract,
		})
	}

	async fn call_view(&self, calldata: Vec<u8>) -> Result<Vec<u8>, ChainError> {
		let request = TransactionRequest {
			to: Some(self.contract.into()),
			input: TransactionInput::new(calldata.into()),
			..Default::default()
		};
		let output = self
			.provider
			.call(&request)
			.await
			.map_err(|e| ChainError::Rpc(e.to_string()))?;
		Ok(output.to_vec())
	}

	fn decode_event(log: &Log) -> Result<Option<ContractEvent>, ChainError> {
		let block_number = log
			.block_number
			.ok_or_else(|| ChainError::Decode("log missing block number".into()))?;
		let block_hash = log
			.block_hash
			.ok_or_else(|| ChainError::Decode("log missing block hash".into()))?;
		let prim_log = PrimLog {
			address: log.address(),
			data: LogData::new_unchecked(log.topics().to_vec(), log.data().data.clone()),
		};
		let Some(topic0) = log.topic0() else {
			return Ok(None);
		};

		let event = if *topic0 == OrderFulfilled::SIGNATURE_HASH {
			let decoded = OrderFulfilled::decode_log(&prim_log, true)
				.map_err(|e| ChainError::Decode(e.to_string()))?;
			ContractEvent::Fulfilled {
				order_hash: decoded.orderHash,
				offerer: decoded.offerer,
				zone: decoded.zone,
				recipient: decoded.recipient,
				offer: decoded
					.offer
					.iter()
					.map(|item| FulfilledItem {
						item_type: item.itemType,
						token: item.token,
						identifier: item.identifier,
						amount: item.amount,
					})
					.collect(),
				consideration: decoded
					.consideration
					.iter()
					.map(|item| FulfilledItem {
						item_type: item.itemType,
						token: item.token,
						identifier: item.identifier,
						amount: item.amount,
					})
					.collect(),
				block_number,
				block_hash,
			}
		} else if *topic0 == OrderCancelled::SIGNATURE_HASH {
			let decoded = OrderCancelled::decode_log(&prim_log, true)
				.map_err(|e| ChainError::Decode(e.to_string()))?;
			ContractEvent::Cancelled {
				order_hash: decoded.orderHash,
				offerer: decoded.offerer,
				zone: decoded.zone,
				block_number,
				block_hash,
			}
		} else if *topic0 == OrderValidated::SIGNATURE_HASH {
			let decoded = OrderValidated::decode_log(&prim_log, true)
				.map_err(|e| ChainError::Decode(e.to_string()))?;
			ContractEvent::Validated {
				order_hash: decoded.orderHash,
				offerer: decoded.offerer,
				zone: decoded.zone,
				block_number,
				block_hash,
			}
		} else if *topic0 == CounterIncremented::SIGNATURE_HASH {
			let decoded = CounterIncremented::decode_log(&prim_log, true)
				.map_err(|e| ChainError::Decode(e.to_string()))?;
			ContractEvent::CounterIncremented {
				new_counter: decoded.newCounter,
				offerer: decoded.offerer,
				block_number,
				block_hash,
			}
		} else {
			return Ok(None);
		};
		Ok(Some(event))
	}
}

#[async_trait]
impl ChainInterface for RpcChain {
	async fn block_number(&self) -> Result<u64, ChainError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| ChainError::Rpc(e.to_string()))
	}

	async fn block_hash(&self, number: u64) -> Result<B256, ChainError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Number(number), false.into())
			.await
			.map_err(|e| ChainError::Rpc(e.to_string()))?
			.ok_or(ChainError::BlockNotFound(number))?;
		Ok(block.header.hash)
	}

	async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
		let code = self
			.provider
			.get_code_at(address)
			.await
			.map_err(|e| ChainError::Rpc(e.to_string()))?;
		Ok(code.to_vec())
	}

	async fn get_order_status(&self, order_hash: B256) -> Result<OrderStatus, ChainError> {
		let calldata = getOrderStatusCall { orderHash: order_hash }.abi_encode();
		let output = self.call_view(calldata).await?;
		let returns = getOrderStatusCall::abi_decode_returns(&output, true)
			.map_err(|e| ChainError::Decode(e.to_string()))?;
		Ok(OrderStatus {
			is_validated: returns.isValidated,
			is_cancelled: returns.isCancelled,
			total_filled: returns.totalFilled,
			total_size: returns.totalSize,
		})
	}

	async fn get_counter(&self, offerer: Address) -> Result<U256, ChainError> {
		let calldata = getCounterCall { offerer }.abi_encode();
		let output = self.call_view(calldata).await?;
		let returns = getCounterCall::abi_decode_returns(&output, true)
			.map_err(|e| ChainError::Decode(e.to_string()))?;
		Ok(returns.counter)
	}

	async fn get_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ContractEvent>, ChainError> {
		let filter = Filter::new()
			.address(vec![self.contract])
			.event_signature(vec![
				OrderFulfilled::SIGNATURE_HASH,
				OrderCancelled::SIGNATURE_HASH,
				OrderValidated::SIGNATURE_HASH,
				CounterIncremented::SIGNATURE_HASH,
			])
			.from_block(from_block)
			.to_block(to_block);
		let logs = self
			.provider
			.get_logs(&filter)
			.await
			.map_err(|e| ChainError::Rpc(e.to_string()))?;

		let mut events = Vec::with_capacity(logs.len());
		for log in &logs {
			match Self::decode_event(log) {
				Ok(Some(event)) => events.push(event),
				Ok(None) => {},
				Err(e) => {
					tracing::warn!(error = %e, "skipping undecodable settlement event");
				},
			}
		}
		Ok(events)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RpcChainSchema)
	}
}

/// Configuration schema for the RPC chain client.
pub struct RpcChainSchema;

impl ConfigSchema for RpcChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		Schema::new(vec![
			Key::required("chain_provider", Constraint::Text),
			Key::required("settlement_contract", Constraint::Address),
		])
		.check(config)
	}
}

/// Factory function to create an RPC chain client from configuration.
///
/// Configuration parameters:
/// - `chain_provider`: JSON-RPC endpoint URL
/// - `settlement_contract`: settlement contract address
pub fn create_chain(config: &toml::Value) -> Result<Box<dyn ChainInterface>, ChainError> {
	RpcChainSchema
		.validate(config)
		.map_err(|e| ChainError::Configuration(e.to_string()))?;
	let rpc_url = config
		.get("chain_provider")
		.and_then(|value| value.as_str())
		.unwrap_or_default();
	let contract = config
		.get("settlement_contract")
		.and_then(|value| value.as_str())
		.unwrap_or_default()
		.parse::<Address>()
		.map_err(|e| ChainError::Configuration(format!("invalid contract address: {}", e)))?;
	Ok(Box::new(RpcChain::new(rpc_url, contract)?))
}

/// Registry name for this implementation.
pub const NAME: &str = "rpc";

pub fn factory() -> ChainFactory {
	create_chain
}
