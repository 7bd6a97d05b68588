//! Configuration module for the Seaport gossip node.
//!
//! One immutable record covers every recognized option with its default.
//! Configuration loads from a TOML file; the transport's own options pass
//! through opaquely via `custom_network_config`.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical Seaport 1.1 deployment.
pub const DEFAULT_SETTLEMENT_CONTRACT: &str = "0x00000000006c3852cbEf3e08E8dF289169EdE581";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("configuration error: {0}")]
	Parse(String),
	#[error("validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the input dump.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// JSON-RPC endpoint for the chain client.
	pub chain_provider: String,
	/// Store location.
	#[serde(default = "default_datadir")]
	pub datadir: String,
	/// Listen address for the transport.
	#[serde(default = "default_hostname")]
	pub hostname: String,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Initial peers to dial.
	#[serde(default)]
	pub bootnodes: Vec<String>,
	#[serde(default = "default_min_connections")]
	pub min_connections: usize,
	#[serde(default = "default_max_connections")]
	pub max_connections: usize,
	/// Collection topics subscribed at start.
	#[serde(default)]
	pub collection_addresses: Vec<String>,
	/// Global admission cap.
	#[serde(default = "default_max_orders")]
	pub max_orders: u64,
	/// Per-offerer admission cap; pinned local orders are exempt.
	#[serde(default = "default_max_orders_per_offerer")]
	pub max_orders_per_offerer: u64,
	/// Reject orders starting further than this many seconds ahead.
	#[serde(default = "default_max_order_start_time")]
	pub max_order_start_time: u64,
	/// Reject orders ending further than this many seconds ahead.
	#[serde(default = "default_max_order_end_time")]
	pub max_order_end_time: u64,
	/// How long fulfilled or cancelled orders are kept, in seconds.
	#[serde(default = "default_max_order_history")]
	pub max_order_history: u64,
	/// Revalidation ticker period in seconds.
	#[serde(default = "default_revalidate_interval")]
	pub revalidate_interval: u64,
	/// Blocks after which a validation is considered stale.
	#[serde(default = "default_revalidate_block_distance")]
	pub revalidate_block_distance: u64,
	/// Metadata rows revalidated per tick.
	#[serde(default = "default_revalidate_batch_size")]
	pub revalidate_batch_size: usize,
	/// Enable the external order feed.
	#[serde(default)]
	pub ingest_external_orders: bool,
	#[serde(default)]
	pub external_api_key: String,
	#[serde(default)]
	pub external_api_url: String,
	/// Outbound fetch budget of the external feed, per second.
	#[serde(default = "default_ingest_requests_per_second")]
	pub ingest_requests_per_second: u32,
	#[serde(default = "default_settlement_contract")]
	pub settlement_contract_address: String,
	/// Require the configured fee recipient on every order.
	#[serde(default = "default_true")]
	pub validate_fee_recipient: bool,
	#[serde(default = "default_fee_recipient")]
	pub fee_recipient: String,
	/// Collection whose orders skip the token probe (items mint lazily).
	#[serde(default)]
	pub lazy_mint_adapter: String,
	/// Whether this node acts as a client in peer discovery.
	#[serde(default = "default_true")]
	pub client_mode: bool,
	/// Enable the HTTP read API.
	#[serde(default)]
	pub api_enabled: bool,
	#[serde(default = "default_api_port")]
	pub api_port: u16,
	/// Opaque options handed to the transport implementation.
	#[serde(default)]
	pub custom_network_config: Option<toml::Value>,
}

fn default_datadir() -> String {
	"./datadir".to_string()
}

fn default_hostname() -> String {
	"0.0.0.0".to_string()
}

fn default_port() -> u16 {
	8998
}

fn default_min_connections() -> usize {
	5
}

fn default_max_connections() -> usize {
	15
}

fn default_max_orders() -> u64 {
	100_000
}

fn default_max_orders_per_offerer() -> u64 {
	100
}

fn default_max_order_start_time() -> u64 {
	// 14 days
	14 * 86_400
}

fn default_max_order_end_time() -> u64 {
	// 180 days
	180 * 86_400
}

fn default_max_order_history() -> u64 {
	// 7 days
	7 * 86_400
}

fn default_revalidate_interval() -> u64 {
	60
}

fn default_revalidate_block_distance() -> u64 {
	25
}

fn default_revalidate_batch_size() -> usize {
	50
}

fn default_ingest_requests_per_second() -> u32 {
	5
}

fn default_settlement_contract() -> String {
	DEFAULT_SETTLEMENT_CONTRACT.to_string()
}

fn default_fee_recipient() -> String {
	// OpenSea fee collector.
	"0x0000a26b00c1F0DF003000390027140000fAa719".to_string()
}

fn default_api_port() -> u16 {
	8999
}

fn default_true() -> bool {
	true
}

impl Config {
	/// Minimal configuration pointing at a chain provider, with every
	/// other option at its default.
	pub fn new(chain_provider: impl Into<String>) -> Self {
		Self {
			chain_provider: chain_provider.into(),
			datadir: default_datadir(),
			hostname: default_hostname(),
			port: default_port(),
			bootnodes: Vec::new(),
			min_connections: default_min_connections(),
			max_connections: default_max_connections(),
			collection_addresses: Vec::new(),
			max_orders: default_max_orders(),
			max_orders_per_offerer: default_max_orders_per_offerer(),
			max_order_start_time: default_max_order_start_time(),
			max_order_end_time: default_max_order_end_time(),
			max_order_history: default_max_order_history(),
			revalidate_interval: default_revalidate_interval(),
			revalidate_block_distance: default_revalidate_block_distance(),
			revalidate_batch_size: default_revalidate_batch_size(),
			ingest_external_orders: false,
			external_api_key: String::new(),
			external_api_url: String::new(),
			ingest_requests_per_second: default_ingest_requests_per_second(),
			settlement_contract_address: default_settlement_contract(),
			validate_fee_recipient: true,
			fee_recipient: default_fee_recipient(),
			lazy_mint_adapter: String::new(),
			client_mode: true,
			api_enabled: false,
			api_port: default_api_port(),
			custom_network_config: None,
		}
	}

	/// Loads and validates a configuration file.
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		let config: Self = toml::from_str(&contents)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.chain_provider.is_empty() {
			return Err(ConfigError::Validation("chain_provider is required".into()));
		}
		if self.max_connections < self.min_connections {
			return Err(ConfigError::Validation(
				"max_connections is below min_connections".into(),
			));
		}
		self.settlement_contract()?;
		self.collections()?;
		if self.validate_fee_recipient {
			self.fee_recipient()?;
		}
		Ok(())
	}

	pub fn settlement_contract(&self) -> Result<Address, ConfigError> {
		parse_address("settlement_contract_address", &self.settlement_contract_address)
	}

	/// Parsed and validated collection subscription list.
	pub fn collections(&self) -> Result<Vec<Address>, ConfigError> {
		self.collection_addresses
			.iter()
			.map(|address| parse_address("collection_addresses", address))
			.collect()
	}

	pub fn fee_recipient(&self) -> Result<Option<Address>, ConfigError> {
		if !self.validate_fee_recipient || self.fee_recipient.is_empty() {
			return Ok(None);
		}
		parse_address("fee_recipient", &self.fee_recipient).map(Some)
	}

	pub fn lazy_mint_adapter(&self) -> Result<Option<Address>, ConfigError> {
		if self.lazy_mint_adapter.is_empty() {
			return Ok(None);
		}
		parse_address("lazy_mint_adapter", &self.lazy_mint_adapter).map(Some)
	}
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
	value
		.parse::<Address>()
		.map_err(|_| ConfigError::Validation(format!("{}: invalid address '{}'", field, value)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn defaults_match_documented_values() {
		let config = Config::new("http://localhost:8545");
		assert_eq!(config.datadir, "./datadir");
		assert_eq!(config.port, 8998);
		assert_eq!(config.min_connections, 5);
		assert_eq!(config.max_connections, 15);
		assert_eq!(config.max_orders, 100_000);
		assert_eq!(config.max_orders_per_offerer, 100);
		assert_eq!(config.max_order_start_time, 14 * 86_400);
		assert_eq!(config.max_order_end_time, 180 * 86_400);
		assert_eq!(config.max_order_history, 7 * 86_400);
		assert_eq!(config.revalidate_interval, 60);
		assert_eq!(config.revalidate_block_distance, 25);
		assert!(!config.ingest_external_orders);
		assert!(config.validate_fee_recipient);
		assert!(config.client_mode);
		assert_eq!(
			config.settlement_contract_address,
			DEFAULT_SETTLEMENT_CONTRACT
		);
	}

	#[test]
	fn file_round_trip_with_overrides() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"chain_provider = \"http://localhost:8545\"\nmax_orders = 10\ncollection_addresses = [\"0x1111111111111111111111111111111111111111\"]"
		)
		.unwrap();
		let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
		assert_eq!(config.max_orders, 10);
		assert_eq!(config.collections().unwrap().len(), 1);
	}

	#[test]
	fn invalid_collection_address_fails_validation() {
		let mut config = Config::new("http://localhost:8545");
		config.collection_addresses = vec!["not-an-address".into()];
		assert!(matches!(
			config.validate(),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn missing_chain_provider_fails() {
		let mut config = Config::new("x");
		config.chain_provider.clear();
		assert!(config.validate().is_err());
	}
}
