//! Order validation for the Seaport gossip node.
//!
//! Wraps the settlement-contract rule checker behind a trait that returns
//! numeric issue codes, and classifies results: an empty error set is
//! valid, a non-empty set drawn entirely from the approval/balance codes is
//! transient (the order stays stored and may become valid again), anything
//! else is permanent.

use async_trait::async_trait;
use alloy_primitives::Address;
use gossip_types::Order;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod rules;
	pub mod scripted;
}

/// Issue codes reported by the rule checker, grouped in families of one
/// hundred per asset class or concern.
pub mod codes {
	/// Malformed order structure.
	pub const INVALID_STRUCTURE: u16 = 100;
	pub const ERC20_INVALID_TOKEN: u16 = 200;
	pub const ERC20_INSUFFICIENT_ALLOWANCE: u16 = 202;
	pub const ERC20_INSUFFICIENT_BALANCE: u16 = 203;
	pub const ERC721_INVALID_TOKEN: u16 = 300;
	pub const ERC721_NOT_OWNER: u16 = 303;
	pub const ERC721_NOT_APPROVED: u16 = 304;
	/// Raised for tokens the checker cannot probe; lazily minted
	/// collections trip this spuriously (see the residual filter).
	pub const ERC1155_INVALID_TOKEN: u16 = 400;
	pub const ERC1155_NOT_APPROVED: u16 = 401;
	pub const ERC1155_INSUFFICIENT_BALANCE: u16 = 402;
	pub const FEE_RECIPIENT_MISMATCH: u16 = 705;
	pub const STATUS_CANCELLED: u16 = 801;
	pub const STATUS_FULLY_FILLED: u16 = 802;
	pub const TIME_END_BEFORE_START: u16 = 901;
	pub const TIME_EXPIRED: u16 = 902;
	pub const TIME_DISTANT_END: u16 = 903;
	pub const TIME_DISTANT_START: u16 = 904;
	pub const SIGNATURE_INVALID: u16 = 1301;
	pub const SIGNATURE_COUNTER_BELOW_CURRENT: u16 = 1302;
	pub const NATIVE_INSUFFICIENT_BALANCE: u16 = 1400;
}

/// Error codes that describe missing approvals or balances. Orders failing
/// only with these stay in the store: the offerer can top up or approve and
/// the order becomes fulfillable again.
pub const TRANSIENT_CODES: [u16; 7] = [
	codes::ERC20_INSUFFICIENT_ALLOWANCE,
	codes::ERC20_INSUFFICIENT_BALANCE,
	codes::ERC721_NOT_OWNER,
	codes::ERC721_NOT_APPROVED,
	codes::ERC1155_NOT_APPROVED,
	codes::ERC1155_INSUFFICIENT_BALANCE,
	codes::NATIVE_INSUFFICIENT_BALANCE,
];

/// Error codes that mean the order is finished on-chain or timed out, and
/// can be deleted once stale.
pub const TERMINAL_CODES: [u16; 3] = [
	codes::STATUS_CANCELLED,
	codes::STATUS_FULLY_FILLED,
	codes::TIME_EXPIRED,
];

/// Errors that can occur while running validation.
#[derive(Debug, Error)]
pub enum ValidatorError {
	#[error("chain error: {0}")]
	Chain(#[from] gossip_chain::ChainError),
	#[error("validator error: {0}")]
	Internal(String),
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
	pub errors: Vec<u16>,
	pub warnings: Vec<u16>,
}

impl Validation {
	pub fn valid() -> Self {
		Self::default()
	}

	pub fn with_errors(errors: Vec<u16>) -> Self {
		Self {
			errors,
			warnings: Vec::new(),
		}
	}

	pub fn is_valid(&self) -> bool {
		self.errors.is_empty()
	}

	/// Non-empty error set drawn entirely from the approval/balance codes.
	pub fn is_transient(&self) -> bool {
		!self.errors.is_empty()
			&& self
				.errors
				.iter()
				.all(|code| TRANSIENT_CODES.contains(code))
	}

	/// Whether the errors mark the order fulfilled, cancelled, or expired.
	pub fn is_terminal(&self) -> bool {
		self.errors.iter().any(|code| TERMINAL_CODES.contains(code))
	}
}

/// The rule-checker seam.
#[async_trait]
pub trait ValidatorInterface: Send + Sync {
	async fn validate(&self, order: &Order) -> Result<Validation, ValidatorError>;
}

/// Options applied on top of the raw rule checker.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
	/// Token address whose orders legitimately fail the ERC1155 token
	/// probe because items mint on first transfer.
	pub lazy_mint_adapter: Option<Address>,
}

/// High-level validation wrapper applying the residual-code filter.
pub struct ValidationService {
	backend: Box<dyn ValidatorInterface>,
	options: ValidationOptions,
}

impl ValidationService {
	pub fn new(backend: Box<dyn ValidatorInterface>, options: ValidationOptions) -> Self {
		Self { backend, options }
	}

	pub async fn validate(&self, order: &Order) -> Result<Validation, ValidatorError> {
		let mut validation = self.backend.validate(order).await?;
		if let Some(adapter) = self.options.lazy_mint_adapter {
			let touches_adapter = order
				.offer
				.iter()
				.map(|item| item.token)
				.chain(order.consideration.iter().map(|item| item.token))
				.any(|token| token == adapter);
			if touches_adapter {
				validation
					.errors
					.retain(|code| *code != codes::ERC1155_INVALID_TOKEN);
			}
		}
		Ok(validation)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::scripted::ScriptedValidator;
	use alloy_primitives::{Bytes, B256, U256};
	use gossip_types::{ConsiderationItem, ItemType, OfferItem, OrderType};

	fn order_on(token: Address) -> Order {
		Order {
			offer: vec![OfferItem {
				item_type: ItemType::Erc1155,
				token,
				identifier_or_criteria: U256::from(1),
				start_amount: U256::from(1),
				end_amount: U256::from(1),
			}],
			consideration: vec![ConsiderationItem {
				item_type: ItemType::Native,
				token: Address::ZERO,
				identifier_or_criteria: U256::ZERO,
				start_amount: U256::from(10),
				end_amount: U256::from(10),
				recipient: Address::repeat_byte(0x22),
			}],
			offerer: Address::repeat_byte(0x22),
			signature: Bytes::from(vec![0u8; 65]),
			order_type: OrderType::FullOpen,
			start_time: 0,
			end_time: u64::MAX,
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

	#[test]
	fn transient_requires_nonempty_subset() {
		assert!(!Validation::valid().is_transient());
		assert!(Validation::with_errors(vec![202, 1400]).is_transient());
		assert!(!Validation::with_errors(vec![202, 801]).is_transient());
	}

	#[test]
	fn terminal_codes_detected() {
		assert!(Validation::with_errors(vec![802]).is_terminal());
		assert!(!Validation::with_errors(vec![202]).is_terminal());
	}

	#[tokio::test]
	async fn residual_filter_drops_lazy_mint_probe_failure() {
		let adapter = Address::repeat_byte(0x77);
		let validator = ScriptedValidator::new();
		validator.set_default(Validation::with_errors(vec![codes::ERC1155_INVALID_TOKEN]));
		let service = ValidationService::new(
			Box::new(validator),
			ValidationOptions {
				lazy_mint_adapter: Some(adapter),
			},
		);

		// The adapter's own orders pass.
		let validation = service.validate(&order_on(adapter)).await.unwrap();
		assert!(validation.is_valid());

		// Other tokens keep the error.
		let validation = service
			.validate(&order_on(Address::repeat_byte(0x11)))
			.await
			.unwrap();
		assert_eq!(validation.errors, vec![codes::ERC1155_INVALID_TOKEN]);
	}
}
