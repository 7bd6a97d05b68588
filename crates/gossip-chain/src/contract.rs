//! Settlement-contract bindings and decoded events.
//!
//! The `sol!` declarations match the deployed contract ABI for proper
//! event decoding; the decoded [`ContractEvent`] carries the block
//! coordinates every downstream consumer needs.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::sol;

// Solidity definitions for the Seaport settlement contract surface this
// node consumes.
sol! {
	/// An item spent from the offer side of a fulfilled order.
	struct SpentItem {
		uint8 itemType;
		address token;
		uint256 identifier;
		uint256 amount;
	}

	/// An item received on the consideration side of a fulfilled order.
	struct ReceivedItem {
		uint8 itemType;
		address token;
		uint256 identifier;
		uint256 amount;
		address recipient;
	}

	event OrderFulfilled(
		bytes32 orderHash,
		address indexed offerer,
		address indexed zone,
		address recipient,
		SpentItem[] offer,
		ReceivedItem[] consideration
	);

	event OrderCancelled(bytes32 orderHash, address indexed offerer, address indexed zone);

	event OrderValidated(bytes32 orderHash, address indexed offerer, address indexed zone);

	event CounterIncremented(uint256 newCounter, address indexed offerer);

	function getOrderStatus(bytes32 orderHash)
		external
		view
		returns (bool isValidated, bool isCancelled, uint256 totalFilled, uint256 totalSize);

	function getCounter(address offerer) external view returns (uint256 counter);
}

/// A fungible-or-not item observed in a fulfillment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledItem {
	pub item_type: u8,
	pub token: Address,
	pub identifier: U256,
	pub amount: U256,
}

impl FulfilledItem {
	/// NATIVE or ERC20.
	pub fn is_fungible(&self) -> bool {
		self.item_type <= 1
	}
}

/// A decoded settlement-contract event with its block coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
	Fulfilled {
		order_hash: B256,
		offerer: Address,
		zone: Address,
		recipient: Address,
		offer: Vec<FulfilledItem>,
		consideration: Vec<FulfilledItem>,
		block_number: u64,
		block_hash: B256,
	},
	Cancelled {
		order_hash: B256,
		offerer: Address,
		zone: Address,
		block_number: u64,
		block_hash: B256,
	},
	Validated {
		order_hash: B256,
		offerer: Address,
		zone: Address,
		block_number: u64,
		block_hash: B256,
	},
	CounterIncremented {
		new_counter: U256,
		offerer: Address,
		block_number: u64,
		block_hash: B256,
	},
}

impl ContractEvent {
	pub fn block_number(&self) -> u64 {
		match self {
			Self::Fulfilled { block_number, .. }
			| Self::Cancelled { block_number, .. }
			| Self::Validated { block_number, .. }
			| Self::CounterIncremented { block_number, .. } => *block_number,
		}
	}

	/// Sum of fungible amounts on the side that contains fungibles,
	/// preferring the offer side. This is the fulfillment price.
	pub fn fulfillment_price(
		offer: &[FulfilledItem],
		consideration: &[FulfilledItem],
	) -> U256 {
		let offer_sum: U256 = offer
			.iter()
			.filter(|item| item.is_fungible())
			.map(|item| item.amount)
			.sum();
		if offer_sum > U256::ZERO {
			return offer_sum;
		}
		consideration
			.iter()
			.filter(|item| item.is_fungible())
			.map(|item| item.amount)
			.sum()
	}
}
