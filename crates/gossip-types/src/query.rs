//! Read-side query options.
//!
//! These types describe the collection-scoped projection over the store:
//! which side of the book, how to sort, and which filters to apply. The wire
//! protocol carries the side/sort/pagination subset (see
//! [`crate::messages::HashQuery`]); filters are a local read-API surface.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Which side of the book an order sits on, from the offerer's view of the
/// non-fungible leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
	/// Fungibles offered for the collection item.
	Buy,
	/// Collection item offered for fungibles.
	Sell,
}

impl Side {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::Buy),
			1 => Some(Self::Sell),
			_ => None,
		}
	}
}

/// Sort order for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSort {
	#[default]
	Newest,
	Oldest,
	EndingSoon,
	/// Ascending by current interpolated price.
	PriceAsc,
	/// Descending by current interpolated price.
	PriceDesc,
}

impl OrderSort {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::Newest),
			1 => Some(Self::Oldest),
			2 => Some(Self::EndingSoon),
			3 => Some(Self::PriceAsc),
			4 => Some(Self::PriceDesc),
			_ => None,
		}
	}
}

/// Listing filters. All applied filters must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFilter {
	/// Only orders placed by this offerer.
	Offerer(Address),
	/// Fixed-price orders only.
	BuyNow,
	/// English auctions only.
	OnAuction,
	/// Exactly one item on the non-fungible side.
	SingleItem,
	/// More than one item on the non-fungible side.
	Bundles,
	/// Fungible leg denominated in this token.
	Currency(Address),
}

/// A full read query against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
	pub side: Side,
	pub sort: OrderSort,
	pub filters: Vec<OrderFilter>,
	pub limit: usize,
	pub offset: usize,
}

impl Default for OrderQuery {
	fn default() -> Self {
		Self {
			side: Side::Sell,
			sort: OrderSort::Newest,
			filters: Vec::new(),
			limit: 50,
			offset: 0,
		}
	}
}
