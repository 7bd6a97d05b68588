//! The read-side projection shared by store backends.
//!
//! Filtering and sorting operate on `(order, metadata)` pairs so backends
//! only need to produce candidate rows.

use alloy_primitives::Address;
use gossip_types::{
	current_timestamp, AuctionType, Order, OrderFilter, OrderMetadata, OrderQuery, OrderSort,
	Side,
};

/// Whether an order matches the query's side and filters for a collection.
pub fn matches_query(
	order: &Order,
	metadata: &OrderMetadata,
	collection: Option<Address>,
	query: &OrderQuery,
) -> bool {
	if let Some(collection) = collection {
		if !order.collection_addresses().contains(&collection) {
			return false;
		}
	}
	let side = if order.is_sell() { Side::Sell } else { Side::Buy };
	if side != query.side {
		return false;
	}
	query.filters.iter().all(|filter| match filter {
		OrderFilter::Offerer(offerer) => order.offerer == *offerer,
		OrderFilter::BuyNow => {
			metadata.is_valid && metadata.auction_type == AuctionType::Basic
		},
		OrderFilter::OnAuction => metadata.auction_type == AuctionType::English,
		OrderFilter::SingleItem => non_fungible_count(order) == 1,
		OrderFilter::Bundles => non_fungible_count(order) > 1,
		OrderFilter::Currency(token) => {
			let fungible_side = if order.is_sell() {
				order
					.consideration
					.iter()
					.map(|item| (item.item_type, item.token))
					.collect::<Vec<_>>()
			} else {
				order
					.offer
					.iter()
					.map(|item| (item.item_type, item.token))
					.collect::<Vec<_>>()
			};
			fungible_side
				.iter()
				.any(|(item_type, item_token)| {
					item_type.is_fungible() && item_token == token
				})
		},
	})
}

fn non_fungible_count(order: &Order) -> usize {
	let offer_count = order
		.offer
		.iter()
		.filter(|item| !item.item_type.is_fungible())
		.count();
	if offer_count > 0 {
		offer_count
	} else {
		order
			.consideration
			.iter()
			.filter(|item| !item.item_type.is_fungible())
			.count()
	}
}

/// Sorts matched rows in place according to the query's sort key.
pub fn sort_orders(rows: &mut Vec<(alloy_primitives::B256, Order, OrderMetadata)>, sort: OrderSort) {
	let now = current_timestamp();
	match sort {
		OrderSort::Newest => {
			rows.sort_by(|a, b| b.2.created_at.cmp(&a.2.created_at));
		},
		OrderSort::Oldest => {
			rows.sort_by(|a, b| a.2.created_at.cmp(&b.2.created_at));
		},
		OrderSort::EndingSoon => {
			rows.sort_by(|a, b| a.1.end_time.cmp(&b.1.end_time));
		},
		OrderSort::PriceAsc => {
			rows.sort_by(|a, b| a.1.current_price(now).cmp(&b.1.current_price(now)));
		},
		OrderSort::PriceDesc => {
			rows.sort_by(|a, b| b.1.current_price(now).cmp(&a.1.current_price(now)));
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Bytes, B256, U256};
	use gossip_types::{ConsiderationItem, ItemType, OfferItem, OrderType};

	fn sell_order(collection: Address, created_at: u64) -> (Order, OrderMetadata) {
		let order = Order {
			offer: vec![OfferItem {
				item_type: ItemType::Erc721,
				token: collection,
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
			start_time: 0,
			end_time: u64::MAX,
			counter: U256::ZERO,
			salt: U256::from(created_at),
			conduit_key: B256::ZERO,
			zone: Address::ZERO,
			zone_hash: B256::ZERO,
			chain_id: 1,
			numerator: None,
			denominator: None,
			extra_data: None,
			additional_recipients: None,
		};
		let mut metadata = OrderMetadata::new(AuctionType::Basic, false, created_at);
		metadata.is_valid = true;
		(order, metadata)
	}

	#[test]
	fn collection_scoping_applies() {
		let collection = Address::repeat_byte(0x11);
		let (order, metadata) = sell_order(collection, 1);
		let query = OrderQuery::default();
		assert!(matches_query(&order, &metadata, Some(collection), &query));
		assert!(!matches_query(
			&order,
			&metadata,
			Some(Address::repeat_byte(0x99)),
			&query
		));
		assert!(matches_query(&order, &metadata, None, &query));
	}

	#[test]
	fn side_filtering_applies() {
		let (order, metadata) = sell_order(Address::repeat_byte(0x11), 1);
		let query = OrderQuery {
			side: Side::Buy,
			..OrderQuery::default()
		};
		assert!(!matches_query(&order, &metadata, None, &query));
	}

	#[test]
	fn oldest_sort_orders_by_creation() {
		let collection = Address::repeat_byte(0x11);
		let (order_a, metadata_a) = sell_order(collection, 10);
		let (order_b, metadata_b) = sell_order(collection, 5);
		let mut rows = vec![
			(B256::repeat_byte(1), order_a, metadata_a),
			(B256::repeat_byte(2), order_b, metadata_b),
		];
		sort_orders(&mut rows, OrderSort::Oldest);
		assert_eq!(rows[0].2.created_at, 5);
	}
}
