//! HTTP polling feed implementation.
//!
//! Rotates through the configured collections, fetching each one's
//! recent orders from the external API. Every fetch takes a token from
//! the shared rate limiter first, so the outbound budget holds across
//! collections.

use crate::rate_limit::RateLimiter;
use crate::{ForeignOrder, IngestError, OrderFeed};
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct OrdersResponse {
	orders: Vec<ForeignOrder>,
}

/// Feed polling an external marketplace API over HTTP.
pub struct HttpFeed {
	client: reqwest::Client,
	base_url: String,
	api_key: String,
	collections: Vec<Address>,
	next_collection: usize,
	limiter: Arc<RateLimiter>,
}

impl HttpFeed {
	pub fn new(
		base_url: impl Into<String>,
		api_key: impl Into<String>,
		collections: Vec<Address>,
		limiter: Arc<RateLimiter>,
	) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
			api_key: api_key.into(),
			collections,
			next_collection: 0,
			limiter,
		}
	}

	async fn fetch(&self, collection: &Address) -> Result<Vec<ForeignOrder>, IngestError> {
		let url = format!("{}/orders", self.base_url.trim_end_matches('/'));
		let mut request = self
			.client
			.get(&url)
			.query(&[("asset_contract_address", format!("0x{}", hex::encode(collection)))]);
		if !self.api_key.is_empty() {
			request = request.header("X-API-KEY", &self.api_key);
		}
		let response = request
			.send()
			.await
			.map_err(|e| IngestError::Fetch(e.to_string()))?;
		if !response.status().is_success() {
			return Err(IngestError::Fetch(format!(
				"status {} from external API",
				response.status()
			)));
		}
		let body: OrdersResponse = response
			.json()
			.await
			.map_err(|e| IngestError::Fetch(e.to_string()))?;
		Ok(body.orders)
	}
}

#[async_trait]
impl OrderFeed for HttpFeed {
	async fn next_orders(&mut self) -> Result<Option<Vec<ForeignOrder>>, IngestError> {
		if self.collections.is_empty() {
			return Ok(None);
		}
		self.limiter.acquire().await;
		let collection = self.collections[self.next_collection % self.collections.len()];
		self.next_collection = self.next_collection.wrapping_add(1);
		match self.fetch(&collection).await {
			Ok(orders) => {
				if !orders.is_empty() {
					tracing::debug!(
						collection = %collection,
						count = orders.len(),
						"fetched external orders"
					);
				}
				Ok(Some(orders))
			},
			Err(error) => Err(error),
		}
	}
}
