//! Request/response wire protocol over peer streams.
//!
//! The initiator assigns each request a reqId from a per-connection
//! monotone counter and parks a waiter; responses echo the reqId and wake
//! it. Every request carries a ten-second total timeout: on expiry the
//! waiter completes with [`NetworkError::Timeout`], the reqId is
//! abandoned, and the peer is not scored down.

use crate::{decode_frame, encode_frame, InboundFrame, NetworkError, NetworkInterface, PeerId};
use alloy_primitives::{Address, B256};
use gossip_engine::{AdmissionOptions, EngineError, OrderEngine};
use gossip_types::{
	HashQuery, Opcode, OrderQuery, OrderSort, Side, WireMessage, MAX_ORDERS_PER_RESPONSE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};

/// Protocol name spoken on peer streams.
pub const PROTOCOL_ID: &str = "/seaport-gossip/1.0.0";

/// Total per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size used when syncing a peer's order book.
const SYNC_PAGE_SIZE: u32 = 50;

/// The request/response dispatcher and handler.
pub struct WireProtocol {
	network: Arc<dyn NetworkInterface>,
	engine: Arc<OrderEngine>,
	next_req_id: AtomicU64,
	pending: Mutex<HashMap<u64, oneshot::Sender<WireMessage>>>,
	request_timeout: Duration,
	/// Peer sync aborts once the local store holds this many orders.
	max_orders: u64,
}

impl WireProtocol {
	pub fn new(
		network: Arc<dyn NetworkInterface>,
		engine: Arc<OrderEngine>,
		max_orders: u64,
	) -> Self {
		Self {
			network,
			engine,
			next_req_id: AtomicU64::new(1),
			pending: Mutex::new(HashMap::new()),
			request_timeout: REQUEST_TIMEOUT,
			max_orders,
		}
	}

	/// Overrides the per-request timeout (tests and tuning).
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	fn next_req_id(&self) -> u64 {
		self.next_req_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Requests orders by hash from a peer.
	pub async fn get_orders(
		&self,
		peer: &PeerId,
		hashes: Vec<B256>,
	) -> Result<Vec<gossip_types::Order>, NetworkError> {
		let req_id = self.next_req_id();
		let response = self
			.dispatch(peer, WireMessage::GetOrders { req_id, hashes }, Opcode::Orders)
			.await?;
		match response {
			WireMessage::Orders { orders, .. } => Ok(orders),
			_ => Err(NetworkError::UnexpectedResponse),
		}
	}

	/// Requests order hashes for a collection from a peer.
	pub async fn get_order_hashes(
		&self,
		peer: &PeerId,
		address: Address,
		query: HashQuery,
	) -> Result<Vec<B256>, NetworkError> {
		let req_id = self.next_req_id();
		let response = self
			.dispatch(
				peer,
				WireMessage::GetOrderHashes { req_id, address, query },
				Opcode::OrderHashes,
			)
			.await?;
		match response {
			WireMessage::OrderHashes { hashes, .. } => Ok(hashes),
			_ => Err(NetworkError::UnexpectedResponse),
		}
	}

	/// Requests a collection's order count from a peer.
	pub async fn get_order_count(
		&self,
		peer: &PeerId,
		address: Address,
		query: HashQuery,
	) -> Result<u64, NetworkError> {
		let req_id = self.next_req_id();
		let response = self
			.dispatch(
				peer,
				WireMessage::GetOrderCount { req_id, address, query },
				Opcode::OrderCount,
			)
			.await?;
		match response {
			WireMessage::OrderCount { count, .. } => Ok(count),
			_ => Err(NetworkError::UnexpectedResponse),
		}
	}

	/// Requests a criteria token-id set from a peer.
	pub async fn get_criteria(
		&self,
		peer: &PeerId,
		hash: B256,
	) -> Result<Vec<alloy_primitives::U256>, NetworkError> {
		let req_id = self.next_req_id();
		let response = self
			.dispatch(
				peer,
				WireMessage::GetCriteria { req_id, hash },
				Opcode::CriteriaItems,
			)
			.await?;
		match response {
			WireMessage::CriteriaItems { items, .. } => Ok(items),
			_ => Err(NetworkError::UnexpectedResponse),
		}
	}

	async fn dispatch(
		&self,
		peer: &PeerId,
		message: WireMessage,
		expect: Opcode,
	) -> Result<WireMessage, NetworkError> {
		let req_id = message.req_id();
		let (sender, receiver) = oneshot::channel();
		self.pending.lock().await.insert(req_id, sender);

		let frame = encode_frame(message.opcode(), &message.encode_body());
		if let Err(error) = self.network.send(peer, frame).await {
			self.pending.lock().await.remove(&req_id);
			return Err(error);
		}

		let response = match tokio::time::timeout(self.request_timeout, receiver).await {
			Ok(Ok(response)) => response,
			// Responder dropped or timeout: abandon the reqId.
			Ok(Err(_)) | Err(_) => {
				self.pending.lock().await.remove(&req_id);
				return Err(NetworkError::Timeout);
			},
		};
		if response.opcode() != expect {
			return Err(NetworkError::UnexpectedResponse);
		}
		Ok(response)
	}

	/// Handles one inbound stream frame: requests are answered with the
	/// echoed reqId; responses wake their waiter. Malformed frames are
	/// logged and dropped.
	pub async fn handle_frame(&self, peer: &PeerId, data: &[u8]) {
		let (opcode, body) = match decode_frame(data) {
			Ok(parts) => parts,
			Err(error) => {
				tracing::debug!(%peer, %error, "dropping malformed frame");
				return;
			},
		};
		let message = match WireMessage::decode_body(opcode, body) {
			Ok(message) => message,
			Err(error) => {
				tracing::debug!(%peer, %error, "dropping undecodable message");
				return;
			},
		};

		if opcode.is_request() {
			match self.answer(message).await {
				Ok(response) => {
					let frame = encode_frame(response.opcode(), &response.encode_body());
					if let Err(error) = self.network.send(peer, frame).await {
						tracing::debug!(%peer, %error, "failed to send response");
					}
				},
				Err(error) => {
					tracing::warn!(%peer, %error, "request handling failed");
				},
			}
			return;
		}

		// A response: wake the waiter, if it has not timed out.
		let waiter = self.pending.lock().await.remove(&message.req_id());
		match waiter {
			Some(waiter) => {
				let _ = waiter.send(message);
			},
			None => {
				tracing::debug!(%peer, req_id = message.req_id(), "response for unknown reqId");
			},
		}
	}

	async fn answer(&self, request: WireMessage) -> Result<WireMessage, EngineError> {
		let store = self.engine.store();
		let response = match request {
			WireMessage::GetOrders { req_id, hashes } => {
				// Known orders in request order, truncated to the cap;
				// misses are silently omitted.
				let orders = store
					.orders_by_hashes(&hashes, MAX_ORDERS_PER_RESPONSE)
					.await?;
				WireMessage::Orders { req_id, orders }
			},
			WireMessage::GetOrderHashes { req_id, address, query } => {
				let rows = store
					.find_orders(Some(address), &order_query(&query))
					.await?;
				WireMessage::OrderHashes {
					req_id,
					hashes: rows.into_iter().map(|(hash, _)| hash).collect(),
				}
			},
			WireMessage::GetOrderCount { req_id, address, query } => {
				let count = store
					.count_orders(Some(address), &order_query(&query))
					.await?;
				WireMessage::OrderCount { req_id, count }
			},
			WireMessage::GetCriteria { req_id, hash } => {
				let items = store
					.get_criteria(hash)
					.await?
					.map(|criteria| criteria.token_ids)
					.unwrap_or_default();
				WireMessage::CriteriaItems { req_id, hash, items }
			},
			// Responses never reach here; is_request() gates the caller.
			other => other,
		};
		Ok(response)
	}

	/// Dispatch loop over inbound frames.
	pub async fn run(
		self: Arc<Self>,
		mut frames: tokio::sync::mpsc::UnboundedReceiver<InboundFrame>,
		mut stop: broadcast::Receiver<()>,
	) {
		loop {
			tokio::select! {
				frame = frames.recv() => {
					match frame {
						Some(frame) => self.handle_frame(&frame.peer, &frame.data).await,
						None => break,
					}
				}
				_ = stop.recv() => {
					tracing::debug!("stopping wire dispatcher");
					break;
				}
			}
		}
	}

	/// Pulls a peer's full book for one collection: pages of hashes per
	/// side, oldest first, fetching and admitting unknown orders. Stops
	/// early once the local store reaches its capacity.
	pub async fn sync_orders_from_peer(
		&self,
		peer: &PeerId,
		collection: Address,
	) -> Result<usize, NetworkError> {
		let mut admitted = 0;
		for side in [Side::Sell, Side::Buy] {
			let mut offset = 0u32;
			loop {
				if self.at_capacity().await {
					tracing::debug!(%peer, "aborting peer sync at capacity");
					return Ok(admitted);
				}
				let query = HashQuery {
					side,
					sort: OrderSort::Oldest,
					count: SYNC_PAGE_SIZE,
					offset,
				};
				let hashes = self.get_order_hashes(peer, collection, query).await?;
				let page_len = hashes.len();

				let mut unknown = Vec::new();
				for hash in hashes {
					if self
						.engine
						.store()
						.get_order(hash)
						.await
						.map_err(|e| NetworkError::Transport(e.to_string()))?
						.is_none()
					{
						unknown.push(hash);
					}
				}
				if !unknown.is_empty() {
					let orders = self.get_orders(peer, unknown).await?;
					let opts = AdmissionOptions {
						validate: true,
						pin: false,
						broadcast: false,
						auction_type: None,
					};
					for result in self.engine.add_orders(orders, opts).await {
						if matches!(result, Ok(r) if r.is_new) {
							admitted += 1;
						}
					}
				}

				if page_len < SYNC_PAGE_SIZE as usize {
					break;
				}
				offset += SYNC_PAGE_SIZE;
			}
		}
		Ok(admitted)
	}

	async fn at_capacity(&self) -> bool {
		match self.engine.store().total_orders().await {
			Ok(total) => total >= self.max_orders,
			Err(_) => false,
		}
	}
}

fn order_query(query: &HashQuery) -> OrderQuery {
	OrderQuery {
		side: query.side,
		sort: query.sort,
		filters: Vec::new(),
		limit: query.count as usize,
		offset: query.offset as usize,
	}
}
