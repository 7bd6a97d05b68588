//! Per-collection gossip pipeline.
//!
//! Outbound: events from the engine's bus are encoded once and published
//! on every collection topic the order touches. Inbound: each message is
//! decoded, applied through the engine, answered with an accept/reject
//! validation report, and forwarded onward only on accept. A node never
//! rebroadcasts a message it rejected.

use crate::{collection_topic, Acceptance, GossipMessage, NetworkError, NetworkInterface};
use alloy_primitives::Address;
use gossip_engine::{AdmissionOptions, EngineError, OrderEngine};
use gossip_types::{short_hex, GossipEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// User callback invoked for every decoded inbound event.
pub type EventCallback = Box<dyn Fn(&GossipEvent) + Send + Sync>;

/// The gossip pipeline over the transport black box.
pub struct GossipLayer {
	network: Arc<dyn NetworkInterface>,
	engine: Arc<OrderEngine>,
	callbacks: RwLock<Vec<EventCallback>>,
}

impl GossipLayer {
	pub fn new(network: Arc<dyn NetworkInterface>, engine: Arc<OrderEngine>) -> Self {
		Self {
			network,
			engine,
			callbacks: RwLock::new(Vec::new()),
		}
	}

	pub fn network(&self) -> &Arc<dyn NetworkInterface> {
		&self.network
	}

	/// Registers a callback for inbound events.
	pub async fn on_event(&self, callback: EventCallback) {
		self.callbacks.write().await.push(callback);
	}

	/// Subscribes to a collection topic, returning its message stream for
	/// a receive task.
	pub async fn subscribe(
		&self,
		collection: &Address,
	) -> Result<(String, mpsc::UnboundedReceiver<GossipMessage>), NetworkError> {
		let topic = collection_topic(collection);
		let receiver = self.network.subscribe(&topic).await?;
		tracing::debug!(%topic, "subscribed");
		Ok((topic, receiver))
	}

	pub async fn unsubscribe(&self, collection: &Address) -> Result<(), NetworkError> {
		self.network.unsubscribe(&collection_topic(collection)).await
	}

	/// Publishes an event on every topic it belongs to.
	///
	/// Topics come from the carried order's items; events without an order
	/// fall back to the collections of the orders they affect locally.
	pub async fn publish_event(&self, event: &GossipEvent) {
		let topics = match self.topics_for(event).await {
			Ok(topics) => topics,
			Err(error) => {
				tracing::warn!(%error, "failed to resolve topics for event");
				return;
			},
		};
		let data = event.encode();
		for topic in topics {
			match self.network.publish(&topic, data.clone()).await {
				Ok(()) => {},
				// The router already saw this message from us.
				Err(NetworkError::Duplicate) => {},
				Err(error) => {
					tracing::warn!(%topic, %error, "publish failed");
				},
			}
		}
	}

	async fn topics_for(&self, event: &GossipEvent) -> Result<Vec<String>, EngineError> {
		if let Some(order) = event.order() {
			return Ok(order
				.collection_addresses()
				.iter()
				.map(collection_topic)
				.collect());
		}
		let collections = match event {
			GossipEvent::CounterIncremented { offerer, .. } => {
				let orders = self.engine.store().orders_by_offerer(*offerer).await?;
				let mut collections = Vec::new();
				for (_, order) in orders {
					for collection in order.collection_addresses() {
						if !collections.contains(&collection) {
							collections.push(collection);
						}
					}
				}
				collections
			},
			event => match self.engine.store().get_order(event.order_hash()).await? {
				Some(order) => order.collection_addresses(),
				None => Vec::new(),
			},
		};
		Ok(collections.iter().map(collection_topic).collect())
	}

	/// Receive loop for one subscribed topic.
	pub async fn run_topic(
		self: Arc<Self>,
		topic: String,
		mut receiver: mpsc::UnboundedReceiver<GossipMessage>,
		mut stop: broadcast::Receiver<()>,
	) {
		loop {
			tokio::select! {
				message = receiver.recv() => {
					match message {
						Some(message) => self.handle_message(&topic, message).await,
						None => break,
					}
				}
				_ = stop.recv() => {
					tracing::debug!(%topic, "stopping topic receive loop");
					break;
				}
			}
		}
	}

	/// The inbound pipeline for one message.
	pub async fn handle_message(&self, topic: &str, message: GossipMessage) {
		let event = match GossipEvent::decode(&message.data) {
			Ok(event) => event,
			Err(error) => {
				tracing::debug!(%topic, %error, "dropping undecodable gossip message");
				self.report(&message, Acceptance::Reject).await;
				return;
			},
		};

		for callback in self.callbacks.read().await.iter() {
			callback(&event);
		}

		let acceptance = match self.apply(&event).await {
			Ok(acceptance) => acceptance,
			Err(error) => {
				tracing::warn!(%topic, %error, "gossip event handling failed");
				Acceptance::Reject
			},
		};
		self.report(&message, acceptance).await;

		if acceptance == Acceptance::Accept {
			// Forward the original bytes on the arrival topic; the
			// message id is preserved so the router can deduplicate.
			match self.network.publish(topic, message.data.clone()).await {
				Ok(()) | Err(NetworkError::Duplicate) => {},
				Err(error) => {
					tracing::warn!(%topic, %error, "forward failed");
				},
			}
		}
	}

	async fn apply(&self, event: &GossipEvent) -> Result<Acceptance, EngineError> {
		let engine = &self.engine;
		match event {
			GossipEvent::CounterIncremented {
				offerer,
				new_counter,
				block_number,
				block_hash,
			} => {
				engine
					.apply_counter_increment(*offerer, *new_counter, *block_number, *block_hash)
					.await?;
				Ok(Acceptance::Accept)
			},
			GossipEvent::Fulfilled {
				order_hash,
				block_number,
				..
			} => {
				engine
					.apply_remote_fulfillment(*order_hash, *block_number)
					.await?;
				Ok(Acceptance::Accept)
			},
			GossipEvent::Validated {
				order_hash,
				block_number,
				block_hash,
				..
			} => {
				engine
					.apply_remote_validation(*order_hash, true, *block_number, *block_hash)
					.await?;
				Ok(Acceptance::Accept)
			},
			GossipEvent::Invalidated {
				order_hash,
				block_number,
				block_hash,
				..
			}
			| GossipEvent::Cancelled {
				order_hash,
				block_number,
				block_hash,
			} => {
				// Re-check locally; our own view wins the metadata write,
				// and a disagreement is rebroadcast as a correction.
				match engine.revalidate_order(*order_hash).await? {
					Some(validation) => {
						let locally_valid = validation.is_valid();
						engine
							.apply_remote_validation(
								*order_hash,
								locally_valid,
								*block_number,
								*block_hash,
							)
							.await?;
						if locally_valid {
							self.rebroadcast_validated(*order_hash).await?;
						}
					},
					None => {
						tracing::debug!(
							order = %short_hex(order_hash),
							"invalidation for unknown order"
						);
					},
				}
				Ok(Acceptance::Accept)
			},
			GossipEvent::New { order, .. } => {
				let opts = AdmissionOptions {
					validate: true,
					pin: false,
					// The original message is forwarded instead.
					broadcast: false,
					auction_type: None,
				};
				match engine.add_order(order.clone(), opts).await {
					Ok(result) if result.is_valid => Ok(Acceptance::Accept),
					Ok(result) => {
						tracing::debug!(
							order = %short_hex(&result.hash),
							errors = ?result.validation.map(|v| v.errors),
							"rejecting gossiped order"
						);
						Ok(Acceptance::Reject)
					},
					Err(EngineError::InvalidOrderData(error)) => {
						tracing::debug!(%error, "rejecting malformed gossiped order");
						Ok(Acceptance::Reject)
					},
					Err(EngineError::OrderLimitReached(scope)) => {
						tracing::debug!(scope, "rejecting gossiped order at capacity");
						Ok(Acceptance::Reject)
					},
					Err(error) => Err(error),
				}
			},
		}
	}

	/// Publishes a corrected VALIDATED event anchored at the current head.
	async fn rebroadcast_validated(&self, order_hash: alloy_primitives::B256) -> Result<(), EngineError> {
		let order = self.engine.store().get_order(order_hash).await?;
		let block_number = self.engine.chain().block_number().await?;
		let block_hash = self.engine.chain().block_hash(block_number).await?;
		self.publish_event(&GossipEvent::Validated {
			order_hash,
			order,
			block_number,
			block_hash,
		})
		.await;
		Ok(())
	}

	async fn report(&self, message: &GossipMessage, acceptance: Acceptance) {
		if let Err(error) = self
			.network
			.report_validation(&message.msg_id, &message.source, acceptance)
			.await
		{
			tracing::warn!(%error, "validation report failed");
		}
	}

	/// Drains the engine's event bus into the network until the stop
	/// signal fires.
	pub async fn run_publisher(
		self: Arc<Self>,
		mut events: broadcast::Receiver<GossipEvent>,
		mut stop: broadcast::Receiver<()>,
	) {
		loop {
			tokio::select! {
				event = events.recv() => {
					match event {
						Ok(event) => self.publish_event(&event).await,
						Err(broadcast::error::RecvError::Lagged(missed)) => {
							tracing::warn!(missed, "publisher lagged behind event bus");
						},
						Err(broadcast::error::RecvError::Closed) => break,
					}
				}
				_ = stop.recv() => {
					tracing::debug!("stopping gossip publisher");
					break;
				}
			}
		}
	}
}
