//! Settlement-contract event listener.
//!
//! Polls the chain for the four contract events and translates each into
//! an engine mutation plus an outbound gossip event. Fulfillments of
//! unknown orders are dropped; cancellations and counter bumps are
//! re-gossiped regardless, since peers may hold orders this node does not.

use crate::{EngineError, OrderEngine};
use gossip_chain::contract::ContractEvent;
use gossip_types::{short_hex, GossipEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// The chain event listener task.
pub struct ChainListener {
	engine: Arc<OrderEngine>,
	poll_interval: Duration,
}

impl ChainListener {
	pub fn new(engine: Arc<OrderEngine>, poll_interval: Duration) -> Self {
		Self {
			engine,
			poll_interval,
		}
	}

	/// Polls for new blocks until the stop signal fires.
	pub async fn run(self, mut stop: broadcast::Receiver<()>) {
		let mut last_block = match self.engine.chain().block_number().await {
			Ok(number) => number,
			Err(error) => {
				tracing::warn!(%error, "listener starting without a head block");
				0
			},
		};
		let mut ticker = tokio::time::interval(self.poll_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		ticker.tick().await;
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					let current = match self.engine.chain().block_number().await {
						Ok(number) => number,
						Err(error) => {
							tracing::warn!(%error, "failed to fetch head block");
							continue;
						},
					};
					if current <= last_block {
						continue;
					}
					match self.engine.chain().get_events(last_block + 1, current).await {
						Ok(events) => {
							for event in events {
								if let Err(error) = self.handle(event).await {
									tracing::warn!(%error, "contract event handling failed");
								}
							}
							last_block = current;
						},
						Err(error) => {
							tracing::warn!(%error, "failed to fetch contract events");
						},
					}
				}
				_ = stop.recv() => {
					tracing::debug!("stopping chain listener");
					break;
				}
			}
		}
	}

	/// Applies one contract event and emits the matching gossip event.
	pub async fn handle(&self, event: ContractEvent) -> Result<(), EngineError> {
		let engine = &self.engine;
		match event {
			ContractEvent::Fulfilled {
				order_hash,
				offer,
				consideration,
				block_number,
				block_hash,
				..
			} => {
				let known = engine
					.apply_fulfillment(order_hash, &offer, &consideration, block_number)
					.await?;
				if !known {
					tracing::debug!(order = %short_hex(&order_hash), "fulfillment for unknown order");
					return Ok(());
				}
				engine.event_bus().publish(GossipEvent::Fulfilled {
					order_hash,
					block_number,
					block_hash,
				});
			},
			ContractEvent::Cancelled {
				order_hash,
				block_number,
				block_hash,
				..
			} => {
				engine
					.apply_cancellation(order_hash, block_number, block_hash)
					.await?;
				engine.event_bus().publish(GossipEvent::Cancelled {
					order_hash,
					block_number,
					block_hash,
				});
			},
			ContractEvent::Validated {
				order_hash,
				block_number,
				block_hash,
				..
			} => {
				if engine
					.apply_validated(order_hash, block_number, block_hash)
					.await?
					.is_none()
				{
					return Ok(());
				}
				let order = engine.store().get_order(order_hash).await?;
				engine.event_bus().publish(GossipEvent::Validated {
					order_hash,
					order,
					block_number,
					block_hash,
				});
			},
			ContractEvent::CounterIncremented {
				new_counter,
				offerer,
				block_number,
				block_hash,
			} => {
				engine
					.apply_counter_increment(offerer, new_counter, block_number, block_hash)
					.await?;
				engine.event_bus().publish(GossipEvent::CounterIncremented {
					offerer,
					new_counter,
					block_number,
					block_hash,
				});
			},
		}
		Ok(())
	}
}
