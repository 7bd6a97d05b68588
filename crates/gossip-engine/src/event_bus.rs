//! Broadcast bus for outbound gossip events.
//!
//! The engine and the chain listener publish here; the node's publisher
//! task and any user callbacks subscribe. Publishing never blocks and
//! succeeds even with no subscribers.

use gossip_types::GossipEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the event bus.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<GossipEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers. Returns the number
	/// of subscribers reached; zero subscribers is not an error.
	pub fn publish(&self, event: GossipEvent) -> usize {
		self.sender.send(event).unwrap_or(0)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, B256, U256};

	#[tokio::test]
	async fn events_reach_subscribers() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();
		let event = GossipEvent::CounterIncremented {
			offerer: Address::ZERO,
			new_counter: U256::from(1),
			block_number: 1,
			block_hash: B256::ZERO,
		};
		assert_eq!(bus.publish(event.clone()), 1);
		assert_eq!(receiver.recv().await.unwrap(), event);
	}

	#[test]
	fn publish_without_subscribers_is_ok() {
		let bus = EventBus::new(8);
		let event = GossipEvent::Cancelled {
			order_hash: B256::ZERO,
			block_number: 1,
			block_hash: B256::ZERO,
		};
		assert_eq!(bus.publish(event), 0);
	}
}
