//! In-memory transport hub for tests.
//!
//! Models an explicit topology: messages only travel over connected
//! links, publishes deduplicate by message id exactly like the real
//! router, and validation reports accumulate per-peer scores. This is
//! what lets multi-node propagation semantics run in-process.

use crate::{
	message_id, Acceptance, GossipMessage, InboundFrame, NetworkError, NetworkInterface, PeerId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct NodeState {
	topics: HashMap<String, mpsc::UnboundedSender<GossipMessage>>,
	inbound: Option<mpsc::UnboundedSender<InboundFrame>>,
	/// Ids this node has itself published or forwarded.
	published: HashSet<Vec<u8>>,
	/// Ids delivered to this node.
	delivered: HashSet<Vec<u8>>,
	scores: HashMap<PeerId, i64>,
}

#[derive(Default)]
struct HubInner {
	nodes: HashMap<PeerId, NodeState>,
	links: HashSet<(PeerId, PeerId)>,
}

/// The shared hub all in-memory networks attach to.
#[derive(Default)]
pub struct MemoryHub {
	inner: Mutex<HubInner>,
}

fn link_key(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
	if a <= b {
		(a.clone(), b.clone())
	} else {
		(b.clone(), a.clone())
	}
}

impl MemoryHub {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Attaches a node to the hub under the given name.
	pub fn register(self: &Arc<Self>, name: &str) -> Arc<MemoryNetwork> {
		let peer = PeerId::from(name);
		self.inner
			.lock()
			.unwrap()
			.nodes
			.insert(peer.clone(), NodeState::default());
		Arc::new(MemoryNetwork {
			hub: self.clone(),
			peer,
		})
	}

	/// Connects two nodes bidirectionally.
	pub fn connect(&self, a: &PeerId, b: &PeerId) {
		self.inner.lock().unwrap().links.insert(link_key(a, b));
	}

	fn is_connected(inner: &HubInner, a: &PeerId, b: &PeerId) -> bool {
		inner.links.contains(&link_key(a, b))
	}
}

/// One node's view of the hub.
pub struct MemoryNetwork {
	hub: Arc<MemoryHub>,
	peer: PeerId,
}

#[async_trait]
impl NetworkInterface for MemoryNetwork {
	fn local_peer(&self) -> PeerId {
		self.peer.clone()
	}

	async fn subscribe(
		&self,
		topic: &str,
	) -> Result<mpsc::UnboundedReceiver<GossipMessage>, NetworkError> {
		let (sender, receiver) = mpsc::unbounded_channel();
		let mut inner = self.hub.inner.lock().unwrap();
		let node = inner
			.nodes
			.get_mut(&self.peer)
			.ok_or_else(|| NetworkError::Transport("node not registered".into()))?;
		node.topics.insert(topic.to_string(), sender);
		Ok(receiver)
	}

	async fn unsubscribe(&self, topic: &str) -> Result<(), NetworkError> {
		let mut inner = self.hub.inner.lock().unwrap();
		if let Some(node) = inner.nodes.get_mut(&self.peer) {
			node.topics.remove(topic);
		}
		Ok(())
	}

	async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), NetworkError> {
		let msg_id = message_id(topic, &data);
		let mut inner = self.hub.inner.lock().unwrap();

		let node = inner
			.nodes
			.get_mut(&self.peer)
			.ok_or_else(|| NetworkError::Transport("node not registered".into()))?;
		if !node.published.insert(msg_id.clone()) {
			return Err(NetworkError::Duplicate);
		}

		// Deliver over direct links to subscribed peers that have not yet
		// seen the message.
		let mut targets = Vec::new();
		for (peer, state) in inner.nodes.iter() {
			if *peer == self.peer || !state.topics.contains_key(topic) {
				continue;
			}
			if MemoryHub::is_connected(&inner, peer, &self.peer) {
				targets.push(peer.clone());
			}
		}
		for target in targets {
			let Some(state) = inner.nodes.get_mut(&target) else {
				continue;
			};
			if state.published.contains(&msg_id) || !state.delivered.insert(msg_id.clone()) {
				continue;
			}
			if let Some(sender) = state.topics.get(topic) {
				let _ = sender.send(GossipMessage {
					source: self.peer.clone(),
					msg_id: msg_id.clone(),
					topic: topic.to_string(),
					data: data.clone(),
				});
			}
		}
		Ok(())
	}

	async fn report_validation(
		&self,
		_msg_id: &[u8],
		source: &PeerId,
		acceptance: Acceptance,
	) -> Result<(), NetworkError> {
		let mut inner = self.hub.inner.lock().unwrap();
		let node = inner
			.nodes
			.get_mut(&self.peer)
			.ok_or_else(|| NetworkError::Transport("node not registered".into()))?;
		let score = node.scores.entry(source.clone()).or_insert(0);
		match acceptance {
			Acceptance::Accept => *score += 1,
			Acceptance::Reject => *score -= 10,
		}
		Ok(())
	}

	async fn send(&self, peer: &PeerId, data: Vec<u8>) -> Result<(), NetworkError> {
		let inner = self.hub.inner.lock().unwrap();
		if !MemoryHub::is_connected(&inner, &self.peer, peer) {
			return Err(NetworkError::NotConnected(peer.clone()));
		}
		let sender = inner
			.nodes
			.get(peer)
			.and_then(|state| state.inbound.clone())
			.ok_or_else(|| NetworkError::NotConnected(peer.clone()))?;
		sender
			.send(InboundFrame {
				peer: self.peer.clone(),
				data,
			})
			.map_err(|_| NetworkError::NotConnected(peer.clone()))
	}

	async fn incoming(&self) -> Result<mpsc::UnboundedReceiver<InboundFrame>, NetworkError> {
		let (sender, receiver) = mpsc::unbounded_channel();
		let mut inner = self.hub.inner.lock().unwrap();
		let node = inner
			.nodes
			.get_mut(&self.peer)
			.ok_or_else(|| NetworkError::Transport("node not registered".into()))?;
		node.inbound = Some(sender);
		Ok(receiver)
	}

	async fn peers(&self) -> Result<Vec<PeerId>, NetworkError> {
		let inner = self.hub.inner.lock().unwrap();
		let mut peers = Vec::new();
		for peer in inner.nodes.keys() {
			if *peer != self.peer && MemoryHub::is_connected(&inner, peer, &self.peer) {
				peers.push(peer.clone());
			}
		}
		Ok(peers)
	}

	async fn score(&self, peer: &PeerId) -> Result<i64, NetworkError> {
		let inner = self.hub.inner.lock().unwrap();
		Ok(inner
			.nodes
			.get(&self.peer)
			.and_then(|state| state.scores.get(peer).copied())
			.unwrap_or(0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn publish_reaches_connected_subscribers_only() {
		let hub = MemoryHub::new();
		let a = hub.register("a");
		let b = hub.register("b");
		let c = hub.register("c");
		hub.connect(&a.local_peer(), &b.local_peer());

		let mut b_rx = b.subscribe("t").await.unwrap();
		let mut c_rx = c.subscribe("t").await.unwrap();
		a.publish("t", vec![1, 2, 3]).await.unwrap();

		let message = b_rx.recv().await.unwrap();
		assert_eq!(message.data, vec![1, 2, 3]);
		assert_eq!(message.source, a.local_peer());
		// c is not connected to a.
		assert!(c_rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn republishing_own_message_is_duplicate() {
		let hub = MemoryHub::new();
		let a = hub.register("a");
		assert!(a.publish("t", vec![9]).await.is_ok());
		assert!(matches!(
			a.publish("t", vec![9]).await,
			Err(NetworkError::Duplicate)
		));
	}

	#[tokio::test]
	async fn forwarding_propagates_without_loops() {
		let hub = MemoryHub::new();
		let a = hub.register("a");
		let b = hub.register("b");
		let c = hub.register("c");
		hub.connect(&a.local_peer(), &b.local_peer());
		hub.connect(&b.local_peer(), &c.local_peer());

		let mut b_rx = b.subscribe("t").await.unwrap();
		let mut c_rx = c.subscribe("t").await.unwrap();
		let _a_rx = a.subscribe("t").await.unwrap();

		a.publish("t", vec![7]).await.unwrap();
		let message = b_rx.recv().await.unwrap();
		// b forwards: c receives, a does not get an echo.
		b.publish(&message.topic, message.data).await.unwrap();
		assert_eq!(c_rx.recv().await.unwrap().data, vec![7]);

		// c forwards in turn; nobody unseen remains and no loop forms.
		let message = c_rx.try_recv();
		assert!(message.is_err());
	}

	#[tokio::test]
	async fn rejection_lowers_score() {
		let hub = MemoryHub::new();
		let a = hub.register("a");
		let b = hub.register("b");
		hub.connect(&a.local_peer(), &b.local_peer());

		b.report_validation(&[1], &a.local_peer(), Acceptance::Reject)
			.await
			.unwrap();
		assert_eq!(b.score(&a.local_peer()).await.unwrap(), -10);
		b.report_validation(&[2], &a.local_peer(), Acceptance::Accept)
			.await
			.unwrap();
		assert_eq!(b.score(&a.local_peer()).await.unwrap(), -9);
	}

	#[tokio::test]
	async fn send_requires_a_link() {
		let hub = MemoryHub::new();
		let a = hub.register("a");
		let b = hub.register("b");
		assert!(matches!(
			a.send(&b.local_peer(), vec![1]).await,
			Err(NetworkError::NotConnected(_))
		));

		hub.connect(&a.local_peer(), &b.local_peer());
		let mut inbound = b.incoming().await.unwrap();
		a.send(&b.local_peer(), vec![1]).await.unwrap();
		let frame = inbound.recv().await.unwrap();
		assert_eq!(frame.peer, a.local_peer());
		assert_eq!(frame.data, vec![1]);
	}
}
