//! The Seaport gossip node.
//!
//! Wires the store, chain client, validator, engine, gossip layer, wire
//! protocol, and optional ingestor into one façade with a small public
//! API: submit orders, query the local view, manage collection
//! subscriptions, and observe events. `start` spawns the long-lived
//! tasks; `stop` cancels them in a fixed order and is idempotent.

use alloy_primitives::{Address, B256, U256};
use gossip_chain::implementations::rpc::RpcChain;
use gossip_chain::{ChainInterface, ChainService};
use gossip_config::{Config, ConfigError};
use gossip_engine::{
	AdmissionOptions, AdmissionResult, ChainListener, EventBus, Limits, OrderEngine,
	RevalidationTicker,
};
use gossip_ingest::implementations::http::HttpFeed;
use gossip_ingest::rate_limit::RateLimiter;
use gossip_ingest::Ingestor;
use gossip_net::implementations::memory::MemoryHub;
use gossip_net::{GossipLayer, NetworkInterface, WireProtocol};
use gossip_store::implementations::file::FileStore;
use gossip_store::implementations::memory::MemoryStore;
use gossip_store::{StoreError, StoreInterface, StoreService};
use gossip_types::{Criteria, GossipEvent, Order, OrderQuery};
use gossip_validation::implementations::rules::ContractRules;
use gossip_validation::{ValidationOptions, ValidationService, ValidatorInterface};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

mod api;

/// Interval between settlement-contract event polls.
const CHAIN_POLL_INTERVAL: Duration = Duration::from_secs(12);

/// Errors surfaced by the public node API.
#[derive(Debug, Error)]
pub enum NodeError {
	/// The API was called before `start` or after `stop`.
	#[error("node is not running")]
	NotRunning,
	#[error("invalid address: {0}")]
	InvalidAddress(String),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("store error: {0}")]
	Store(#[from] StoreError),
	#[error("network error: {0}")]
	Network(#[from] gossip_net::NetworkError),
	#[error("startup error: {0}")]
	Startup(String),
}

enum NodeState {
	Stopped,
	Running {
		stop: broadcast::Sender<()>,
		tasks: Vec<JoinHandle<()>>,
	},
}

/// Builder over the node's pluggable seams. Components not supplied are
/// constructed from the configuration.
pub struct NodeBuilder {
	config: Config,
	network: Option<Arc<dyn NetworkInterface>>,
	store: Option<Box<dyn StoreInterface>>,
	chain: Option<Box<dyn ChainInterface>>,
	validator: Option<Box<dyn ValidatorInterface>>,
}

impl NodeBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			network: None,
			store: None,
			chain: None,
			validator: None,
		}
	}

	pub fn with_network(mut self, network: Arc<dyn NetworkInterface>) -> Self {
		self.network = Some(network);
		self
	}

	pub fn with_store(mut self, store: Box<dyn StoreInterface>) -> Self {
		self.store = Some(store);
		self
	}

	pub fn with_chain(mut self, chain: Box<dyn ChainInterface>) -> Self {
		self.chain = Some(chain);
		self
	}

	pub fn with_validator(mut self, validator: Box<dyn ValidatorInterface>) -> Self {
		self.validator = Some(validator);
		self
	}

	pub fn build(self) -> Result<Node, NodeError> {
		let config = self.config;
		config.validate()?;

		let store_backend: Box<dyn StoreInterface> = match self.store {
			Some(store) => store,
			None if config.datadir.is_empty() => Box::new(MemoryStore::new()),
			None => Box::new(FileStore::open(Path::new(&config.datadir))?),
		};
		let store = Arc::new(StoreService::new(store_backend));
		tracing::info!(component = "store", "Loaded");

		let chain_backend: Box<dyn ChainInterface> = match self.chain {
			Some(chain) => chain,
			None => Box::new(
				RpcChain::new(&config.chain_provider, config.settlement_contract()?)
					.map_err(|e| NodeError::Startup(e.to_string()))?,
			),
		};
		let chain = Arc::new(ChainService::new(chain_backend));
		tracing::info!(component = "chain", "Loaded");

		let validator_backend: Box<dyn ValidatorInterface> = match self.validator {
			Some(validator) => validator,
			None => Box::new(ContractRules::new(
				chain.clone(),
				config.max_order_start_time,
				config.max_order_end_time,
				config.fee_recipient()?,
			)),
		};
		let validator = Arc::new(ValidationService::new(
			validator_backend,
			ValidationOptions {
				lazy_mint_adapter: config.lazy_mint_adapter()?,
			},
		));
		tracing::info!(component = "validator", "Loaded");

		// Until a transport is wired in, a solitary in-memory hub keeps
		// the node functional without peers.
		let network = match self.network {
			Some(network) => network,
			None => MemoryHub::new().register("local") as Arc<dyn NetworkInterface>,
		};
		tracing::info!(component = "network", peer = %network.local_peer(), "Loaded");

		let engine = Arc::new(OrderEngine::new(
			store.clone(),
			chain.clone(),
			validator,
			EventBus::default(),
			Limits {
				max_orders: config.max_orders,
				max_orders_per_offerer: config.max_orders_per_offerer,
			},
		));
		let gossip = Arc::new(GossipLayer::new(network.clone(), engine.clone()));
		let wire = Arc::new(WireProtocol::new(
			network.clone(),
			engine.clone(),
			config.max_orders,
		));

		Ok(Node {
			config,
			store,
			engine,
			gossip,
			wire,
			network,
			state: Mutex::new(NodeState::Stopped),
		})
	}
}

/// A running (or stopped) Seaport gossip node.
pub struct Node {
	config: Config,
	store: Arc<StoreService>,
	engine: Arc<OrderEngine>,
	gossip: Arc<GossipLayer>,
	wire: Arc<WireProtocol>,
	network: Arc<dyn NetworkInterface>,
	state: Mutex<NodeState>,
}

impl Node {
	pub fn builder(config: Config) -> NodeBuilder {
		NodeBuilder::new(config)
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn engine(&self) -> &Arc<OrderEngine> {
		&self.engine
	}

	pub fn wire(&self) -> &Arc<WireProtocol> {
		&self.wire
	}

	pub fn network(&self) -> &Arc<dyn NetworkInterface> {
		&self.network
	}

	/// Spawns every long-lived task. A second start is a no-op.
	pub async fn start(&self) -> Result<(), NodeError> {
		let mut state = self.state.lock().await;
		if matches!(*state, NodeState::Running { .. }) {
			return Ok(());
		}
		let (stop, _) = broadcast::channel(8);
		let mut tasks = Vec::new();

		// Revalidation ticker.
		let ticker = RevalidationTicker::new(
			self.engine.clone(),
			Duration::from_secs(self.config.revalidate_interval),
			self.config.revalidate_block_distance,
			self.config.revalidate_batch_size,
		);
		tasks.push(tokio::spawn(ticker.run(stop.subscribe())));

		// Optional external feed.
		if self.config.ingest_external_orders {
			let limiter = Arc::new(RateLimiter::new(self.config.ingest_requests_per_second));
			let feed = HttpFeed::new(
				self.config.external_api_url.clone(),
				self.config.external_api_key.clone(),
				self.config.collections()?,
				limiter,
			);
			let ingestor = Ingestor::new(self.engine.clone(), Box::new(feed));
			tasks.push(tokio::spawn(ingestor.run(stop.subscribe())));
			tracing::info!(component = "ingestor", "Loaded");
		}

		// Settlement-contract listener.
		let listener = ChainListener::new(self.engine.clone(), CHAIN_POLL_INTERVAL);
		tasks.push(tokio::spawn(listener.run(stop.subscribe())));

		// Gossip: one receive task per configured collection, plus the
		// outbound publisher.
		for collection in self.config.collections()? {
			let (topic, receiver) = self.gossip.subscribe(&collection).await?;
			tasks.push(tokio::spawn(self.gossip.clone().run_topic(
				topic,
				receiver,
				stop.subscribe(),
			)));
		}
		tasks.push(tokio::spawn(self.gossip.clone().run_publisher(
			self.engine.event_bus().subscribe(),
			stop.subscribe(),
		)));

		// Wire protocol dispatcher.
		let frames = self.network.incoming().await?;
		tasks.push(tokio::spawn(self.wire.clone().run(frames, stop.subscribe())));

		// Optional read API.
		if self.config.api_enabled {
			let router = api::router(self.store.clone());
			let addr = format!("{}:{}", self.config.hostname, self.config.api_port);
			let mut shutdown = stop.subscribe();
			let listener = tokio::net::TcpListener::bind(&addr)
				.await
				.map_err(|e| NodeError::Startup(format!("api bind failed: {}", e)))?;
			tracing::info!(component = "api", %addr, "Loaded");
			tasks.push(tokio::spawn(async move {
				let server = axum::serve(listener, router).with_graceful_shutdown(async move {
					let _ = shutdown.recv().await;
				});
				if let Err(error) = server.await {
					tracing::error!(%error, "read API failed");
				}
			}));
		}

		tracing::info!(peer = %self.network.local_peer(), "node started");
		*state = NodeState::Running { stop, tasks };
		Ok(())
	}

	/// Cancels all tasks (ticker, ingestor, chain listener, gossip, wire,
	/// network) and closes the store. Idempotent.
	pub async fn stop(&self) -> Result<(), NodeError> {
		let mut state = self.state.lock().await;
		let NodeState::Running { stop, tasks } =
			std::mem::replace(&mut *state, NodeState::Stopped)
		else {
			return Ok(());
		};
		let _ = stop.send(());
		for task in tasks {
			if let Err(error) = task.await {
				if !error.is_cancelled() {
					tracing::warn!(%error, "task ended abnormally");
				}
			}
		}
		self.store.close().await?;
		tracing::info!("node stopped");
		Ok(())
	}

	async fn require_running(&self) -> Result<(), NodeError> {
		match *self.state.lock().await {
			NodeState::Running { .. } => Ok(()),
			NodeState::Stopped => Err(NodeError::NotRunning),
		}
	}

	/// Submits locally originated orders. Per-order failures are logged
	/// and reported in the result; the batch never aborts early.
	pub async fn add_orders(
		&self,
		orders: Vec<Order>,
		pin: bool,
	) -> Result<Vec<Result<AdmissionResult, gossip_engine::EngineError>>, NodeError> {
		self.require_running().await?;
		let opts = AdmissionOptions {
			validate: true,
			pin,
			broadcast: true,
			auction_type: None,
		};
		Ok(self.engine.add_orders(orders, opts).await)
	}

	pub async fn get_order_by_hash(&self, hash: B256) -> Result<Option<Order>, NodeError> {
		self.require_running().await?;
		Ok(self.store.get_order(hash).await?)
	}

	/// Collection-scoped listing. The collection is given as a hex
	/// address string; anything unparsable is an [`NodeError::InvalidAddress`].
	pub async fn get_orders(
		&self,
		collection: &str,
		query: &OrderQuery,
	) -> Result<Vec<Order>, NodeError> {
		self.require_running().await?;
		let collection = parse_address(collection)?;
		let rows = self.store.find_orders(Some(collection), query).await?;
		Ok(rows.into_iter().map(|(_, order)| order).collect())
	}

	pub async fn get_order_count(
		&self,
		collection: &str,
		query: &OrderQuery,
	) -> Result<u64, NodeError> {
		self.require_running().await?;
		let collection = parse_address(collection)?;
		Ok(self.store.count_orders(Some(collection), query).await?)
	}

	/// Stores a criteria set and returns it with its derived root.
	pub async fn add_criteria(
		&self,
		token: &str,
		token_ids: Vec<U256>,
	) -> Result<Criteria, NodeError> {
		self.require_running().await?;
		let token = parse_address(token)?;
		let criteria = Criteria::new(token, token_ids);
		self.store.upsert_criteria(criteria.clone()).await?;
		Ok(criteria)
	}

	pub async fn get_criteria(&self, hash: B256) -> Result<Option<Criteria>, NodeError> {
		self.require_running().await?;
		Ok(self.store.get_criteria(hash).await?)
	}

	/// Subscribes to a collection topic at runtime.
	pub async fn subscribe(&self, collection: &str) -> Result<(), NodeError> {
		let collection = parse_address(collection)?;
		let state = self.state.lock().await;
		let NodeState::Running { stop, .. } = &*state else {
			return Err(NodeError::NotRunning);
		};
		let (topic, receiver) = self.gossip.subscribe(&collection).await?;
		tokio::spawn(self.gossip.clone().run_topic(topic, receiver, stop.subscribe()));
		Ok(())
	}

	pub async fn unsubscribe(&self, collection: &str) -> Result<(), NodeError> {
		self.require_running().await?;
		let collection = parse_address(collection)?;
		self.gossip.unsubscribe(&collection).await?;
		Ok(())
	}

	/// Registers a callback for inbound gossip events.
	pub async fn on_event(&self, callback: impl Fn(&GossipEvent) + Send + Sync + 'static) {
		self.gossip.on_event(Box::new(callback)).await;
	}

	/// Pulls a peer's order book for every configured collection.
	pub async fn sync_from_peer(&self, peer: &gossip_net::PeerId) -> Result<usize, NodeError> {
		self.require_running().await?;
		let mut admitted = 0;
		for collection in self.config.collections()? {
			admitted += self.wire.sync_orders_from_peer(peer, collection).await?;
		}
		Ok(admitted)
	}
}

fn parse_address(value: &str) -> Result<Address, NodeError> {
	value
		.parse::<Address>()
		.map_err(|_| NodeError::InvalidAddress(value.to_string()))
}
