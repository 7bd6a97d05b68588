//! Periodic staleness revalidation.
//!
//! Every tick, the oldest-validated metadata rows below the staleness
//! threshold are re-checked: validity flips are gossiped, finished orders
//! (fulfilled, cancelled, expired) that are unpinned and stale are deleted
//! transactionally, everything else gets a fresh validation stamp.

use crate::{EngineError, OrderEngine};
use gossip_types::{short_hex, GossipEvent, MetadataPatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Counters for one revalidation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationStats {
	pub checked: usize,
	pub flipped: usize,
	pub deleted: usize,
	pub errors: usize,
}

/// The revalidation ticker task.
pub struct RevalidationTicker {
	engine: Arc<OrderEngine>,
	interval: Duration,
	block_distance: u64,
	batch_size: usize,
}

impl RevalidationTicker {
	pub fn new(
		engine: Arc<OrderEngine>,
		interval: Duration,
		block_distance: u64,
		batch_size: usize,
	) -> Self {
		Self {
			engine,
			interval,
			block_distance,
			batch_size,
		}
	}

	/// Runs until the stop signal fires.
	pub async fn run(self, mut stop: broadcast::Receiver<()>) {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		// Skip the immediate first tick.
		ticker.tick().await;
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					match self.tick().await {
						Ok(stats) if stats.checked > 0 => {
							tracing::debug!(?stats, "revalidation pass");
						},
						Ok(_) => {},
						Err(error) => {
							tracing::warn!(%error, "revalidation pass failed");
						},
					}
				}
				_ = stop.recv() => {
					tracing::debug!("stopping revalidation ticker");
					break;
				}
			}
		}
	}

	/// One revalidation pass.
	pub async fn tick(&self) -> Result<RevalidationStats, EngineError> {
		let engine = &self.engine;
		let current_block = engine.chain().block_number().await?;
		let threshold = current_block.saturating_sub(self.block_distance);
		let rows = engine
			.store()
			.list_stale_metadata(threshold, self.batch_size)
			.await?;
		let block_hash = engine.chain().block_hash(current_block).await?;

		let mut stats = RevalidationStats::default();
		for (hash, metadata) in rows {
			stats.checked += 1;
			match self
				.revalidate_one(hash, metadata.is_valid, metadata.is_pinned, current_block, block_hash)
				.await
			{
				Ok((flipped, deleted)) => {
					stats.flipped += flipped as usize;
					stats.deleted += deleted as usize;
				},
				Err(error) => {
					// One bad order never aborts the batch.
					stats.errors += 1;
					tracing::warn!(order = %short_hex(&hash), %error, "revalidation failed");
				},
			}
		}
		Ok(stats)
	}

	async fn revalidate_one(
		&self,
		hash: alloy_primitives::B256,
		was_valid: bool,
		is_pinned: bool,
		current_block: u64,
		block_hash: alloy_primitives::B256,
	) -> Result<(bool, bool), EngineError> {
		let engine = &self.engine;
		let Some(validation) = engine.revalidate_order(hash).await? else {
			return Ok((false, false));
		};
		let now_valid = validation.is_valid();

		let flipped = now_valid != was_valid;
		if flipped {
			let order = engine.store().get_order(hash).await?;
			let event = if now_valid {
				GossipEvent::Validated {
					order_hash: hash,
					order,
					block_number: current_block,
					block_hash,
				}
			} else {
				GossipEvent::Invalidated {
					order_hash: hash,
					order,
					block_number: current_block,
					block_hash,
				}
			};
			engine.event_bus().publish(event);
		}

		// The row came from the stale listing, so the block-distance
		// condition already holds.
		if validation.is_terminal() && !is_pinned {
			engine.store().delete_order(hash).await?;
			tracing::debug!(order = %short_hex(&hash), "deleted finished order");
			return Ok((flipped, true));
		}

		engine
			.store()
			.update_metadata(
				hash,
				&MetadataPatch::validated(now_valid, current_block, block_hash),
			)
			.await?;
		Ok((flipped, false))
	}
}
