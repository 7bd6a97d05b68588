//! Shared token bucket for outbound fetches.
//!
//! Refills continuously at the configured per-second rate up to one
//! second of burst. `acquire` suspends until a token is available; the
//! caller cancels the wait by dropping the future (the ingest loop
//! selects it against the node's stop signal).

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Token bucket limiting operations per second.
pub struct RateLimiter {
	per_second: u32,
	state: Mutex<BucketState>,
}

struct BucketState {
	tokens: f64,
	last_refill: Instant,
}

impl RateLimiter {
	pub fn new(per_second: u32) -> Self {
		let per_second = per_second.max(1);
		Self {
			per_second,
			state: Mutex::new(BucketState {
				tokens: per_second as f64,
				last_refill: Instant::now(),
			}),
		}
	}

	/// Waits until a token is available and takes it.
	pub async fn acquire(&self) {
		loop {
			let wait = {
				let mut state = self.state.lock().unwrap();
				let now = Instant::now();
				let elapsed = now.duration_since(state.last_refill).as_secs_f64();
				state.tokens = (state.tokens + elapsed * self.per_second as f64)
					.min(self.per_second as f64);
				state.last_refill = now;
				if state.tokens >= 1.0 {
					state.tokens -= 1.0;
					None
				} else {
					Some(Duration::from_secs_f64(
						(1.0 - state.tokens) / self.per_second as f64,
					))
				}
			};
			match wait {
				None => return,
				Some(wait) => tokio::time::sleep(wait).await,
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn burst_then_throttle() {
		let limiter = RateLimiter::new(5);
		let start = Instant::now();
		// The initial burst is free.
		for _ in 0..5 {
			limiter.acquire().await;
		}
		assert_eq!(start.elapsed(), Duration::ZERO);

		// The sixth token takes ~200ms at 5/s.
		limiter.acquire().await;
		assert!(start.elapsed() >= Duration::from_millis(199));
		assert!(start.elapsed() < Duration::from_millis(400));
	}

	#[tokio::test(start_paused = true)]
	async fn tokens_refill_over_time() {
		let limiter = RateLimiter::new(2);
		limiter.acquire().await;
		limiter.acquire().await;
		tokio::time::advance(Duration::from_secs(1)).await;
		let start = Instant::now();
		limiter.acquire().await;
		limiter.acquire().await;
		assert_eq!(start.elapsed(), Duration::ZERO);
	}
}
