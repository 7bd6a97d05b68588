//! Small shared helpers.

use alloy_primitives::B256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|duration| duration.as_secs())
		.unwrap_or(0)
}

/// Ensures a hex string carries the `0x` prefix.
pub fn with_0x_prefix(hex: &str) -> String {
	if hex.starts_with("0x") {
		hex.to_string()
	} else {
		format!("0x{}", hex)
	}
}

/// Strips a leading `0x` prefix if present.
pub fn without_0x_prefix(hex: &str) -> &str {
	hex.strip_prefix("0x").unwrap_or(hex)
}

/// Short display form of a hash for log lines.
pub fn short_hex(hash: &B256) -> String {
	let hex = hex::encode(&hash.as_slice()[..4]);
	format!("0x{}..", hex)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefix_helpers_round_trip() {
		assert_eq!(with_0x_prefix("ab"), "0xab");
		assert_eq!(with_0x_prefix("0xab"), "0xab");
		assert_eq!(without_0x_prefix("0xab"), "ab");
		assert_eq!(without_0x_prefix("ab"), "ab");
	}

	#[test]
	fn short_hex_truncates() {
		let hash = B256::repeat_byte(0xab);
		assert_eq!(short_hex(&hash), "0xabababab..");
	}
}
