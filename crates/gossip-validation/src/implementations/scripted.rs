//! Scriptable validator for tests.

use crate::{Validation, ValidatorError, ValidatorInterface};
use alloy_primitives::B256;
use async_trait::async_trait;
use gossip_types::Order;
use std::collections::HashMap;
use std::sync::Mutex;

/// Validator returning pre-scripted results per order hash, with a
/// configurable default.
#[derive(Default)]
pub struct ScriptedValidator {
	default: Mutex<Validation>,
	by_hash: Mutex<HashMap<B256, Validation>>,
}

impl ScriptedValidator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_default(&self, validation: Validation) {
		*self.default.lock().unwrap() = validation;
	}

	pub fn set_result(&self, order_hash: B256, validation: Validation) {
		self.by_hash.lock().unwrap().insert(order_hash, validation);
	}
}

#[async_trait]
impl ValidatorInterface for ScriptedValidator {
	async fn validate(&self, order: &Order) -> Result<Validation, ValidatorError> {
		let hash = gossip_types::order_hash(order);
		if let Some(validation) = self.by_hash.lock().unwrap().get(&hash) {
			return Ok(validation.clone());
		}
		Ok(self.default.lock().unwrap().clone())
	}
}

// Tests keep an `Arc<ScriptedValidator>` to adjust results after handing
// the validator to a service.
#[async_trait]
impl ValidatorInterface for std::sync::Arc<ScriptedValidator> {
	async fn validate(&self, order: &Order) -> Result<Validation, ValidatorError> {
		self.as_ref().validate(order).await
	}
}
