//! Configuration schema validation.
//!
//! Implementations constructed from raw TOML tables (stores, chain
//! clients, feeds) declare their recognized keys and the constraint each
//! value must satisfy, so a misconfiguration fails at startup naming the
//! offending key's full dotted path instead of surfacing later as a
//! runtime error.

use thiserror::Error;

/// Errors produced while checking a TOML configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
	#[error("missing required field: {0}")]
	Missing(String),
	#[error("invalid value for '{path}': {reason}")]
	Invalid { path: String, reason: String },
}

/// What a configuration value must look like.
#[derive(Debug)]
pub enum Constraint {
	/// Any string.
	Text,
	/// A 20-byte hex address, with or without the `0x` prefix.
	Address,
	/// A non-negative integer with an optional upper bound.
	UnsignedInt { max: Option<u64> },
	/// A boolean.
	Flag,
	/// An array of strings.
	TextList,
	/// A nested table with its own schema. Errors from inside carry the
	/// outer key's path as a prefix.
	Nested(Schema),
}

impl Constraint {
	fn check(&self, path: &str, value: &toml::Value) -> Result<(), SchemaError> {
		let invalid = |reason: String| SchemaError::Invalid {
			path: path.to_string(),
			reason,
		};
		match self {
			Self::Text => {
				if value.as_str().is_none() {
					return Err(invalid("expected a string".into()));
				}
			},
			Self::Address => {
				let Some(text) = value.as_str() else {
					return Err(invalid("expected an address string".into()));
				};
				let digits = text.strip_prefix("0x").unwrap_or(text);
				if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
					return Err(invalid(format!("'{}' is not a 20-byte hex address", text)));
				}
			},
			Self::UnsignedInt { max } => {
				let Some(int) = value.as_integer() else {
					return Err(invalid("expected an integer".into()));
				};
				if int < 0 {
					return Err(invalid(format!("{} is negative", int)));
				}
				if let Some(max) = max {
					if int as u64 > *max {
						return Err(invalid(format!("{} is above maximum {}", int, max)));
					}
				}
			},
			Self::Flag => {
				if value.as_bool().is_none() {
					return Err(invalid("expected a boolean".into()));
				}
			},
			Self::TextList => {
				let Some(array) = value.as_array() else {
					return Err(invalid("expected an array of strings".into()));
				};
				for (index, element) in array.iter().enumerate() {
					if element.as_str().is_none() {
						return Err(SchemaError::Invalid {
							path: format!("{}[{}]", path, index),
							reason: "expected a string".into(),
						});
					}
				}
			},
			Self::Nested(schema) => {
				if !value.is_table() {
					return Err(invalid("expected a table".into()));
				}
				schema.check_at(path, value)?;
			},
		}
		Ok(())
	}
}

/// One recognized configuration key.
#[derive(Debug)]
pub struct Key {
	name: &'static str,
	required: bool,
	constraint: Constraint,
}

impl Key {
	pub fn required(name: &'static str, constraint: Constraint) -> Self {
		Self {
			name,
			required: true,
			constraint,
		}
	}

	pub fn optional(name: &'static str, constraint: Constraint) -> Self {
		Self {
			name,
			required: false,
			constraint,
		}
	}
}

/// The recognized keys of one configuration table.
#[derive(Debug)]
pub struct Schema {
	keys: Vec<Key>,
}

impl Schema {
	pub fn new(keys: Vec<Key>) -> Self {
		Self { keys }
	}

	/// Checks a TOML table against this schema.
	pub fn check(&self, config: &toml::Value) -> Result<(), SchemaError> {
		self.check_at("", config)
	}

	fn check_at(&self, prefix: &str, config: &toml::Value) -> Result<(), SchemaError> {
		for key in &self.keys {
			let path = if prefix.is_empty() {
				key.name.to_string()
			} else {
				format!("{}.{}", prefix, key.name)
			};
			match config.get(key.name) {
				Some(value) => key.constraint.check(&path, value)?,
				None if key.required => return Err(SchemaError::Missing(path)),
				None => {},
			}
		}
		Ok(())
	}
}

/// Schema exposed by a configurable implementation.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(vec![
			Key::required("url", Constraint::Text),
			Key::optional("limit", Constraint::UnsignedInt { max: Some(100) }),
			Key::optional("contract", Constraint::Address),
			Key::optional(
				"feed",
				Constraint::Nested(Schema::new(vec![Key::required(
					"api_key",
					Constraint::Text,
				)])),
			),
		])
	}

	#[test]
	fn missing_required_key_names_it() {
		let config: toml::Value = toml::from_str("limit = 5").unwrap();
		assert_eq!(
			schema().check(&config),
			Err(SchemaError::Missing("url".to_string()))
		);
	}

	#[test]
	fn nested_errors_carry_the_dotted_path() {
		let config: toml::Value = toml::from_str("url = \"x\"\n[feed]\nother = 1").unwrap();
		assert_eq!(
			schema().check(&config),
			Err(SchemaError::Missing("feed.api_key".to_string()))
		);
	}

	#[test]
	fn out_of_range_integer_fails() {
		let config: toml::Value = toml::from_str("url = \"x\"\nlimit = 101").unwrap();
		assert!(matches!(
			schema().check(&config),
			Err(SchemaError::Invalid { path, .. }) if path == "limit"
		));
	}

	#[test]
	fn negative_integer_fails() {
		let config: toml::Value = toml::from_str("url = \"x\"\nlimit = -1").unwrap();
		assert!(matches!(
			schema().check(&config),
			Err(SchemaError::Invalid { path, .. }) if path == "limit"
		));
	}

	#[test]
	fn address_constraint_accepts_both_prefix_forms() {
		let bare = format!("url = \"x\"\ncontract = \"{}\"", "ab".repeat(20));
		let config: toml::Value = toml::from_str(&bare).unwrap();
		assert!(schema().check(&config).is_ok());

		let prefixed = format!("url = \"x\"\ncontract = \"0x{}\"", "ab".repeat(20));
		let config: toml::Value = toml::from_str(&prefixed).unwrap();
		assert!(schema().check(&config).is_ok());

		let config: toml::Value = toml::from_str("url = \"x\"\ncontract = \"0x123\"").unwrap();
		assert!(matches!(
			schema().check(&config),
			Err(SchemaError::Invalid { path, .. }) if path == "contract"
		));
	}

	#[test]
	fn text_list_errors_name_the_element() {
		let schema = Schema::new(vec![Key::required("peers", Constraint::TextList)]);
		let config: toml::Value = toml::from_str("peers = [\"a\", 2]").unwrap();
		assert!(matches!(
			schema.check(&config),
			Err(SchemaError::Invalid { path, .. }) if path == "peers[1]"
		));
	}

	#[test]
	fn valid_config_passes() {
		let config: toml::Value =
			toml::from_str("url = \"x\"\nlimit = 100\n[feed]\napi_key = \"k\"").unwrap();
		assert!(schema().check(&config).is_ok());
	}
}
