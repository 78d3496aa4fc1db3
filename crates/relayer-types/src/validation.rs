//! Schema checks for the relayer's TOML configuration.
//!
//! A [`Schema`] lists required and optional [`Field`]s; each field has a
//! type and an optional custom validator. Validation runs on the merged
//! `toml::Value` before it is deserialized, so a missing key is reported by
//! name instead of as a serde error.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	Table(Schema),
}

/// Type alias for field validator functions.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A field definition with name and type.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Schema definition with required and optional fields.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	pub fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let table = config.as_table().ok_or_else(|| SchemaError::TypeMismatch {
			field: "root".to_string(),
			expected: "table".to_string(),
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| SchemaError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), SchemaError> {
	validate_field_type(&field.name, value, &field.field_type)?;

	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| SchemaError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}

	Ok(())
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), SchemaError> {
	let mismatch = |expected: &str| SchemaError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	};

	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch("string"));
			}
		}
		FieldType::Integer { min, max } => {
			let int_val = value.as_integer().ok_or_else(|| mismatch("integer"))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(SchemaError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}

			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(SchemaError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		}
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch("boolean"));
			}
		}
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				SchemaError::MissingField(f) => {
					SchemaError::MissingField(format!("{}.{}", field_name, f))
				}
				SchemaError::InvalidValue { field, message } => SchemaError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				SchemaError::TypeMismatch {
					field,
					expected,
					actual,
				} => SchemaError::TypeMismatch {
					field: format!("{}.{}", field_name, field),
					expected,
					actual,
				},
			})?;
		}
	}

	Ok(())
}

/// Validator for `0x`-prefixed 20-byte hex addresses.
pub fn validate_address(value: &toml::Value) -> Result<(), String> {
	let addr = value.as_str().unwrap_or_default();
	let hex_part = addr
		.strip_prefix("0x")
		.ok_or_else(|| "address must start with 0x".to_string())?;
	if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err("address must be 20 bytes of hex".to_string());
	}
	Ok(())
}

/// Validator for 32-byte hex private keys, with or without `0x`.
pub fn validate_private_key(value: &toml::Value) -> Result<(), String> {
	let key = value.as_str().unwrap_or_default();
	let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);

	if key_without_prefix.len() != 64 {
		return Err("Private key must be 64 hex characters (32 bytes)".to_string());
	}
	if !key_without_prefix.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err("Private key must be valid hexadecimal".to_string());
	}
	Ok(())
}

/// Validator for `http(s)://` URLs.
pub fn validate_http_url(value: &toml::Value) -> Result<(), String> {
	let url = value.as_str().unwrap_or_default();
	if url.starts_with("http://") || url.starts_with("https://") {
		Ok(())
	} else {
		Err("URL must start with http:// or https://".to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(doc: &str) -> toml::Value {
		toml::Value::Table(toml::from_str(doc).unwrap())
	}

	fn ledger_schema() -> Schema {
		Schema::new(
			vec![
				Field::new("rpc_url", FieldType::String).with_validator(validate_http_url),
				Field::new("contract_address", FieldType::String)
					.with_validator(validate_address),
			],
			vec![Field::new(
				"confirmations",
				FieldType::Integer {
					min: Some(1),
					max: Some(64),
				},
			)],
		)
	}

	#[test]
	fn test_missing_required_field() {
		let config = parse(r#"rpc_url = "http://localhost:8545""#);
		assert_eq!(
			ledger_schema().validate(&config),
			Err(SchemaError::MissingField("contract_address".into()))
		);
	}

	#[test]
	fn test_custom_validator_runs() {
		let config = parse(
			r#"
rpc_url = "ws://localhost:8545"
contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#,
		);

		match ledger_schema().validate(&config) {
			Err(SchemaError::InvalidValue { field, .. }) => assert_eq!(field, "rpc_url"),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_integer_bounds() {
		let config = parse(
			r#"
rpc_url = "http://localhost:8545"
contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
confirmations = 0
"#,
		);

		assert!(matches!(
			ledger_schema().validate(&config),
			Err(SchemaError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_nested_table_prefixes_field() {
		let schema = Schema::new(
			vec![Field::new("ledger", FieldType::Table(ledger_schema()))],
			vec![],
		);
		let config = parse(
			r#"
[ledger]
rpc_url = "http://localhost:8545"
"#,
		);

		assert_eq!(
			schema.validate(&config),
			Err(SchemaError::MissingField("ledger.contract_address".into()))
		);
	}

	#[test]
	fn test_key_and_address_validators() {
		let key = toml::Value::String(format!("0x{}", "ab".repeat(32)));
		assert!(validate_private_key(&key).is_ok());
		assert!(validate_private_key(&toml::Value::String("0x123".into())).is_err());

		let bad_address = toml::Value::String("0x5FbDB2315678afecb367f032d93F642f64180aaZ".into());
		assert!(validate_address(&bad_address).is_err());
	}
}
