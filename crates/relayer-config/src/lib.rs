//! Configuration loading for the intent relayer.
//!
//! Configuration comes from an optional TOML file, with `${VAR}` references
//! expanded from the environment, and is then overridden key by key from
//! `RELAYER_*` variables. The merged table is schema-checked before it is
//! deserialized into [`Config`].

mod types;

pub use types::*;

use std::env;
use std::path::Path;
use thiserror::Error;

use relayer_types::{
	validate_address, validate_http_url, validate_private_key, Field, FieldType, FatalInit,
	Schema, SchemaError,
};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Missing required setting: {0}")]
	Missing(String),

	#[error("Invalid setting: {0}")]
	Invalid(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

impl From<ConfigError> for FatalInit {
	fn from(err: ConfigError) -> Self {
		match err {
			ConfigError::Missing(field) => FatalInit::MissingConfig(field),
			ConfigError::EnvVarNotFound(var) => FatalInit::MissingConfig(var),
			other => FatalInit::InvalidConfig(other.to_string()),
		}
	}
}

#[derive(Clone, Copy)]
enum Kind {
	Str,
	Int,
}

/// Environment overrides: variable suffix, section, key, value kind.
const ENV_OVERRIDES: &[(&str, &str, &str, Kind)] = &[
	("RPC_URL", "ledger", "rpc_url", Kind::Str),
	("CONTRACT_ADDRESS", "ledger", "contract_address", Kind::Str),
	("CHAIN_ID", "ledger", "chain_id", Kind::Int),
	("PRIVATE_KEY", "account", "private_key", Kind::Str),
	("POLL_INTERVAL_MS", "relayer", "poll_interval_ms", Kind::Int),
	("SCAN_WINDOW", "relayer", "scan_window", Kind::Int),
	("MAX_PENDING_SIGNED", "relayer", "max_pending_signed", Kind::Int),
	("LOG_LEVEL", "relayer", "log_level", Kind::Str),
	("MAX_GAS_PRICE_GWEI", "guard", "max_gas_price_gwei", Kind::Int),
	("DEFAULT_GAS_ESTIMATE", "guard", "default_gas_estimate", Kind::Int),
	("MIN_INTENT_SIZE", "guard", "min_intent_size", Kind::Str),
	("SIGNED_INTENTS_URL", "signed_intents", "endpoint", Kind::Str),
];

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "RELAYER_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Loads configuration, reading variables from the process environment.
	pub async fn load(&self) -> Result<Config, ConfigError> {
		self.load_with(|name| env::var(name).ok()).await
	}

	/// Loads configuration, resolving variables through `lookup`.
	pub async fn load_with<F>(&self, lookup: F) -> Result<Config, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut table = match &self.file_path {
			Some(file_path) => self.load_from_file(file_path, &lookup).await?,
			None => toml::Table::new(),
		};

		self.apply_env_overrides(&mut table, &lookup)?;

		// Present but empty sections let the schema name the missing key.
		for section in ["ledger", "account"] {
			table
				.entry(section)
				.or_insert_with(|| toml::Value::Table(toml::Table::new()));
		}

		let value = toml::Value::Table(table);
		config_schema().validate(&value).map_err(|e| match e {
			SchemaError::MissingField(field) => ConfigError::Missing(field),
			other => ConfigError::Invalid(other.to_string()),
		})?;

		let config: Config = value
			.try_into()
			.map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;

		validate_config(&config)?;
		Ok(config)
	}

	async fn load_from_file<F>(&self, file_path: &str, lookup: &F) -> Result<toml::Table, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.to_string()));
		}
		let content = tokio::fs::read_to_string(file_path).await?;
		tracing::debug!(file = %file_path, "Loaded configuration file");

		let substituted_content = substitute_env_vars(&content, lookup)?;

		toml::from_str(&substituted_content).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn apply_env_overrides<F>(&self, table: &mut toml::Table, lookup: &F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		for (suffix, section, key, kind) in ENV_OVERRIDES {
			let var_name = format!("{}{}", self.env_prefix, suffix);
			let Some(raw) = lookup(&var_name) else {
				continue;
			};

			let value = match kind {
				Kind::Str => toml::Value::String(raw),
				Kind::Int => toml::Value::Integer(raw.trim().parse().map_err(|e| {
					ConfigError::Invalid(format!("{}='{}': {}", var_name, raw, e))
				})?),
			};

			tracing::debug!(variable = %var_name, "{}.{} overridden from environment", section, key);

			let entry = table
				.entry(section.to_string())
				.or_insert_with(|| toml::Value::Table(toml::Table::new()));
			match entry.as_table_mut() {
				Some(section_table) => {
					section_table.insert(key.to_string(), value);
				}
				None => {
					return Err(ConfigError::Invalid(format!(
						"[{}] must be a table",
						section
					)))
				}
			}
		}

		Ok(())
	}
}

fn substitute_env_vars<F>(content: &str, lookup: &F) -> Result<String, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let mut result = content.to_string();

	// Find and replace ${VAR_NAME} patterns
	let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			lookup(var_name).ok_or_else(|| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

fn config_schema() -> Schema {
	let positive = FieldType::Integer {
		min: Some(1),
		max: None,
	};

	Schema::new(
		vec![
			Field::new(
				"ledger",
				FieldType::Table(Schema::new(
					vec![
						Field::new("rpc_url", FieldType::String).with_validator(validate_http_url),
						Field::new("contract_address", FieldType::String)
							.with_validator(validate_address),
					],
					vec![
						Field::new("chain_id", FieldType::Integer { min: Some(1), max: None }),
						Field::new(
							"confirmations",
							FieldType::Integer {
								min: Some(1),
								max: Some(64),
							},
						),
						Field::new("receipt_timeout_secs", FieldType::Integer { min: Some(1), max: None }),
						Field::new("receipt_poll_ms", FieldType::Integer { min: Some(1), max: None }),
					],
				)),
			),
			Field::new(
				"account",
				FieldType::Table(Schema::new(
					vec![Field::new("private_key", FieldType::String)
						.with_validator(validate_private_key)],
					vec![],
				)),
			),
		],
		vec![
			Field::new(
				"relayer",
				FieldType::Table(Schema::new(
					vec![],
					vec![
						Field::new("name", FieldType::String),
						Field::new("log_level", FieldType::String),
						Field::new("poll_interval_ms", FieldType::Integer { min: Some(1), max: None }),
						Field::new("scan_window", positive),
						Field::new("live_feed", FieldType::Boolean),
						Field::new("max_pending_signed", FieldType::Integer { min: Some(1), max: None }),
					],
				)),
			),
			Field::new(
				"guard",
				FieldType::Table(Schema::new(
					vec![],
					vec![
						Field::new("max_gas_price_gwei", FieldType::Integer { min: Some(0), max: None }),
						Field::new("default_gas_estimate", FieldType::Integer { min: Some(1), max: None }),
						Field::new("min_intent_size", FieldType::String),
					],
				)),
			),
			Field::new(
				"signed_intents",
				FieldType::Table(Schema::new(
					vec![],
					vec![Field::new("endpoint", FieldType::String).with_validator(validate_http_url)],
				)),
			),
			Field::new(
				"api",
				FieldType::Table(Schema::new(
					vec![],
					vec![
						Field::new("enabled", FieldType::Boolean),
						Field::new("host", FieldType::String),
						Field::new(
							"port",
							FieldType::Integer {
								min: Some(1),
								max: Some(65535),
							},
						),
					],
				)),
			),
		],
	)
}

/// Checks that need the typed values rather than the raw table.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
	config.ledger.contract()?;
	config.guard.min_intent_size_wei()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

	fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| map.get(name).cloned()
	}

	fn write_config(content: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	#[tokio::test]
	async fn test_environment_only_config() {
		let lookup = env_of(&[
			("RELAYER_RPC_URL", "http://localhost:8545"),
			("RELAYER_CONTRACT_ADDRESS", CONTRACT),
			("RELAYER_PRIVATE_KEY", KEY),
			("RELAYER_POLL_INTERVAL_MS", "250"),
			("RELAYER_MAX_PENDING_SIGNED", "25"),
		]);

		let config = ConfigLoader::new().load_with(lookup).await.unwrap();

		assert_eq!(config.ledger.rpc_url, "http://localhost:8545");
		assert_eq!(config.relayer.poll_interval_ms, 250);
		assert_eq!(config.relayer.scan_window, 50);
		assert_eq!(config.relayer.max_pending_signed, 25);
		assert_eq!(config.guard.max_gas_price_gwei, 50);
		assert!(config.signed_intents.endpoint.is_none());
		assert!(!config.api.enabled);
	}

	#[tokio::test]
	async fn test_missing_private_key_is_named() {
		let lookup = env_of(&[
			("RELAYER_RPC_URL", "http://localhost:8545"),
			("RELAYER_CONTRACT_ADDRESS", CONTRACT),
		]);

		let err = ConfigLoader::new().load_with(lookup).await.unwrap_err();
		match err {
			ConfigError::Missing(field) => assert_eq!(field, "account.private_key"),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_missing_config_maps_to_fatal_init() {
		let err = ConfigLoader::new().load_with(env_of(&[])).await.unwrap_err();
		assert!(matches!(FatalInit::from(err), FatalInit::MissingConfig(_)));
	}

	#[tokio::test]
	async fn test_file_with_substitution_and_overrides() {
		let file = write_config(&format!(
			r#"
[relayer]
poll_interval_ms = 1000

[ledger]
rpc_url = "${{NODE_URL}}"
contract_address = "{}"

[account]
private_key = "{}"

[guard]
max_gas_price_gwei = 20
"#,
			CONTRACT, KEY
		));
		let lookup = env_of(&[
			("NODE_URL", "http://node:8545"),
			("RELAYER_MAX_GAS_PRICE_GWEI", "75"),
		]);

		let config = ConfigLoader::new()
			.with_file(file.path())
			.load_with(lookup)
			.await
			.unwrap();

		assert_eq!(config.ledger.rpc_url, "http://node:8545");
		assert_eq!(config.relayer.poll_interval_ms, 1000);
		assert_eq!(config.guard.max_gas_price_gwei, 75);
	}

	#[tokio::test]
	async fn test_unresolved_substitution() {
		let file = write_config("[ledger]\nrpc_url = \"${NOWHERE}\"\n");

		let err = ConfigLoader::new()
			.with_file(file.path())
			.load_with(env_of(&[]))
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::EnvVarNotFound(var) if var == "NOWHERE"));
	}

	#[tokio::test]
	async fn test_non_numeric_override_rejected() {
		let lookup = env_of(&[
			("RELAYER_RPC_URL", "http://localhost:8545"),
			("RELAYER_CONTRACT_ADDRESS", CONTRACT),
			("RELAYER_PRIVATE_KEY", KEY),
			("RELAYER_MAX_GAS_PRICE_GWEI", "fifty"),
		]);

		let err = ConfigLoader::new().load_with(lookup).await.unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[tokio::test]
	async fn test_invalid_address_rejected() {
		let lookup = env_of(&[
			("RELAYER_RPC_URL", "http://localhost:8545"),
			("RELAYER_CONTRACT_ADDRESS", "0x1234"),
			("RELAYER_PRIVATE_KEY", KEY),
		]);

		let err = ConfigLoader::new().load_with(lookup).await.unwrap_err();
		assert!(matches!(FatalInit::from(err), FatalInit::InvalidConfig(_)));
	}

	#[tokio::test]
	async fn test_missing_file() {
		let err = ConfigLoader::new()
			.with_file("/definitely/not/here.toml")
			.load_with(env_of(&[]))
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::FileNotFound(_)));
	}
}
