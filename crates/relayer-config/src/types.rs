//! Configuration types for the relayer.

use alloy::primitives::{utils::parse_ether, Address, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Complete relayer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Loop and identity settings
	#[serde(default)]
	pub relayer: RelayerSettings,
	/// Ledger endpoint and contract
	pub ledger: LedgerConfig,
	/// Relayer signing credential
	pub account: AccountConfig,
	/// Fee ceiling and profitability policy
	#[serde(default)]
	pub guard: GuardConfig,
	/// External feed of pre-signed intents
	#[serde(default)]
	pub signed_intents: SignedIntentsConfig,
	/// HTTP intake endpoint
	#[serde(default)]
	pub api: ApiConfig,
}

/// Loop and identity settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayerSettings {
	/// Name used in logs
	#[serde(default = "default_name")]
	pub name: String,
	/// Default log filter when RUST_LOG is unset
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Delay between discovery cycles
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// How many of the most recent stored intents each cycle rescans
	#[serde(default = "default_scan_window")]
	pub scan_window: u64,
	/// Whether to follow intent events between cycles
	#[serde(default = "default_true")]
	pub live_feed: bool,
	/// Upper bound on signed intents held for retry; the oldest is dropped
	/// when a new one arrives at the limit
	#[serde(default = "default_max_pending_signed")]
	pub max_pending_signed: usize,
}

impl RelayerSettings {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

impl Default for RelayerSettings {
	fn default() -> Self {
		Self {
			name: default_name(),
			log_level: default_log_level(),
			poll_interval_ms: default_poll_interval_ms(),
			scan_window: default_scan_window(),
			live_feed: true,
			max_pending_signed: default_max_pending_signed(),
		}
	}
}

/// Ledger endpoint and contract
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
	/// HTTP JSON-RPC endpoint
	pub rpc_url: String,
	/// Address of the intent ledger contract
	pub contract_address: String,
	/// Expected chain id; queried from the endpoint when absent
	pub chain_id: Option<u64>,
	/// Blocks a fulfilment must be buried under before it counts as confirmed
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Give up waiting for a receipt after this many seconds
	#[serde(default = "default_receipt_timeout_secs")]
	pub receipt_timeout_secs: u64,
	/// Receipt polling interval
	#[serde(default = "default_receipt_poll_ms")]
	pub receipt_poll_ms: u64,
}

impl LedgerConfig {
	pub fn contract(&self) -> Result<Address, ConfigError> {
		self.contract_address.parse().map_err(|e| {
			ConfigError::Invalid(format!(
				"ledger.contract_address '{}': {}",
				self.contract_address, e
			))
		})
	}

	pub fn receipt_timeout(&self) -> Duration {
		Duration::from_secs(self.receipt_timeout_secs)
	}

	pub fn receipt_poll_interval(&self) -> Duration {
		Duration::from_millis(self.receipt_poll_ms)
	}
}

/// Relayer signing credential
#[derive(Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex-encoded secp256k1 key (with or without 0x)
	pub private_key: String,
}

impl std::fmt::Debug for AccountConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AccountConfig")
			.field("private_key", &"<redacted>")
			.finish()
	}
}

/// Fee ceiling and profitability policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardConfig {
	/// Highest gas price the relayer will pay
	#[serde(default = "default_max_gas_price_gwei")]
	pub max_gas_price_gwei: u64,
	/// Gas units assumed when estimation fails
	#[serde(default = "default_gas_estimate")]
	pub default_gas_estimate: u64,
	/// Smallest input amount worth relaying, in native units (e.g. "0.001")
	#[serde(default = "default_min_intent_size")]
	pub min_intent_size: String,
}

impl GuardConfig {
	pub fn max_gas_price_wei(&self) -> u128 {
		u128::from(self.max_gas_price_gwei) * 1_000_000_000
	}

	pub fn min_intent_size_wei(&self) -> Result<U256, ConfigError> {
		parse_ether(&self.min_intent_size).map_err(|e| {
			ConfigError::Invalid(format!(
				"guard.min_intent_size '{}': {}",
				self.min_intent_size, e
			))
		})
	}
}

impl Default for GuardConfig {
	fn default() -> Self {
		Self {
			max_gas_price_gwei: default_max_gas_price_gwei(),
			default_gas_estimate: default_gas_estimate(),
			min_intent_size: default_min_intent_size(),
		}
	}
}

/// External feed of pre-signed intents
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignedIntentsConfig {
	/// URL returning a JSON array of pending signed intents
	pub endpoint: Option<String>,
}

/// HTTP intake endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			host: default_api_host(),
			port: default_api_port(),
		}
	}
}

fn default_name() -> String {
	"intent-relayer".to_string()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_poll_interval_ms() -> u64 {
	5_000
}

fn default_scan_window() -> u64 {
	50
}

fn default_max_pending_signed() -> usize {
	1_000
}

fn default_true() -> bool {
	true
}

fn default_confirmations() -> u64 {
	1
}

fn default_receipt_timeout_secs() -> u64 {
	120
}

fn default_receipt_poll_ms() -> u64 {
	1_000
}

fn default_max_gas_price_gwei() -> u64 {
	50
}

fn default_gas_estimate() -> u64 {
	500_000
}

fn default_min_intent_size() -> String {
	"0.001".to_string()
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}
