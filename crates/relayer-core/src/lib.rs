//! Relayer orchestration.
//!
//! [`RelayerBuilder`] wires a ledger, the validator, the guard and the intent
//! feeds into a [`RelayerEngine`], which then runs as the relayer's only
//! worker. [`startup::preflight`] holds the checks that must pass before the
//! engine is allowed to spend anything.

use relayer_config::Config;
use relayer_delivery::ExecutionEngine;
use relayer_discovery::{
	DiscoveryError, HttpSignedIntentSource, LiveIntentFeed, SignedIntentSource,
	StoredIntentScanner,
};
use relayer_intent::{DefaultPolicy, GasGuard, ProfitabilityPolicy, TypedDataCodec, Validator};
use relayer_ledger::SharedLedger;
use relayer_types::{EventBus, FatalInit};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub mod engine;
pub mod startup;

pub use engine::{Outcome, RelayerEngine, StopHandle};
pub use startup::{preflight, LedgerStatus};

#[derive(Debug, Error)]
pub enum RelayerError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error(transparent)]
	Init(#[from] FatalInit),
	#[error("Discovery error: {0}")]
	Discovery(#[from] DiscoveryError),
}

pub struct RelayerBuilder {
	config: Config,
	ledger: Option<SharedLedger>,
	policy: Option<Box<dyn ProfitabilityPolicy>>,
	signed_sources: Vec<Box<dyn SignedIntentSource>>,
	event_bus: Option<EventBus>,
}

impl RelayerBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			ledger: None,
			policy: None,
			signed_sources: Vec::new(),
			event_bus: None,
		}
	}

	pub fn with_ledger(mut self, ledger: SharedLedger) -> Self {
		self.ledger = Some(ledger);
		self
	}

	/// Replaces the default minimum-size and cost-ratio policy.
	pub fn with_policy(mut self, policy: Box<dyn ProfitabilityPolicy>) -> Self {
		self.policy = Some(policy);
		self
	}

	pub fn with_signed_source(mut self, source: Box<dyn SignedIntentSource>) -> Self {
		self.signed_sources.push(source);
		self
	}

	pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
		self.event_bus = Some(event_bus);
		self
	}

	/// Binds the engine to the ledger's chain and builds every component.
	pub async fn build(self) -> Result<RelayerEngine, RelayerError> {
		let config = self.config;
		let ledger = self
			.ledger
			.ok_or_else(|| RelayerError::Config("no ledger provided".to_string()))?;

		let chain_id = ledger
			.chain_id()
			.await
			.map_err(|e| FatalInit::Unreachable(e.to_string()))?;
		if let Some(expected) = config.ledger.chain_id {
			if expected != chain_id {
				return Err(FatalInit::InvalidConfig(format!(
					"ledger.chain_id is {} but the endpoint reports {}",
					expected, chain_id
				))
				.into());
			}
		}

		let codec = TypedDataCodec::new(chain_id, ledger.contract_address());
		let domain_separator = codec.domain_separator();

		let policy = match self.policy {
			Some(policy) => policy,
			None => {
				let minimum = config
					.guard
					.min_intent_size_wei()
					.map_err(FatalInit::from)?;
				Box::new(DefaultPolicy::new(minimum))
			}
		};
		let guard = GasGuard::new(
			config.guard.max_gas_price_wei(),
			config.guard.default_gas_estimate,
			policy,
		);

		let mut signed_sources = self.signed_sources;
		if let Some(endpoint) = &config.signed_intents.endpoint {
			signed_sources.push(Box::new(HttpSignedIntentSource::new(endpoint.clone())?));
		}

		let event_bus = self.event_bus.unwrap_or_default();
		let executor =
			ExecutionEngine::new(ledger.clone(), chain_id, domain_separator, event_bus.clone());

		let poll_interval = config.relayer.poll_interval();
		let live_feed = config
			.relayer
			.live_feed
			.then(|| LiveIntentFeed::new(ledger.clone(), poll_interval));

		let (queue_tx, queue_rx) = mpsc::unbounded_channel();
		let (stop_tx, _) = watch::channel(false);

		tracing::info!(
			chain_id,
			contract = %ledger.contract_address(),
			relayer = %ledger.relayer_address(),
			%domain_separator,
			signed_sources = signed_sources.len(),
			"Relayer engine built"
		);

		Ok(RelayerEngine {
			scanner: StoredIntentScanner::new(ledger.clone(), config.relayer.scan_window),
			ledger,
			validator: Validator::new(codec),
			guard,
			executor,
			live_feed,
			signed_sources,
			pending_signed: VecDeque::new(),
			pending_keys: HashSet::new(),
			max_pending_signed: config.relayer.max_pending_signed,
			event_bus,
			poll_interval,
			paused: false,
			queue_tx,
			queue_rx,
			stop_tx: Arc::new(stop_tx),
		})
	}
}
