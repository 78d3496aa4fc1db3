use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use relayer_account::{create_account, AccountInterface};
use relayer_config::{Config, ConfigLoader};
use relayer_core::{preflight, RelayerBuilder};
use relayer_discovery::{ChannelSignedIntentSource, SignedIntentPayload};
use relayer_intent::TypedDataCodec;
use relayer_ledger::{AlloyLedger, LedgerInterface, SharedLedger};
use relayer_types::{
	truncate_hash, Address, EventBus, FatalInit, RelayerEvent, SignedSubmission, SwapIntent, U256,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{
	layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

mod api;

const DEFAULT_LOG_LEVEL: &str = "info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Parser)]
#[command(name = "intent-relayer")]
#[command(about = "Relays stored and signed swap intents to the intent ledger", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Optional TOML file; every setting can also come from RELAYER_* variables
	#[arg(short, long, value_name = "FILE", env = "RELAYER_CONFIG")]
	config: Option<PathBuf>,

	/// Overrides relayer.log_level when RUST_LOG is unset
	#[arg(long, env = "RELAYER_LOG_LEVEL")]
	log_level: Option<String>,

	#[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
	log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
	Pretty,
	Json,
}

#[derive(Subcommand)]
enum Commands {
	/// Start relaying
	Start,
	/// Validate the configuration and exit
	Validate,
	/// Sign a swap intent with the configured key and print its JSON payload
	SignIntent(SignIntentArgs),
}

#[derive(clap::Args)]
struct SignIntentArgs {
	#[arg(long)]
	from_token: Address,
	#[arg(long)]
	to_token: Address,
	/// Input amount in wei
	#[arg(long)]
	amount_in: U256,
	/// Minimum output amount in wei
	#[arg(long)]
	min_amount_out: U256,
	/// Seconds from now until the intent expires
	#[arg(long, default_value_t = 3600)]
	expires_in: u64,
	/// Intent nonce; read from the ledger when omitted
	#[arg(long)]
	nonce: Option<U256>,
	/// Relayer base URL to POST the signed intent to
	#[arg(long)]
	submit_to: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let filter = setup_tracing(
		cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL),
		cli.log_format,
	)?;

	let mut loader = ConfigLoader::new();
	if let Some(path) = &cli.config {
		loader = loader.with_file(path);
	}
	let config = loader
		.load()
		.await
		.map_err(FatalInit::from)
		.context("Failed to load configuration")?;

	if cli.log_level.is_none() && std::env::var_os("RUST_LOG").is_none() {
		apply_log_level(&filter, &config.relayer.log_level)?;
	}

	match cli.command {
		Some(Commands::Start) | None => start_relayer(config).await,
		Some(Commands::Validate) => validate_config(&config),
		Some(Commands::SignIntent(args)) => sign_intent(config, args).await,
	}
}

fn connect(config: &Config) -> Result<(Box<dyn AccountInterface>, SharedLedger)> {
	let account = create_account(&config.account.private_key)
		.map_err(|e| FatalInit::InvalidConfig(format!("account.private_key: {}", e)))?;
	let contract = config.ledger.contract().map_err(FatalInit::from)?;

	let ledger = AlloyLedger::new(
		&config.ledger.rpc_url,
		contract,
		account.wallet(),
		account.address(),
	)
	.map_err(|e| FatalInit::InvalidConfig(format!("ledger.rpc_url: {}", e)))?
	.with_confirmations(config.ledger.confirmations)
	.with_receipt_timing(
		config.ledger.receipt_timeout(),
		config.ledger.receipt_poll_interval(),
	);

	Ok((account, Arc::new(ledger)))
}

async fn start_relayer(config: Config) -> Result<()> {
	info!("Starting {}", config.relayer.name);

	let (account, ledger) = connect(&config)?;
	info!(relayer = %account.address(), "Relayer account loaded");

	let status = preflight(ledger.as_ref())
		.await
		.context("Startup checks failed")?;

	let event_bus = EventBus::default();
	let mut builder = RelayerBuilder::new(config.clone())
		.with_ledger(ledger.clone())
		.with_event_bus(event_bus.clone());

	let api_server = if config.api.enabled {
		let (source, intake) = ChannelSignedIntentSource::new();
		builder = builder.with_signed_source(Box::new(source));
		Some(api::ApiServer::new(
			&config.api.host,
			config.api.port,
			intake,
			TypedDataCodec::new(status.chain_id, ledger.contract_address()),
			account.address(),
			status.chain_id,
		))
	} else {
		None
	};

	let engine = builder
		.build()
		.await
		.context("Failed to build relayer")?;
	let stop = engine.stop_handle();

	let event_logger = tokio::spawn(log_events(event_bus));
	let api_handle = api_server.map(|server| {
		tokio::spawn(async move {
			if let Err(e) = server.run().await {
				warn!(error = %e, "API server stopped");
			}
		})
	});
	let worker = tokio::spawn(engine.run());

	info!("Relayer started");
	setup_shutdown_signal().await;
	info!("Shutdown signal received, finishing in-flight work...");

	stop.stop();
	let engine = worker.await.context("Relayer worker panicked")?;
	if !engine.pending_signed().is_empty() {
		warn!(
			count = engine.pending_signed().len(),
			"Dropping signed intents still held for retry"
		);
	}

	if let Some(handle) = api_handle {
		handle.abort();
	}
	event_logger.abort();

	info!("Relayer stopped");
	Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
	info!("Configuration is valid");
	info!("Relayer name: {}", config.relayer.name);
	info!("RPC endpoint: {}", config.ledger.rpc_url);
	info!("Ledger contract: {}", config.ledger.contract_address);
	info!(
		"Poll interval: {} ms, scan window: {}, live feed: {}",
		config.relayer.poll_interval_ms, config.relayer.scan_window, config.relayer.live_feed
	);
	info!(
		"Gas ceiling: {} gwei, default estimate: {}, minimum intent size: {}",
		config.guard.max_gas_price_gwei,
		config.guard.default_gas_estimate,
		config.guard.min_intent_size
	);
	if let Some(endpoint) = &config.signed_intents.endpoint {
		info!("Signed intent feed: {}", endpoint);
	}
	if config.api.enabled {
		info!("HTTP intake: {}:{}", config.api.host, config.api.port);
	}
	Ok(())
}

async fn sign_intent(config: Config, args: SignIntentArgs) -> Result<()> {
	let (account, ledger) = connect(&config)?;
	let recipient = account.address();

	let chain_id = match config.ledger.chain_id {
		Some(chain_id) => chain_id,
		None => ledger
			.chain_id()
			.await
			.context("Failed to read chain id")?,
	};
	let nonce = match args.nonce {
		Some(nonce) => nonce,
		None => ledger
			.nonce_of(recipient)
			.await
			.context("Failed to read intent nonce")?,
	};
	let deadline = chrono::Utc::now().timestamp().max(0) as u64 + args.expires_in;

	let intent = SwapIntent {
		fromToken: args.from_token,
		toToken: args.to_token,
		amountIn: args.amount_in,
		minAmountOut: args.min_amount_out,
		recipient,
		deadline: U256::from(deadline),
		nonce,
	};
	let codec = TypedDataCodec::new(chain_id, ledger.contract_address());
	let signature = codec
		.sign(&intent, account.as_ref())
		.await
		.context("Failed to sign intent")?;
	let payload = SignedIntentPayload::from(&SignedSubmission::new(intent, signature));

	println!("{}", serde_json::to_string_pretty(&payload)?);

	if let Some(base) = args.submit_to {
		let url = format!("{}/intents", base.trim_end_matches('/'));
		let response = reqwest::Client::new()
			.post(&url)
			.json(&payload)
			.send()
			.await
			.with_context(|| format!("Failed to submit to {}", url))?;
		let status = response.status();
		let body = response.text().await.unwrap_or_default();
		if !status.is_success() {
			anyhow::bail!("{} rejected the intent ({}): {}", url, status, body);
		}
		info!("Submitted to {}: {}", url, body);
	}

	Ok(())
}

async fn log_events(event_bus: EventBus) {
	let mut events = event_bus.subscribe();
	loop {
		match events.recv().await {
			Ok(event) => log_event(&event),
			Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
				warn!(skipped, "Event logger lagged");
			}
			Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
		}
	}
}

fn log_event(event: &RelayerEvent) {
	match event {
		RelayerEvent::Discovered { key } => debug!(%key, "Discovered"),
		RelayerEvent::Rejected { key, reason } => {
			info!(%key, kind = reason.kind(), "Rejected: {}", reason)
		}
		RelayerEvent::Deferred { key, reason } => {
			info!(%key, kind = reason.kind(), "Deferred: {}", reason)
		}
		RelayerEvent::Submitted {
			key,
			tx_hash,
			sequence,
		} => info!(
			%key,
			tx_hash = %truncate_hash(&tx_hash.to_string()),
			sequence,
			"Submitted"
		),
		RelayerEvent::Confirmed { key, receipt } => info!(
			%key,
			tx_hash = %truncate_hash(&receipt.hash.to_string()),
			block = receipt.block_number,
			gas_used = receipt.gas_used,
			"Confirmed"
		),
		RelayerEvent::Failed { key, error } => {
			warn!(%key, kind = error.kind(), retryable = error.is_retryable(), "Failed: {}", error)
		}
	}
}

/// Installs the global subscriber. The returned handle swaps the filter once
/// the configured level is known.
fn setup_tracing(log_level: &str, format: LogFormat) -> Result<FilterHandle> {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
	let (filter, handle) = reload::Layer::new(env_filter);

	let registry = tracing_subscriber::registry().with(filter);
	match format {
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.try_init()?,
	}

	Ok(handle)
}

fn apply_log_level(filter: &FilterHandle, log_level: &str) -> Result<()> {
	let env_filter = EnvFilter::try_new(log_level)
		.with_context(|| format!("Invalid relayer.log_level '{}'", log_level))?;
	filter
		.reload(env_filter)
		.context("Failed to apply relayer.log_level")?;
	debug!(log_level, "Log level set from configuration");
	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_configured_level_applies_after_startup() {
		let (filter, handle) = reload::Layer::new(EnvFilter::new(DEFAULT_LOG_LEVEL));
		let subscriber = tracing_subscriber::registry().with(filter);

		tracing::subscriber::with_default(subscriber, || {
			assert!(!tracing::enabled!(tracing::Level::DEBUG));
			apply_log_level(&handle, "debug").unwrap();
			assert!(tracing::enabled!(tracing::Level::DEBUG));
		});
	}
}
