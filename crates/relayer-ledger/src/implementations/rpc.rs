//! JSON-RPC ledger client built on Alloy.
//!
//! Reads are plain `eth_call`s against the ledger contract. Submissions carry
//! an explicit nonce and legacy gas price chosen by the execution engine; the
//! provider's wallet only signs.

use crate::abi::IIntentLedger::{self, IntentCancelled, IntentCreated, IntentFulfilled};
use crate::{classify_rpc_error, IntentEvent, LedgerCall, LedgerError, LedgerInterface};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use relayer_types::{truncate_hash, Address, IntentId, StoredIntent, TxHash, TxReceipt, U256};
use std::time::Duration;

/// Ledger client talking to an EVM node over HTTP.
pub struct AlloyLedger {
	provider: DynProvider,
	contract: Address,
	relayer: Address,
	/// Blocks (including the inclusion block) before a receipt is returned.
	confirmations: u64,
	receipt_timeout: Duration,
	receipt_poll_interval: Duration,
}

impl AlloyLedger {
	/// Creates a client for `contract`, signing with `wallet`.
	pub fn new(
		rpc_url: &str,
		contract: Address,
		wallet: EthereumWallet,
		relayer: Address,
	) -> Result<Self, LedgerError> {
		let url: Url = rpc_url
			.parse()
			.map_err(|e| LedgerError::Network(format!("Invalid RPC URL: {}", e)))?;

		let provider = ProviderBuilder::new().wallet(wallet).connect_http(url).erased();

		Ok(Self {
			provider,
			contract,
			relayer,
			confirmations: 1,
			receipt_timeout: Duration::from_secs(120),
			receipt_poll_interval: Duration::from_secs(1),
		})
	}

	pub fn with_confirmations(mut self, confirmations: u64) -> Self {
		self.confirmations = confirmations.max(1);
		self
	}

	pub fn with_receipt_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
		self.receipt_timeout = timeout;
		self.receipt_poll_interval = poll_interval;
		self
	}

	async fn read<C: SolCall>(&self, call: C) -> Result<C::Return, LedgerError> {
		let request = TransactionRequest::default()
			.with_to(self.contract)
			.with_input(call.abi_encode());

		let output = self
			.provider
			.call(request)
			.await
			.map_err(|e| LedgerError::Network(format!("{} failed: {}", C::SIGNATURE, e)))?;

		C::abi_decode_returns(&output)
			.map_err(|e| LedgerError::Decode(format!("{}: {}", C::SIGNATURE, e)))
	}

	fn request(&self, call: &LedgerCall) -> TransactionRequest {
		TransactionRequest::default()
			.with_from(self.relayer)
			.with_to(self.contract)
			.with_input(call.calldata())
	}

	fn parse_event(log: &Log) -> Option<IntentEvent> {
		let topic = *log.topic0()?;

		if topic == IntentCreated::SIGNATURE_HASH {
			let event = IntentCreated::decode_log(&log.inner).ok()?;
			Some(IntentEvent::Created {
				id: IntentId(event.data.intentId.saturating_to()),
				creator: event.data.creator,
			})
		} else if topic == IntentFulfilled::SIGNATURE_HASH {
			let event = IntentFulfilled::decode_log(&log.inner).ok()?;
			Some(IntentEvent::Fulfilled {
				id: IntentId(event.data.intentId.saturating_to()),
			})
		} else if topic == IntentCancelled::SIGNATURE_HASH {
			let event = IntentCancelled::decode_log(&log.inner).ok()?;
			Some(IntentEvent::Cancelled {
				id: IntentId(event.data.intentId.saturating_to()),
			})
		} else {
			None
		}
	}
}

#[async_trait]
impl LedgerInterface for AlloyLedger {
	fn contract_address(&self) -> Address {
		self.contract
	}

	fn relayer_address(&self) -> Address {
		self.relayer
	}

	async fn chain_id(&self) -> Result<u64, LedgerError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get chain id: {}", e)))
	}

	async fn get_intent(&self, id: IntentId) -> Result<StoredIntent, LedgerError> {
		let intent = self
			.read(IIntentLedger::getIntentCall {
				intentId: U256::from(id.0),
			})
			.await?;
		Ok(intent.into())
	}

	async fn next_intent_id(&self) -> Result<u64, LedgerError> {
		let next = self.read(IIntentLedger::nextIntentIdCall {}).await?;
		Ok(next.saturating_to())
	}

	async fn user_intents(&self, user: Address) -> Result<Vec<IntentId>, LedgerError> {
		let ids = self.read(IIntentLedger::userIntentsCall { user }).await?;
		Ok(ids
			.into_iter()
			.map(|id| IntentId(id.saturating_to()))
			.collect())
	}

	async fn nonce_of(&self, user: Address) -> Result<U256, LedgerError> {
		self.read(IIntentLedger::noncesCall { user }).await
	}

	async fn is_authorized_fulfiller(&self, fulfiller: Address) -> Result<bool, LedgerError> {
		self.read(IIntentLedger::authorizedFulfillersCall { fulfiller })
			.await
	}

	async fn paused(&self) -> Result<bool, LedgerError> {
		self.read(IIntentLedger::pausedCall {}).await
	}

	async fn fee_bps(&self) -> Result<U256, LedgerError> {
		self.read(IIntentLedger::feeBpsCall {}).await
	}

	async fn fee_recipient(&self) -> Result<Address, LedgerError> {
		self.read(IIntentLedger::feeRecipientCall {}).await
	}

	async fn has_code(&self) -> Result<bool, LedgerError> {
		let code = self
			.provider
			.get_code_at(self.contract)
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get code: {}", e)))?;
		Ok(!code.is_empty())
	}

	async fn balance_of(&self, account: Address) -> Result<U256, LedgerError> {
		self.provider
			.get_balance(account)
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn gas_price(&self) -> Result<u128, LedgerError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get gas price: {}", e)))
	}

	async fn estimate_gas(&self, call: &LedgerCall) -> Result<u64, LedgerError> {
		self.provider
			.estimate_gas(self.request(call))
			.await
			.map_err(|e| classify_rpc_error(format!("{} estimate failed: {}", call.name(), e)))
	}

	async fn pending_sequence(&self) -> Result<u64, LedgerError> {
		self.provider
			.get_transaction_count(self.relayer)
			.pending()
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get transaction count: {}", e)))
	}

	async fn submit(
		&self,
		call: &LedgerCall,
		sequence: u64,
		gas_price: u128,
		gas_limit: u64,
	) -> Result<TxHash, LedgerError> {
		let request = self
			.request(call)
			.with_nonce(sequence)
			.with_gas_price(gas_price)
			.with_gas_limit(gas_limit);

		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| classify_rpc_error(e.to_string()))?;

		let tx_hash = *pending.tx_hash();
		tracing::info!(
			tx_hash = %truncate_hash(&tx_hash.to_string()),
			sequence,
			call = call.name(),
			"Submitted transaction"
		);

		Ok(tx_hash)
	}

	async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError> {
		let start_time = tokio::time::Instant::now();

		tracing::debug!(
			tx_hash = %truncate_hash(&tx_hash.to_string()),
			"Waiting for {} confirmations (timeout: {}s)",
			self.confirmations,
			self.receipt_timeout.as_secs()
		);

		loop {
			if start_time.elapsed() > self.receipt_timeout {
				return Err(LedgerError::ReceiptTimeout(tx_hash));
			}

			let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.receipt_poll_interval).await;
					continue;
				}
				Err(e) => {
					return Err(LedgerError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				}
			};

			let tx_block = receipt.block_number.unwrap_or(0);
			let current_block = self.block_number().await?;
			let current_confirmations = current_block.saturating_sub(tx_block) + 1;

			if current_confirmations >= self.confirmations {
				return Ok(TxReceipt {
					hash: receipt.transaction_hash,
					block_number: tx_block,
					success: receipt.status(),
					gas_used: receipt.gas_used,
				});
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				self.confirmations.saturating_sub(current_confirmations)
			);
			tokio::time::sleep(self.receipt_poll_interval).await;
		}
	}

	async fn block_number(&self) -> Result<u64, LedgerError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn intent_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<IntentEvent>, LedgerError> {
		let filter = Filter::new()
			.address(self.contract)
			.event_signature(vec![
				IntentCreated::SIGNATURE_HASH,
				IntentFulfilled::SIGNATURE_HASH,
				IntentCancelled::SIGNATURE_HASH,
			])
			.from_block(from_block)
			.to_block(to_block);

		let logs = self
			.provider
			.get_logs(&filter)
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get logs: {}", e)))?;

		Ok(logs.iter().filter_map(Self::parse_event).collect())
	}
}
