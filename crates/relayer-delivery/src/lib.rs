//! Serialized submission of fulfilment transactions.
//!
//! [`ExecutionEngine`] is the only code path that sends transactions. It is
//! driven by a single worker through `&mut self`, so at most one submission
//! is ever in flight and the local sequence counter cannot be raced.

mod context;

pub use context::RelayerContext;

use relayer_ledger::{LedgerCall, LedgerError, SharedLedger};
use relayer_types::{
	truncate_hash, DedupKey, DedupRegistry, EventBus, Execution, ExecutionError, RelayerEvent,
	B256,
};
use tracing::{info, warn};

/// A validated, guard-approved fulfilment ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
	pub key: DedupKey,
	pub call: LedgerCall,
	pub gas_price: u128,
	pub gas_limit: u64,
}

pub struct ExecutionEngine {
	ledger: SharedLedger,
	context: RelayerContext,
	event_bus: EventBus,
}

impl ExecutionEngine {
	pub fn new(
		ledger: SharedLedger,
		chain_id: u64,
		domain_separator: B256,
		event_bus: EventBus,
	) -> Self {
		Self {
			ledger,
			context: RelayerContext::new(chain_id, domain_separator),
			event_bus,
		}
	}

	pub fn context(&self) -> &RelayerContext {
		&self.context
	}

	pub fn registry(&self) -> &DedupRegistry {
		self.context.registry()
	}

	/// Records an outcome that no later cycle can change.
	pub fn mark_terminal(&mut self, key: DedupKey) -> bool {
		self.context.mark_terminal(key)
	}

	/// Replaces the local sequence with the ledger's pending count.
	pub async fn sync_sequence(&mut self) -> Result<u64, ExecutionError> {
		match self.ledger.pending_sequence().await {
			Ok(sequence) => {
				self.context.set_sequence(Some(sequence));
				Ok(sequence)
			}
			Err(e) => {
				self.context.set_sequence(None);
				Err(ExecutionError::Network(e.to_string()))
			}
		}
	}

	/// Submits `request` and waits for its outcome.
	///
	/// On confirmation the key is recorded as terminal and the sequence
	/// advances by one. A sequence rejection resynchronizes the counter from
	/// the ledger. Any failure after broadcast clears the counter so the next
	/// submission re-reads it.
	pub async fn execute(&mut self, request: ExecutionRequest) -> Result<Execution, ExecutionError> {
		let key = request.key;
		let result = self.submit_and_confirm(request).await;

		match &result {
			Ok(execution) => {
				self.event_bus.publish(RelayerEvent::Confirmed {
					key,
					receipt: execution.receipt.clone(),
				});
			}
			Err(error) => {
				if !error.is_retryable() {
					self.mark_terminal(key);
				}
				self.event_bus.publish(RelayerEvent::Failed {
					key,
					error: error.clone(),
				});
			}
		}

		result
	}

	async fn submit_and_confirm(
		&mut self,
		request: ExecutionRequest,
	) -> Result<Execution, ExecutionError> {
		let ExecutionRequest {
			key,
			call,
			gas_price,
			gas_limit,
		} = request;

		if self.context.registry().contains(&key) {
			return Err(ExecutionError::Unsubmittable(format!(
				"{} already reached a terminal outcome",
				key
			)));
		}
		if gas_limit == 0 {
			return Err(ExecutionError::Unsubmittable("zero gas limit".to_string()));
		}

		let sequence = match self.context.sequence() {
			Some(sequence) => sequence,
			None => self.sync_sequence().await?,
		};

		let tx_hash = match self.ledger.submit(&call, sequence, gas_price, gas_limit).await {
			Ok(tx_hash) => tx_hash,
			Err(LedgerError::SequenceMismatch(reason)) => {
				warn!(%key, sequence, %reason, "Sequence rejected, resynchronizing");
				let ledger = self.sync_sequence().await?;
				return Err(ExecutionError::SequenceDesync {
					submitted: sequence,
					ledger,
				});
			}
			Err(LedgerError::Decode(reason)) => {
				return Err(ExecutionError::Unsubmittable(reason));
			}
			Err(e) => {
				// Nothing was broadcast, so the sequence is still free.
				return Err(ExecutionError::Network(e.to_string()));
			}
		};

		self.event_bus.publish(RelayerEvent::Submitted {
			key,
			tx_hash,
			sequence,
		});

		let receipt = match self.ledger.wait_for_receipt(tx_hash).await {
			Ok(receipt) => receipt,
			Err(e) => {
				self.context.set_sequence(None);
				return Err(ExecutionError::Network(e.to_string()));
			}
		};

		if !receipt.success {
			warn!(
				%key,
				tx_hash = %truncate_hash(&tx_hash.to_string()),
				"Fulfilment reverted"
			);
			self.context.set_sequence(None);
			return Err(ExecutionError::Reverted { tx_hash });
		}

		self.context.mark_terminal(key);
		self.context.set_sequence(Some(sequence + 1));

		info!(
			%key,
			tx_hash = %truncate_hash(&tx_hash.to_string()),
			block = receipt.block_number,
			gas_used = receipt.gas_used,
			"Fulfilment confirmed"
		);

		Ok(Execution {
			key,
			sequence,
			receipt,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_ledger::{LedgerInterface, MemoryLedger};
	use relayer_types::{Address, IntentId, U256};
	use std::sync::Arc;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	async fn setup() -> (Arc<MemoryLedger>, ExecutionEngine, IntentId) {
		let ledger = Arc::new(MemoryLedger::new(addr(0xaa), addr(0xbb)));
		let deadline = U256::from(u64::MAX);
		let id = ledger
			.create_intent(addr(1), addr(2), addr(3), U256::from(100), U256::from(90), deadline)
			.await;
		let engine = ExecutionEngine::new(ledger.clone(), 31337, B256::ZERO, EventBus::new(16));
		(ledger, engine, id)
	}

	fn request(id: IntentId) -> ExecutionRequest {
		ExecutionRequest {
			key: DedupKey::Stored(id),
			call: LedgerCall::FulfillIntent(id),
			gas_price: 1_000_000_000,
			gas_limit: 200_000,
		}
	}

	#[tokio::test]
	async fn test_confirmation_marks_terminal_and_advances() {
		let (ledger, mut engine, id) = setup().await;
		let mut events = engine.event_bus.subscribe();

		let execution = engine.execute(request(id)).await.unwrap();

		assert_eq!(execution.sequence, 0);
		assert!(execution.receipt.success);
		assert!(engine.registry().contains_stored(id));
		assert_eq!(engine.context().sequence(), Some(1));
		assert!(ledger.get_intent(id).await.unwrap().fulfilled);

		assert!(matches!(events.recv().await.unwrap(), RelayerEvent::Submitted { sequence: 0, .. }));
		assert!(matches!(events.recv().await.unwrap(), RelayerEvent::Confirmed { .. }));
	}

	#[tokio::test]
	async fn test_terminal_key_never_resubmitted() {
		let (ledger, mut engine, id) = setup().await;
		engine.execute(request(id)).await.unwrap();

		let result = engine.execute(request(id)).await;
		assert!(matches!(result, Err(ExecutionError::Unsubmittable(_))));
		assert_eq!(ledger.submissions().await.len(), 1);
	}

	#[tokio::test]
	async fn test_sequence_desync_resyncs_from_ledger() {
		let (ledger, mut engine, id) = setup().await;
		engine.sync_sequence().await.unwrap();
		ledger.set_sequence(5).await;

		let result = engine.execute(request(id)).await;
		assert_eq!(
			result,
			Err(ExecutionError::SequenceDesync {
				submitted: 0,
				ledger: 5
			})
		);
		assert_eq!(engine.context().sequence(), Some(5));
		assert!(!engine.registry().contains_stored(id));

		let execution = engine.execute(request(id)).await.unwrap();
		assert_eq!(execution.sequence, 5);
		assert_eq!(engine.context().sequence(), Some(6));
	}

	#[tokio::test]
	async fn test_network_error_keeps_sequence() {
		let (ledger, mut engine, id) = setup().await;
		engine.sync_sequence().await.unwrap();
		ledger
			.fail_next_submit(LedgerError::Network("connection reset".into()))
			.await;

		let result = engine.execute(request(id)).await;
		assert!(matches!(result, Err(ExecutionError::Network(_))));
		assert_eq!(engine.context().sequence(), Some(0));
		assert!(!engine.registry().contains_stored(id));
	}

	#[tokio::test]
	async fn test_revert_is_retryable_and_not_terminal() {
		let (ledger, mut engine, id) = setup().await;
		ledger.revert_next_submit().await;

		let result = engine.execute(request(id)).await;
		assert!(matches!(result, Err(ExecutionError::Reverted { .. })));
		assert!(result.unwrap_err().is_retryable());
		assert!(!engine.registry().contains_stored(id));
		assert_eq!(engine.context().sequence(), None);

		// The reverted transaction consumed sequence 0 on the ledger.
		let execution = engine.execute(request(id)).await.unwrap();
		assert_eq!(execution.sequence, 1);
	}

	#[tokio::test]
	async fn test_receipt_failure_clears_sequence() {
		let (ledger, mut engine, id) = setup().await;
		ledger
			.fail_next_receipt(LedgerError::ReceiptTimeout(B256::ZERO))
			.await;

		let result = engine.execute(request(id)).await;
		assert!(matches!(result, Err(ExecutionError::Network(_))));
		assert_eq!(engine.context().sequence(), None);
	}

	#[tokio::test]
	async fn test_unsubmittable_is_terminal() {
		let (_ledger, mut engine, id) = setup().await;
		let mut bad = request(id);
		bad.gas_limit = 0;

		let result = engine.execute(bad).await;
		assert!(matches!(result, Err(ExecutionError::Unsubmittable(_))));
		assert!(engine.registry().contains_stored(id));
	}
}
