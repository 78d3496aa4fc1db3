//! Gateway to the on-chain intent ledger.
//!
//! Everything the relayer knows about intents, nonces and its own
//! transaction sequence comes through [`LedgerInterface`]. The trait is a thin
//! I/O boundary: it reads contract state, submits fulfilment transactions
//! with an explicit sequence number, and reports intent lifecycle events.

use alloy::sol_types::SolCall;
use async_trait::async_trait;
use relayer_types::{Address, Bytes, IntentId, SignedSubmission, StoredIntent, TxHash, TxReceipt, U256};
use std::sync::Arc;
use thiserror::Error;

pub mod abi;

pub mod implementations {
	pub mod rpc;
	pub mod memory;
}

pub use implementations::rpc::AlloyLedger;
pub use implementations::memory::MemoryLedger;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
	/// The submitted sequence number is not the one the ledger expects.
	#[error("Sequence mismatch: {0}")]
	SequenceMismatch(String),
	#[error("Network error: {0}")]
	Network(String),
	/// The node refused the transaction for a reason other than sequencing.
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	#[error("Timed out waiting for receipt of {0}")]
	ReceiptTimeout(TxHash),
	#[error("Failed to decode ledger response: {0}")]
	Decode(String),
}

/// Maps a node error message onto a [`LedgerError`].
///
/// Nodes report sequence problems only as text, so the match is on the
/// message wording used by the common clients.
pub fn classify_rpc_error(message: impl Into<String>) -> LedgerError {
	let message = message.into();
	let lower = message.to_lowercase();

	const SEQUENCE_MARKERS: &[&str] = &[
		"nonce too low",
		"nonce too high",
		"invalid nonce",
		"replacement transaction underpriced",
		"already known",
	];
	const REJECTION_MARKERS: &[&str] = &["insufficient funds", "execution reverted", "gas required exceeds"];

	if SEQUENCE_MARKERS.iter().any(|m| lower.contains(m)) {
		LedgerError::SequenceMismatch(message)
	} else if REJECTION_MARKERS.iter().any(|m| lower.contains(m)) {
		LedgerError::Rejected(message)
	} else {
		LedgerError::Network(message)
	}
}

/// A state-changing call the relayer may send to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
	FulfillIntent(IntentId),
	ExecuteSwap(SignedSubmission),
}

impl LedgerCall {
	pub fn calldata(&self) -> Bytes {
		match self {
			LedgerCall::FulfillIntent(id) => abi::IIntentLedger::fulfillIntentCall {
				intentId: U256::from(id.0),
			}
			.abi_encode()
			.into(),
			LedgerCall::ExecuteSwap(submission) => abi::IIntentLedger::executeSwapCall {
				intent: (&submission.intent).into(),
				signature: submission.signature.clone(),
			}
			.abi_encode()
			.into(),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			LedgerCall::FulfillIntent(_) => "fulfillIntent",
			LedgerCall::ExecuteSwap(_) => "executeSwap",
		}
	}
}

/// Intent lifecycle notification emitted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentEvent {
	Created { id: IntentId, creator: Address },
	Fulfilled { id: IntentId },
	Cancelled { id: IntentId },
}

impl IntentEvent {
	pub fn id(&self) -> IntentId {
		match self {
			IntentEvent::Created { id, .. }
			| IntentEvent::Fulfilled { id }
			| IntentEvent::Cancelled { id } => *id,
		}
	}
}

impl From<abi::Intent> for StoredIntent {
	fn from(intent: abi::Intent) -> Self {
		StoredIntent {
			id: IntentId(intent.id.saturating_to()),
			from_token: intent.fromToken,
			to_token: intent.toToken,
			amount_in: intent.amountIn,
			min_amount_out: intent.minAmountOut,
			creator: intent.creator,
			deadline: intent.deadline,
			fulfilled: intent.fulfilled,
			cancelled: intent.cancelled,
		}
	}
}

#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Address of the ledger contract.
	fn contract_address(&self) -> Address;

	/// Address the relayer submits from.
	fn relayer_address(&self) -> Address;

	async fn chain_id(&self) -> Result<u64, LedgerError>;

	/// Returns the stored intent, or a zeroed record when `id` is unknown.
	async fn get_intent(&self, id: IntentId) -> Result<StoredIntent, LedgerError>;

	/// Identifier the next created intent will receive.
	async fn next_intent_id(&self) -> Result<u64, LedgerError>;

	async fn user_intents(&self, user: Address) -> Result<Vec<IntentId>, LedgerError>;

	async fn nonce_of(&self, user: Address) -> Result<U256, LedgerError>;

	async fn is_authorized_fulfiller(&self, fulfiller: Address) -> Result<bool, LedgerError>;

	async fn paused(&self) -> Result<bool, LedgerError>;

	async fn fee_bps(&self) -> Result<U256, LedgerError>;

	async fn fee_recipient(&self) -> Result<Address, LedgerError>;

	/// Whether contract code is deployed at [`contract_address`](Self::contract_address).
	async fn has_code(&self) -> Result<bool, LedgerError>;

	async fn balance_of(&self, account: Address) -> Result<U256, LedgerError>;

	/// Current network fee level in wei per gas unit.
	async fn gas_price(&self) -> Result<u128, LedgerError>;

	async fn estimate_gas(&self, call: &LedgerCall) -> Result<u64, LedgerError>;

	/// The sequence number the ledger expects on the relayer's next transaction.
	async fn pending_sequence(&self) -> Result<u64, LedgerError>;

	/// Broadcasts `call` with an explicit sequence number and fee level.
	async fn submit(
		&self,
		call: &LedgerCall,
		sequence: u64,
		gas_price: u128,
		gas_limit: u64,
	) -> Result<TxHash, LedgerError>;

	/// Blocks until the transaction is mined (and buried under the configured
	/// confirmations) or the wait times out.
	async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError>;

	async fn block_number(&self) -> Result<u64, LedgerError>;

	/// Intent events emitted in the inclusive block range.
	async fn intent_events(&self, from_block: u64, to_block: u64) -> Result<Vec<IntentEvent>, LedgerError>;
}

pub type SharedLedger = Arc<dyn LedgerInterface>;
