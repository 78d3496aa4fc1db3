//! Error taxonomy for the relayer pipeline.
//!
//! Each pipeline stage reports its own enum so callers can tell a rejected
//! intent from a deferred one, and a retryable submission failure from a
//! terminal one.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::TxHash;

/// Why the validator refused an intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("Structurally invalid intent: {0}")]
	StructuralInvalid(String),
	#[error("Intent expired at {deadline} (now {now})")]
	Expired { deadline: U256, now: u64 },
	#[error("Intent already reached a terminal state")]
	AlreadyTerminal,
	#[error("Nonce mismatch: intent carries {provided}, ledger expects {expected}")]
	NonceMismatch { provided: U256, expected: U256 },
	#[error("Signature does not recover to the recipient")]
	InvalidSignature,
}

impl ValidationError {
	/// Short machine-readable name, used in logs and events.
	pub fn kind(&self) -> &'static str {
		match self {
			ValidationError::StructuralInvalid(_) => "structural_invalid",
			ValidationError::Expired { .. } => "expired",
			ValidationError::AlreadyTerminal => "already_terminal",
			ValidationError::NonceMismatch { .. } => "nonce_mismatch",
			ValidationError::InvalidSignature => "invalid_signature",
		}
	}

	/// Whether no future ledger state can make the intent valid again.
	///
	/// A nonce ahead of the ledger may still become current; one behind it
	/// has been consumed.
	pub fn is_permanent(&self) -> bool {
		match self {
			ValidationError::StructuralInvalid(_)
			| ValidationError::Expired { .. }
			| ValidationError::AlreadyTerminal
			| ValidationError::InvalidSignature => true,
			ValidationError::NonceMismatch { provided, expected } => provided < expected,
		}
	}
}

/// Why the gas/profitability guard held an intent back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardRejection {
	#[error("Gas price {fee_level} wei exceeds ceiling {ceiling} wei")]
	GasPriceExceeded { fee_level: u128, ceiling: u128 },
	#[error("Input amount {amount_in} is below the minimum intent size {minimum}")]
	BelowMinimumSize { amount_in: U256, minimum: U256 },
	#[error("Estimated cost {estimated_cost} exceeds the acceptable limit {limit}")]
	Unprofitable { estimated_cost: U256, limit: U256 },
}

impl GuardRejection {
	pub fn kind(&self) -> &'static str {
		match self {
			GuardRejection::GasPriceExceeded { .. } => "gas_price_exceeded",
			GuardRejection::BelowMinimumSize { .. } => "below_minimum_size",
			GuardRejection::Unprofitable { .. } => "unprofitable",
		}
	}
}

/// Why a fulfilment attempt did not reach confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
	#[error("Transaction {tx_hash} reverted")]
	Reverted { tx_hash: TxHash },
	#[error("Network error: {0}")]
	Network(String),
	#[error("Sequence {submitted} rejected, ledger expects {ledger}")]
	SequenceDesync { submitted: u64, ledger: u64 },
	#[error("Transaction cannot be submitted: {0}")]
	Unsubmittable(String),
}

impl ExecutionError {
	/// Retryable failures leave the intent eligible for the next cycle.
	pub fn is_retryable(&self) -> bool {
		!matches!(self, ExecutionError::Unsubmittable(_))
	}

	pub fn kind(&self) -> &'static str {
		match self {
			ExecutionError::Reverted { .. } => "reverted",
			ExecutionError::Network(_) => "network",
			ExecutionError::SequenceDesync { .. } => "sequence_desync",
			ExecutionError::Unsubmittable(_) => "unsubmittable",
		}
	}
}

/// Conditions that prevent the relayer from starting at all.
#[derive(Debug, Error)]
pub enum FatalInit {
	#[error("Missing required configuration: {0}")]
	MissingConfig(String),
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
	#[error("Ledger endpoint unreachable: {0}")]
	Unreachable(String),
	#[error("No contract deployed at {0}")]
	ContractNotFound(Address),
	#[error("Relayer {address} has insufficient balance ({balance} wei)")]
	InsufficientBalance { address: Address, balance: U256 },
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::B256;

	#[test]
	fn test_nonce_permanence() {
		let consumed = ValidationError::NonceMismatch {
			provided: U256::from(0),
			expected: U256::from(1),
		};
		let future = ValidationError::NonceMismatch {
			provided: U256::from(5),
			expected: U256::from(1),
		};

		assert!(consumed.is_permanent());
		assert!(!future.is_permanent());
	}

	#[test]
	fn test_retryable_execution_errors() {
		assert!(ExecutionError::Reverted {
			tx_hash: B256::ZERO
		}
		.is_retryable());
		assert!(ExecutionError::Network("timeout".into()).is_retryable());
		assert!(ExecutionError::SequenceDesync {
			submitted: 4,
			ledger: 6
		}
		.is_retryable());
		assert!(!ExecutionError::Unsubmittable("bad calldata".into()).is_retryable());
	}
}
